//! # Server Reflection
//!
//! This module contains the logic necessary to interact with the gRPC Server Reflection Protocol.
//!
//! It enables the gateway to query a backend for its Protobuf schema at runtime, so routes
//! are built without pre-compiled descriptors.
pub mod resolver;
