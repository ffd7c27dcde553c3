//! # Library Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide descriptor
//! fixtures and an in-process reflection server for integration testing
//! `gantry-core`. It is not intended for production use.
//!
//! The descriptor files are built programmatically (see [`pb`] for why their
//! encoded bytes cannot come from `prost-types` or `protoc` output that was
//! round-tripped through it) and served byte-for-byte by
//! [`FixtureReflection`], so the `google.api.http` method annotations reach
//! the wire intact. The protos the fixtures encode live under `proto/` for
//! reference.

pub mod pb;
mod reflection;
mod sets;

pub use reflection::FixtureReflection;
pub use sets::{FixtureFile, FixtureSet, conflict_set, library_set, library_set_v2};
