//! # Gantry Core
//!
//! `gantry-core` is the routing core of a dynamic gRPC-to-HTTP transcoding
//! gateway. It discovers the services of live gRPC backends through server
//! reflection, reads the `google.api.http` annotations on their methods, and
//! maintains an HTTP route table over them — all without compile-time
//! knowledge of the Protobuf schemas involved.
//!
//! ## Key Components
//!
//! * **[`Gateway`](gateway::Gateway):** The main entry point. It registers and removes backends
//!   and hands out immutable routing snapshots.
//! * **[`RoutingState`](state::RoutingState):** One snapshot: match an HTTP request to a gRPC
//!   method, then pick a backend serving it.
//! * **[`Backend`](backend::Backend):** A clonable handle to one backend transport; handle
//!   identity is registration identity.
//!
//! ## Concurrency model
//!
//! Readers load the current snapshot from an atomically swapped pointer and
//! never block. Writers serialize on one async lock, rebuild a private clone
//! of the snapshot, and publish it wholesale — or, on error, not at all. A
//! half-registered backend is never observable.
//!
//! ## Internal clients
//!
//! The reflection plumbing is exposed for callers that want to resolve
//! descriptors without going through a gateway:
//!
//! * **[`ReflectionStream`](reflection::resolver::ReflectionStream):** One open `grpc.reflection.v1` stream.
//! * **[`DescriptorResolver`](reflection::resolver::DescriptorResolver):** Builds a descriptor pool over such a
//!   stream, fetching imports recursively and caching every file it has seen.
//!
//! ## Out of scope
//!
//! This crate stops at "which method, which backend, which path variables".
//! It does not transcode HTTP bodies, serve HTTP, or manage processes.
//!
//! ## Feature Flags (Internal use only)
//!
//! * `gen-proto`: Enables support for regenerating the committed `google.api`
//!   annotation bindings (internal use).
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
//!
//! See the README.md for more details about usage.
pub mod annotations;
pub mod backend;
pub mod gateway;
pub mod reflection;
pub mod routes;
pub mod state;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
