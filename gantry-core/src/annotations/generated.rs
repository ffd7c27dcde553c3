//! Committed bindings for the `google.api` annotation protos.
//!
//! Regenerated by the `generate-http-annotations` binary (requires the
//! `gen-proto` feature and `protoc` on the path), never at build time.

/// Types generated from `proto/google/api/*.proto`.
pub mod google_api {
    include!("generated/google.api.rs");
}
