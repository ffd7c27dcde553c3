//! # Gateway
//!
//! The façade over everything else in this crate: register and remove
//! backends, load routing snapshots, pick a backend for a method.
//!
//! ## Concurrency
//!
//! The current [`RoutingState`] lives behind an atomically swapped pointer.
//! Readers load it without locking and work against an immutable snapshot;
//! a request that matched a route on one snapshot picks its backend on that
//! same snapshot, unaffected by writers publishing newer ones. Writers
//! serialize on a single async lock, rebuild a private clone, and either
//! publish it wholesale or throw it away — a half-registered backend is never
//! observable.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use http_body::Body as HttpBody;
use tokio::sync::Mutex;
use tonic::Status;
use tonic::client::GrpcService;
use tonic::transport::Channel;

use crate::BoxError;
use crate::backend::Backend;
use crate::reflection::resolver::{ReflectionStream, ResolveError};
use crate::routes::RouteError;
use crate::state::{MethodConn, RoutingState};

/// Error registering a backend with the gateway.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("Failed to resolve the backend's descriptors: '{0}'")]
    Resolve(#[from] ResolveError),

    #[error("Failed to bind the backend's routes: '{0}'")]
    Route(#[from] RouteError),
}

/// Transport limits the gateway hands to the dispatch layer embedding it.
///
/// The core records these; enforcing them is up to the HTTP and gRPC
/// plumbing around it.
#[derive(Clone, Debug)]
pub struct GatewayOptions {
    pub max_receive_message_size: usize,
    pub max_send_message_size: usize,
    pub connection_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_receive_message_size: 4 * 1024 * 1024,
            max_send_message_size: i32::MAX as usize,
            connection_timeout: Duration::from_secs(120),
        }
    }
}

/// Dynamic gRPC-to-HTTP routing core.
///
/// # Example
///
/// ```rust,no_run
/// use gantry_core::backend::Backend;
/// use gantry_core::gateway::Gateway;
/// use http::Method;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let gateway = Gateway::new();
///
///     let backend = Backend::connect("http://localhost:50051").await?;
///     gateway.register(&backend).await?;
///
///     let state = gateway.load();
///     let matched = state.match_method(&Method::GET, "/v1/items/42")?;
///     let conn = state.pick_method_conn(&matched.method)?;
///     println!("dispatching {} to {:?}", conn.method.name, conn.backend);
///     Ok(())
/// }
/// ```
pub struct Gateway<S = Channel> {
    options: GatewayOptions,
    state: ArcSwap<RoutingState<S>>,
    /// Writers clone-rebuild-swap under this lock; readers never take it.
    write: Mutex<()>,
}

impl<S> Gateway<S> {
    pub fn new() -> Self {
        Self::with_options(GatewayOptions::default())
    }

    pub fn with_options(options: GatewayOptions) -> Self {
        Self {
            options,
            state: ArcSwap::from_pointee(RoutingState::default()),
            write: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// The current routing snapshot.
    ///
    /// Callers that need a coherent match-then-pick must hold one snapshot
    /// and do both against it.
    pub fn load(&self) -> Arc<RoutingState<S>> {
        self.state.load_full()
    }

    /// Picks a backend for `method` on a fresh snapshot.
    ///
    /// Shorthand for [`RoutingState::pick_method_conn`] when no route match
    /// is involved, e.g. for requests that arrived as plain gRPC.
    pub fn pick_method_conn(&self, method: &str) -> Result<MethodConn<S>, Status> {
        self.state.load().pick_method_conn(method)
    }

    /// Removes `backend` and every route only it served.
    ///
    /// Returns whether the backend was registered. The shrunk snapshot is
    /// published atomically; in-flight requests on older snapshots still see
    /// the backend.
    pub async fn remove(&self, backend: &Backend<S>) -> bool {
        let _write = self.write.lock().await;

        let mut next = RoutingState::clone(&self.state.load());
        let removed = next.remove_backend(backend);
        if removed {
            self.state.store(Arc::new(next));
        }
        removed
    }
}

impl<S> Gateway<S>
where
    S: GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Discovers `backend`'s services over reflection and publishes routes
    /// for every method carrying a `google.api.http` annotation.
    ///
    /// Registration is all-or-nothing: on any error the gateway keeps
    /// serving the previous snapshot untouched. Re-registering a backend
    /// whose descriptors are unchanged is a cheap no-op, and one whose
    /// schema changed has its old routes replaced in the same publication.
    pub async fn register(&self, backend: &Backend<S>) -> Result<(), RegisterError> {
        // Open the stream before taking the writer lock, so a backend that
        // does not speak reflection fails without blocking other writers.
        let mut stream = ReflectionStream::open(backend.service()).await?;

        let _write = self.write.lock().await;

        let mut next = RoutingState::clone(&self.state.load());
        next.register_backend(backend, &mut stream).await?;
        self.state.store(Arc::new(next));
        Ok(())
    }
}

impl<S> Default for Gateway<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let gateway: Gateway = Gateway::new();

        assert_eq!(gateway.options().max_receive_message_size, 4 * 1024 * 1024);
        assert_eq!(gateway.options().max_send_message_size, i32::MAX as usize);
        assert_eq!(gateway.options().connection_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_custom_options() {
        let gateway: Gateway = Gateway::with_options(GatewayOptions {
            max_receive_message_size: 1024,
            ..Default::default()
        });

        assert_eq!(gateway.options().max_receive_message_size, 1024);
        assert_eq!(gateway.options().max_send_message_size, i32::MAX as usize);
    }
}
