//! # Backend Handles
//!
//! A [`Backend`] wraps one gRPC transport (a tonic [`Channel`] by default, or
//! anything satisfying the same service bounds). Clones share identity:
//! equality and hashing follow the underlying allocation, not the transport's
//! value, so the handle used to register a backend is the handle that removes
//! it — even if an identical channel to the same address exists elsewhere.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tonic::transport::{Channel, Endpoint};

/// Error connecting to a backend.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("The provided URI '{0}' is invalid: '{1}'")]
    InvalidUri(String, #[source] tonic::transport::Error),

    #[error("Failed to connect to '{0}': '{1}'")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// A handle to one gRPC backend.
pub struct Backend<S = Channel> {
    service: Arc<S>,
}

impl Backend<Channel> {
    /// Connects a channel to `addr` and wraps it in a fresh handle.
    pub async fn connect(addr: &str) -> Result<Self, ConnectError> {
        let endpoint = Endpoint::new(addr.to_owned())
            .map_err(|err| ConnectError::InvalidUri(addr.to_owned(), err))?;
        let channel = endpoint
            .connect()
            .await
            .map_err(|err| ConnectError::ConnectionFailed(addr.to_owned(), err))?;
        Ok(Self::new(channel))
    }
}

impl<S> Backend<S> {
    /// Wraps an already constructed transport.
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl<S: Clone> Backend<S> {
    /// A clone of the underlying transport, for issuing requests.
    pub fn service(&self) -> S {
        (*self.service).clone()
    }
}

impl<S> Clone for Backend<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S> PartialEq for Backend<S> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.service, &other.service)
    }
}

impl<S> Eq for Backend<S> {}

impl<S> Hash for Backend<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.service).hash(state);
    }
}

impl<S> fmt::Debug for Backend<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend")
            .field(&Arc::as_ptr(&self.service))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_clones_share_identity() {
        let backend = Backend::new("transport");
        let clone = backend.clone();

        assert_eq!(backend, clone);

        let mut set = HashSet::new();
        set.insert(backend);
        assert!(set.contains(&clone));
    }

    #[test]
    fn test_equal_transports_are_distinct_backends() {
        let a = Backend::new("transport");
        let b = Backend::new("transport");

        assert_ne!(a, b);
    }
}
