//! # Routing State
//!
//! One immutable snapshot of everything the gateway knows: the route table,
//! the backends and the methods each one serves, and a per-method fan-out
//! index for picking a backend.
//!
//! Snapshots are never mutated after publication. Writers clone the current
//! snapshot, rebuild the clone, and swap it in atomically; readers that hold
//! one snapshot see a world where a matched route always has a pickable
//! backend. The mutating operations here are `pub(crate)` — they only ever
//! run on a writer's private clone, behind the gateway's writer lock.

use std::collections::{BTreeMap, HashMap};

use http::Method;
use prost::Message;
use prost_reflect::MethodDescriptor;
use prost_types::FileDescriptorProto;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};
use tonic::Status;

use crate::annotations::{self, HttpRule};
use crate::backend::Backend;
use crate::gateway::RegisterError;
use crate::reflection::resolver::{DescriptorResolver, ReflectionStream, ResolveError};
use crate::routes::{RouteMatch, RouteTable};

/// A routable RPC method discovered over reflection.
#[derive(Clone, Debug)]
pub struct RpcMethod {
    /// Full gRPC method name, `/package.Service/Method`.
    pub name: String,
    /// Schema for the method; request and response types hang off it.
    pub descriptor: MethodDescriptor,
}

/// An RPC method paired with one backend that serves it.
#[derive(Debug)]
pub struct MethodConn<S> {
    pub method: RpcMethod,
    pub backend: Backend<S>,
}

impl<S> Clone for MethodConn<S> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            backend: self.backend.clone(),
        }
    }
}

/// What one backend contributed to the snapshot.
#[derive(Clone, Debug)]
struct BackendMethods {
    methods: Vec<RpcMethod>,
    /// Content hash of the backend's descriptor set at registration time.
    fingerprint: [u8; 32],
}

/// An immutable routing snapshot.
pub struct RoutingState<S> {
    routes: RouteTable,
    conns: HashMap<Backend<S>, BackendMethods>,
    methods: HashMap<String, Vec<MethodConn<S>>>,
}

impl<S> Default for RoutingState<S> {
    fn default() -> Self {
        Self {
            routes: RouteTable::new(),
            conns: HashMap::new(),
            methods: HashMap::new(),
        }
    }
}

impl<S> Clone for RoutingState<S> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
            conns: self.conns.clone(),
            methods: self.methods.clone(),
        }
    }
}

impl<S> RoutingState<S> {
    /// Resolves an HTTP verb + path against the route table.
    pub fn match_method(&self, verb: &Method, path: &str) -> Result<RouteMatch, Status> {
        self.routes
            .lookup(verb, path)
            .ok_or_else(|| Status::not_found(format!("no route for {verb} {path}")))
    }

    /// Picks one backend serving `method`, uniformly at random.
    pub fn pick_method_conn(&self, method: &str) -> Result<MethodConn<S>, Status> {
        self.methods
            .get(method)
            .and_then(|conns| conns.choose(&mut rand::thread_rng()))
            .cloned()
            .ok_or_else(|| Status::unimplemented(format!("method {method} not implemented")))
    }

    /// Whether `backend` currently contributes methods to this snapshot.
    pub fn is_registered(&self, backend: &Backend<S>) -> bool {
        self.conns.contains_key(backend)
    }

    /// Full names of every method the snapshot can pick a backend for.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Discovers `backend`'s services over `stream` and merges its routes and
    /// methods into this snapshot.
    ///
    /// Re-registering a backend whose descriptor set is unchanged is a no-op.
    /// A backend whose descriptors changed is torn down and re-added, so its
    /// stale routes disappear in the same snapshot its new ones land in. Any
    /// error leaves `self` half-built; callers must throw the clone away
    /// rather than publish it.
    pub(crate) async fn register_backend(
        &mut self,
        backend: &Backend<S>,
        stream: &mut ReflectionStream,
    ) -> Result<(), RegisterError> {
        let services = stream.list_services().await?;

        // One deduplicated map of file path → raw descriptor bytes. Servers
        // may batch the same file into several responses; the first copy
        // wins. BTreeMap iteration keeps the fingerprint independent of
        // response arrival order.
        let mut files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for service in &services {
            let batch = stream.file_containing_symbol(service).await?;
            for raw in batch {
                let fd = FileDescriptorProto::decode(raw.as_slice()).map_err(ResolveError::from)?;
                files.entry(fd.name().to_owned()).or_insert(raw);
            }
        }

        let fingerprint = descriptor_fingerprint(&files);
        if let Some(existing) = self.conns.get(backend) {
            if existing.fingerprint == fingerprint {
                tracing::debug!(?backend, "descriptor set unchanged, keeping registration");
                return Ok(());
            }
            // Same backend, new schema: drop the old contribution first so
            // both changes land in one snapshot.
            self.remove_backend(backend);
        }

        let mut resolver = DescriptorResolver::new(stream)?;
        let mut methods = Vec::new();
        for (path, raw) in &files {
            let file = resolver.register_file(path, raw).await?;
            let rules = annotations::method_http_rules(raw).map_err(ResolveError::from)?;
            self.add_file_routes(&file, &rules, &mut methods)?;
        }

        for method in &methods {
            self.methods
                .entry(method.name.clone())
                .or_default()
                .push(MethodConn {
                    method: method.clone(),
                    backend: backend.clone(),
                });
        }
        tracing::debug!(
            ?backend,
            services = services.len(),
            methods = methods.len(),
            "registered backend"
        );
        self.conns
            .insert(backend.clone(), BackendMethods { methods, fingerprint });
        Ok(())
    }

    /// Adds routes for every annotated method of `file`, collecting the
    /// methods that got at least one binding. Methods without a
    /// `google.api.http` rule stay gRPC-only and are skipped entirely.
    fn add_file_routes(
        &mut self,
        file: &prost_reflect::FileDescriptor,
        rules: &HashMap<String, HttpRule>,
        methods: &mut Vec<RpcMethod>,
    ) -> Result<(), RegisterError> {
        for service in file.services() {
            for descriptor in service.methods() {
                let name = format!("/{}/{}", service.full_name(), descriptor.name());
                let Some(rule) = rules.get(&name) else { continue };

                for (verb, template) in rule.bindings() {
                    self.routes.add_rule(verb, template, &name)?;
                }
                methods.push(RpcMethod { name, descriptor });
            }
        }
        Ok(())
    }

    /// Removes `backend` and everything only it contributed.
    ///
    /// Fan-out entries for other backends serving the same methods are left
    /// alone; a route disappears only when its last backend does. Returns
    /// `false` when the backend was not registered.
    pub(crate) fn remove_backend(&mut self, backend: &Backend<S>) -> bool {
        let Some(entry) = self.conns.remove(backend) else {
            return false;
        };

        for method in &entry.methods {
            let Some(bucket) = self.methods.get_mut(&method.name) else {
                continue;
            };
            bucket.retain(|conn| conn.backend != *backend);
            if bucket.is_empty() {
                self.methods.remove(&method.name);
                self.routes.remove_method(&method.name);
            }
        }
        tracing::debug!(?backend, methods = entry.methods.len(), "removed backend");
        true
    }
}

/// Content hash of a backend's descriptor set: SHA-256 over the raw file
/// bytes in file-path order, so two fetches of the same set fingerprint
/// identically no matter how responses arrived.
fn descriptor_fingerprint(files: &BTreeMap<String, Vec<u8>>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for raw in files.values() {
        hasher.update(raw);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let mut forward = BTreeMap::new();
        forward.insert("a.proto".to_owned(), vec![1, 2, 3]);
        forward.insert("b.proto".to_owned(), vec![4, 5]);

        let mut reverse = BTreeMap::new();
        reverse.insert("b.proto".to_owned(), vec![4, 5]);
        reverse.insert("a.proto".to_owned(), vec![1, 2, 3]);

        assert_eq!(
            descriptor_fingerprint(&forward),
            descriptor_fingerprint(&reverse)
        );
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut set = BTreeMap::new();
        set.insert("a.proto".to_owned(), vec![1, 2, 3]);
        let original = descriptor_fingerprint(&set);

        set.insert("a.proto".to_owned(), vec![1, 2, 4]);
        assert_ne!(original, descriptor_fingerprint(&set));

        set.insert("a.proto".to_owned(), vec![1, 2, 3]);
        set.insert("b.proto".to_owned(), vec![]);
        assert_ne!(original, descriptor_fingerprint(&set));
    }

    #[test]
    fn test_empty_state_picks_nothing() {
        let state = RoutingState::<tonic::transport::Channel>::default();

        let err = state.pick_method_conn("/lib.S/Get").unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
        assert_eq!(err.message(), "method /lib.S/Get not implemented");
    }

    #[test]
    fn test_empty_state_matches_nothing() {
        let state = RoutingState::<tonic::transport::Channel>::default();

        let err = state.match_method(&Method::GET, "/v1/items").unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[test]
    fn test_remove_unknown_backend_is_false() {
        let mut state = RoutingState::default();
        let backend = Backend::new("transport");

        assert!(!state.remove_backend(&backend));
        assert!(!state.is_registered(&backend));
    }
}
