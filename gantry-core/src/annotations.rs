//! # HTTP Binding Annotations
//!
//! Reading `google.api.http` method options out of raw file descriptor bytes.
//!
//! The extension cannot be read through `prost-types`: prost drops fields a
//! struct does not declare, so decoding a `FileDescriptorProto` through it
//! erases the extension options before anything can look at them. Instead,
//! [`method_http_rules`] decodes the raw bytes into a minimal mirror of the
//! descriptor schema that declares the extension as a plain field under its
//! extension number — which is wire-identical to the extension itself.

use std::collections::HashMap;

use http::Method;
use prost::Message;

mod generated;
mod well_known;

pub use generated::google_api::{CustomHttpPattern, Http, HttpBody, HttpRule, http_rule};
pub(crate) use well_known::well_known_pool;

/// Field number assigned to the `google.api.http` extension on
/// `google.protobuf.MethodOptions`.
pub const HTTP_EXTENSION_NUMBER: i32 = 72_295_728;

impl HttpRule {
    /// The HTTP verb and path template this rule binds, if it has a usable
    /// pattern.
    ///
    /// Custom verbs are uppercased and parsed as extension methods; a rule
    /// whose custom verb is not a valid HTTP method name is skipped rather
    /// than rejected.
    pub fn target(&self) -> Option<(Method, &str)> {
        match self.pattern.as_ref()? {
            http_rule::Pattern::Get(path) => Some((Method::GET, path)),
            http_rule::Pattern::Put(path) => Some((Method::PUT, path)),
            http_rule::Pattern::Post(path) => Some((Method::POST, path)),
            http_rule::Pattern::Delete(path) => Some((Method::DELETE, path)),
            http_rule::Pattern::Patch(path) => Some((Method::PATCH, path)),
            http_rule::Pattern::Custom(custom) => {
                let verb = Method::from_bytes(custom.kind.to_uppercase().as_bytes()).ok()?;
                Some((verb, custom.path.as_str()))
            }
        }
    }

    /// This rule's target followed by the targets of its additional bindings.
    ///
    /// Bindings below the first level are not expanded; the annotation schema
    /// forbids nesting them.
    pub fn bindings(&self) -> impl Iterator<Item = (Method, &str)> {
        std::iter::once(self)
            .chain(self.additional_bindings.iter())
            .filter_map(HttpRule::target)
    }
}

/// Extracts the HTTP rule attached to each method of `raw`, keyed by full
/// gRPC method name (`/package.Service/Method`).
///
/// `raw` must be an encoded `FileDescriptorProto` exactly as the reflection
/// server sent it.
pub(crate) fn method_http_rules(
    raw: &[u8],
) -> Result<HashMap<String, HttpRule>, prost::DecodeError> {
    let file = FileIndex::decode(raw)?;
    let package = file.package.unwrap_or_default();

    let mut rules = HashMap::new();
    for service in file.service {
        let Some(service_name) = service.name else { continue };
        let service_full_name = if package.is_empty() {
            service_name
        } else {
            format!("{package}.{service_name}")
        };
        for method in service.method {
            if let (Some(name), Some(options)) = (method.name, method.options)
                && let Some(http) = options.http
            {
                rules.insert(format!("/{service_full_name}/{name}"), http);
            }
        }
    }
    Ok(rules)
}

/// Just enough of `FileDescriptorProto` to reach method options. prost skips
/// fields a struct does not declare, so everything else in the file passes
/// through undisturbed.
#[derive(Clone, PartialEq, prost::Message)]
struct FileIndex {
    #[prost(string, optional, tag = "2")]
    package: Option<String>,
    #[prost(message, repeated, tag = "6")]
    service: Vec<ServiceIndex>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ServiceIndex {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    method: Vec<MethodIndex>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct MethodIndex {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(message, optional, tag = "4")]
    options: Option<MethodOptionsIndex>,
}

/// The extension declared as a plain field under its extension number.
#[derive(Clone, PartialEq, prost::Message)]
struct MethodOptionsIndex {
    #[prost(message, optional, tag = "72295728")]
    http: Option<HttpRule>,
}
