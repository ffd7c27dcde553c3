//! An in-process `grpc.reflection.v1` server backed by a swappable fixture
//! set.
//!
//! The stock `tonic_reflection::server::Builder` is not usable here: it
//! round-trips descriptors through `prost-types`, which strips the
//! `google.api.http` extension options the gateway tests exist to exercise.
//! This implementation serves the stored bytes verbatim.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use futures_util::{Stream, StreamExt};
use tonic::{Request, Response, Status, Streaming};
use tonic_reflection::pb::v1::{
    ErrorResponse, FileDescriptorResponse, ListServiceResponse, ServerReflectionRequest,
    ServerReflectionResponse, ServiceResponse, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};
use tonic_reflection::server::v1::{ServerReflection, ServerReflectionServer};

use crate::sets::{FixtureFile, FixtureSet};

/// Serves fixture descriptor sets over the reflection protocol.
///
/// The served set can be swapped while streams are live (schema rollout
/// tests) and every answered request is counted (descriptor caching tests).
#[derive(Clone, Debug)]
pub struct FixtureReflection {
    files: Arc<ArcSwap<FixtureSet>>,
    requests: Arc<AtomicUsize>,
    enabled: bool,
}

impl FixtureReflection {
    pub fn serving(set: FixtureSet) -> Self {
        Self {
            files: Arc::new(ArcSwap::from_pointee(set)),
            requests: Arc::new(AtomicUsize::new(0)),
            enabled: true,
        }
    }

    /// A server that refuses reflection streams outright, like a backend
    /// built without the reflection service.
    pub fn refusing() -> Self {
        Self {
            files: Arc::new(ArcSwap::from_pointee(FixtureSet::default())),
            requests: Arc::new(AtomicUsize::new(0)),
            enabled: false,
        }
    }

    /// Wraps a clone of this fixture in the generated tonic service.
    pub fn server(&self) -> ServerReflectionServer<FixtureReflection> {
        ServerReflectionServer::new(self.clone())
    }

    /// Replaces the served descriptor set, as a backend rollout would.
    pub fn swap(&self, set: FixtureSet) {
        self.files.store(Arc::new(set));
    }

    /// Requests answered so far, across all streams.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl ServerReflection for FixtureReflection {
    type ServerReflectionInfoStream =
        Pin<Box<dyn Stream<Item = Result<ServerReflectionResponse, Status>> + Send + 'static>>;

    async fn server_reflection_info(
        &self,
        request: Request<Streaming<ServerReflectionRequest>>,
    ) -> Result<Response<Self::ServerReflectionInfoStream>, Status> {
        if !self.enabled {
            return Err(Status::unimplemented("reflection disabled"));
        }

        let files = Arc::clone(&self.files);
        let requests = Arc::clone(&self.requests);
        let responses = request.into_inner().map(move |request| {
            let request = request?;
            requests.fetch_add(1, Ordering::SeqCst);
            Ok(respond(&files.load(), request))
        });

        Ok(Response::new(Box::pin(responses)))
    }
}

fn respond(set: &FixtureSet, request: ServerReflectionRequest) -> ServerReflectionResponse {
    let answer = match &request.message_request {
        Some(MessageRequest::ListServices(_)) => {
            MessageResponse::ListServicesResponse(ListServiceResponse {
                service: set
                    .services
                    .iter()
                    .map(|name| ServiceResponse { name: name.clone() })
                    .collect(),
            })
        }
        Some(MessageRequest::FileContainingSymbol(symbol)) => {
            match set.file_containing_symbol(symbol) {
                Some(file) => file_response(file),
                None => not_found(format!("symbol not found: {symbol}")),
            }
        }
        Some(MessageRequest::FileByFilename(name)) => match set.file_by_name(name) {
            Some(file) => file_response(file),
            None => not_found(format!("file not found: {name}")),
        },
        _ => MessageResponse::ErrorResponse(ErrorResponse {
            error_code: tonic::Code::Unimplemented as i32,
            error_message: "unsupported reflection request".to_owned(),
        }),
    };

    ServerReflectionResponse {
        valid_host: request.host.clone(),
        original_request: Some(request),
        message_response: Some(answer),
    }
}

fn file_response(file: &FixtureFile) -> MessageResponse {
    MessageResponse::FileDescriptorResponse(FileDescriptorResponse {
        file_descriptor_proto: vec![file.encoded.clone()],
    })
}

fn not_found(error_message: String) -> MessageResponse {
    MessageResponse::ErrorResponse(ErrorResponse {
        error_code: tonic::Code::NotFound as i32,
        error_message,
    })
}
