//! # Descriptor Resolver
//!
//! A client for `grpc.reflection.v1` that builds a [`DescriptorPool`] by
//! querying a server that supports reflection.
//!
//! [`ReflectionStream`] is the transport layer: one bidirectional reflection
//! stream, held open across as many queries as a caller needs. On top of it,
//! [`DescriptorResolver`] resolves whole files: it inspects the imports of
//! every descriptor it receives and recursively fetches missing files until
//! the schema tree is complete.
//!
//! Descriptor bytes enter the pool exactly as the server sent them. Decoding
//! them into `prost-types` values and re-encoding would silently drop
//! extension options — including the `google.api.http` method annotations the
//! routing layer is built around.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use crate::annotations;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use http_body::Body as HttpBody;
use prost::Message;
use prost::encoding::{WireType, encode_key, encode_varint};
use prost_reflect::{DescriptorError, DescriptorPool, FileDescriptor};
use prost_types::FileDescriptorProto;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Streaming, client::GrpcService};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(
        "Failed to start a stream request with the reflection server, reflection might not be supported: '{0}'"
    )]
    ServerStreamInitFailed(#[source] tonic::Status),

    #[error("The server stream returned an error status: '{0}'")]
    ServerStreamFailure(#[source] tonic::Status),

    #[error("Reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("Internal error: Failed to send request to stream")]
    SendFailed,

    #[error("Server returned reflection error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Protocol error: Received unexpected response type: {0}")]
    UnexpectedResponseType(String),

    #[error("Failed to decode FileDescriptorProto: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Failed to register file descriptor in the pool: '{0}'")]
    DescriptorError(#[from] DescriptorError),

    #[error("Server never returned a descriptor for file '{0}'")]
    MissingFile(String),
}

// The host defined in the reflection requests doesn't seem to be a mandatory field
// and there is no documentation about what it is about.
// So we won't enforce it from the user.
const EMPTY_HOST: &str = "";

/// One open `ServerReflectionInfo` stream.
///
/// Queries are sequential: each sends one request and reads one response, so
/// a single stream serves an entire registration round.
pub struct ReflectionStream {
    requests: mpsc::Sender<ServerReflectionRequest>,
    responses: Streaming<ServerReflectionResponse>,
}

impl ReflectionStream {
    /// Opens a reflection stream against `service`.
    ///
    /// Fails with [`ResolveError::ServerStreamInitFailed`] when the server
    /// does not expose `grpc.reflection.v1`.
    pub async fn open<S>(service: S) -> Result<Self, ResolveError>
    where
        S: GrpcService<tonic::body::Body>,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        let mut client = ServerReflectionClient::new(service);
        let (requests, rx) = mpsc::channel(100);

        let responses = client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ResolveError::ServerStreamInitFailed)?
            .into_inner();

        Ok(Self { requests, responses })
    }

    /// Lists the full names of all services the server exposes.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ResolveError> {
        self.send(MessageRequest::ListServices(String::new())).await?;

        match self.recv().await? {
            MessageResponse::ListServicesResponse(resp) => {
                Ok(resp.service.into_iter().map(|s| s.name).collect())
            }
            other => Err(ResolveError::UnexpectedResponseType(format!("{other:?}"))),
        }
    }

    /// Raw descriptor bytes of the file defining `symbol`, plus whatever
    /// extra files the server chose to batch along.
    pub async fn file_containing_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<Vec<Vec<u8>>, ResolveError> {
        self.send(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await?;
        self.recv_descriptors().await
    }

    /// Raw descriptor bytes of the file registered under `path`.
    pub async fn file_by_filename(&mut self, path: &str) -> Result<Vec<Vec<u8>>, ResolveError> {
        self.send(MessageRequest::FileByFilename(path.to_string()))
            .await?;
        self.recv_descriptors().await
    }

    async fn send(&self, message_request: MessageRequest) -> Result<(), ResolveError> {
        let req = ServerReflectionRequest {
            host: EMPTY_HOST.to_string(),
            message_request: Some(message_request),
        };

        self.requests
            .send(req)
            .await
            .map_err(|_| ResolveError::SendFailed)
    }

    async fn recv(&mut self) -> Result<MessageResponse, ResolveError> {
        let response = self
            .responses
            .message()
            .await
            .map_err(ResolveError::ServerStreamFailure)?
            .ok_or(ResolveError::StreamClosed)?;

        match response.message_response {
            Some(MessageResponse::ErrorResponse(e)) => Err(ResolveError::ServerError {
                code: e.error_code,
                message: e.error_message,
            }),
            Some(other) => Ok(other),
            None => Err(ResolveError::UnexpectedResponseType("Empty Message".into())),
        }
    }

    async fn recv_descriptors(&mut self) -> Result<Vec<Vec<u8>>, ResolveError> {
        match self.recv().await? {
            MessageResponse::FileDescriptorResponse(res) => Ok(res.file_descriptor_proto),
            other => Err(ResolveError::UnexpectedResponseType(format!("{other:?}"))),
        }
    }
}

/// Builds a [`DescriptorPool`] over one reflection stream.
///
/// The pool starts seeded with the `google.api` annotation schema and its
/// `google.protobuf` dependencies, so those imports never touch the wire.
/// Every file registered after that is cached: asking for the same path twice
/// costs one fetch.
pub struct DescriptorResolver<'a> {
    stream: &'a mut ReflectionStream,
    pool: DescriptorPool,
}

impl<'a> DescriptorResolver<'a> {
    pub fn new(stream: &'a mut ReflectionStream) -> Result<Self, ResolveError> {
        let pool = annotations::well_known_pool()?;
        Ok(Self { stream, pool })
    }

    /// Registers the raw descriptor bytes of `path`, fetching any imports the
    /// pool is still missing first.
    ///
    /// Registering a path the pool already holds returns the existing
    /// descriptor without touching the stream or the bytes.
    pub async fn register_file(
        &mut self,
        path: &str,
        raw: &[u8],
    ) -> Result<FileDescriptor, ResolveError> {
        if let Some(file) = self.pool.get_file_by_name(path) {
            return Ok(file);
        }

        let fd = FileDescriptorProto::decode(raw)?;
        for dep in &fd.dependency {
            if self.pool.get_file_by_name(dep).is_none() {
                self.find_file_by_path(dep).await?;
            }
        }

        self.add_raw(raw)?;
        self.pool
            .get_file_by_name(path)
            .ok_or_else(|| ResolveError::MissingFile(path.to_owned()))
    }

    /// Returns the descriptor registered under `path`, fetching it — and,
    /// recursively, everything it imports — when the pool does not hold it
    /// yet.
    pub fn find_file_by_path<'b>(
        &'b mut self,
        path: &'b str,
    ) -> BoxFuture<'b, Result<FileDescriptor, ResolveError>> {
        // Recursive over the import graph, hence the boxing.
        async move {
            if let Some(file) = self.pool.get_file_by_name(path) {
                return Ok(file);
            }

            tracing::debug!(path, "fetching file descriptor over reflection");
            let batch = self.stream.file_by_filename(path).await?;

            for raw in batch {
                let fd = FileDescriptorProto::decode(raw.as_slice())?;
                if self.pool.get_file_by_name(fd.name()).is_some() {
                    continue;
                }

                for dep in &fd.dependency {
                    if self.pool.get_file_by_name(dep).is_none() {
                        self.find_file_by_path(dep).await?;
                    }
                }

                self.add_raw(&raw)?;
            }

            self.pool
                .get_file_by_name(path)
                .ok_or_else(|| ResolveError::MissingFile(path.to_owned()))
        }
        .boxed()
    }

    /// The pool built so far.
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    fn add_raw(&mut self, raw: &[u8]) -> Result<(), DescriptorError> {
        // Frame the file bytes as a one-element FileDescriptorSet by hand;
        // round-tripping through prost-types here would drop the extension
        // options the bytes are being kept raw for.
        let mut set = Vec::with_capacity(raw.len() + 8);
        encode_key(1, WireType::LengthDelimited, &mut set);
        encode_varint(raw.len() as u64, &mut set);
        set.extend_from_slice(raw);

        self.pool.decode_file_descriptor_set(set.as_slice())?;
        Ok(())
    }
}
