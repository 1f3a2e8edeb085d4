//! Connection workers and the pool that runs them.
//!
//! Each [`ConnectionWorker`] loops over the same five steps: take a
//! connection from the shared [`ConnectionQueue`], read one request, parse
//! it, dispatch it and write the response back. Whatever goes wrong with one
//! connection is logged and the worker moves on to the next; no error leaves
//! the worker.

use std::borrow::Cow;
use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::dispatcher::RequestDispatcher;
use crate::http::{Request, RequestError, StatusCode};

pub mod pool;
pub mod queue;

pub use pool::WorkerPool;
pub use queue::{ConnectionHandle, ConnectionQueue};

/// How much of an unparseable request is echoed into the log.
const RAW_LOG_LIMIT: usize = 256;

fn log_preview(raw: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(&raw[..raw.len().min(RAW_LOG_LIMIT)])
}

/// Why a connection was dropped without a response.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("peer closed the connection before sending a request")]
    Closed,

    #[error("failed to read request: {0}")]
    Read(#[source] io::Error),

    #[error("could not parse request: {0}")]
    Parse(#[from] RequestError),

    #[error("failed to write response: {0}")]
    Write(#[source] io::Error),
}

/// What happened to one connection.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A response was written. `sent < expected` means the write came up
    /// short; the remainder is not retried.
    Responded {
        status: StatusCode,
        sent: usize,
        expected: usize,
    },
    Abandoned(CycleError),
}

impl CycleOutcome {
    /// `true` only if the whole response went out.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Responded { sent, expected, .. } if sent == expected)
    }
}

/// A long-lived consumer of the connection queue.
#[derive(Debug)]
pub struct ConnectionWorker<S> {
    id: usize,
    queue: Arc<ConnectionQueue<S>>,
    dispatcher: RequestDispatcher,
    max_request_size: usize,
}

impl<S> ConnectionWorker<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        id: usize,
        queue: Arc<ConnectionQueue<S>>,
        dispatcher: RequestDispatcher,
        max_request_size: usize,
    ) -> Self {
        Self {
            id,
            queue,
            dispatcher,
            max_request_size,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Serves connections until the queue is closed and drained.
    pub async fn run(self) {
        debug!(worker = self.id, "worker started");
        while let Some(connection) = self.queue.take().await {
            self.serve(connection).await;
        }
        debug!(worker = self.id, "worker stopped");
    }

    /// Runs one read → parse → dispatch → respond cycle.
    ///
    /// The connection is consumed and closed on every path.
    pub async fn serve(&self, connection: ConnectionHandle<S>) -> CycleOutcome {
        let (mut stream, peer) = connection.into_parts();
        debug!(worker = self.id, peer = %peer, "new client connection");

        let mut buf = BytesMut::with_capacity(self.max_request_size);
        let read = match stream.read_buf(&mut buf).await {
            Ok(0) => {
                error!(worker = self.id, peer = %peer, "failed to read request from client: no data");
                return CycleOutcome::Abandoned(CycleError::Closed);
            }
            Ok(n) => n,
            Err(e) => {
                error!(worker = self.id, peer = %peer, error = %e, "failed to read request from client");
                return CycleOutcome::Abandoned(CycleError::Read(e));
            }
        };
        debug!(worker = self.id, peer = %peer, bytes = read, "read request");

        let mut request = match Request::parse(&buf) {
            Ok(request) => request,
            Err(e) => {
                error!(
                    worker = self.id,
                    peer = %peer,
                    error = %e,
                    bytes = buf.len(),
                    raw = %log_preview(&buf),
                    "could not parse request"
                );
                return CycleOutcome::Abandoned(e.into());
            }
        };

        let response = self.dispatcher.dispatch(&mut request);
        let status = response.status();
        let bytes = response.to_bytes();

        let sent = match stream.write(&bytes).await {
            Ok(n) => n,
            Err(e) => {
                error!(worker = self.id, peer = %peer, error = %e, "failed to send response");
                return CycleOutcome::Abandoned(CycleError::Write(e));
            }
        };
        if sent < bytes.len() {
            error!(
                worker = self.id,
                peer = %peer,
                sent,
                expected = bytes.len(),
                "could not send whole response"
            );
        }

        if let Err(e) = stream.shutdown().await {
            debug!(worker = self.id, peer = %peer, error = %e, "shutdown after response failed");
        }

        info!(
            worker = self.id,
            peer = %peer,
            method = %request.method(),
            path = request.path(),
            status = status.as_u16(),
            "request served"
        );

        CycleOutcome::Responded {
            status,
            sent,
            expected: bytes.len(),
        }
    }
}
