//! The listening server: accept loop, worker pool and route registration.
//!
//! Routes are registered on a bound [`Server`] before it starts. Starting
//! consumes the server, freezes the route table behind an `Arc`, spawns the
//! worker pool and then runs the accept loop on the calling task. Every
//! accepted connection goes straight onto the shared queue; there is no limit
//! on how many may wait there.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::http::{Method, MethodFilter};
use crate::router::{Handler, PatternError, RouteTable};
use crate::worker::{ConnectionHandle, WorkerPool};

/// Errors produced while setting up the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A bound HTTP server that has not started serving yet.
///
/// # Examples
///
/// ```rust,no_run
/// use waypost::config::ServerConfig;
/// use waypost::http::{Method, Request, Response};
/// use waypost::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut server = Server::bind(ServerConfig::new("127.0.0.1", 8080, 4)).await?;
///     server.route(
///         "/user/:id([0-9]+)",
///         |req: &Request, res: &mut Response| {
///             res.write(format!("user {}", req.param("id").unwrap_or_default()));
///         },
///         Method::Get,
///     )?;
///     server.start().await;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    routes: RouteTable,
}

impl Server {
    /// Validates `config` and binds its address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for an invalid configuration and
    /// [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            config,
            routes: RouteTable::new(),
        })
    }

    /// The address actually bound, useful when the configured port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Registers `handler` for `template`.
    ///
    /// Pass [`MethodFilter::Any`] to accept every method.
    ///
    /// # Errors
    ///
    /// A [`PatternError`] if the template does not compile. Setup should
    /// stop there; the route is not registered.
    pub fn route(
        &mut self,
        template: &str,
        handler: impl Handler,
        method: impl Into<MethodFilter>,
    ) -> Result<&mut Self, PatternError> {
        self.routes.route(template, handler, method)?;
        Ok(self)
    }

    pub fn get(&mut self, template: &str, handler: impl Handler) -> Result<&mut Self, PatternError> {
        self.route(template, handler, Method::Get)
    }

    pub fn post(&mut self, template: &str, handler: impl Handler) -> Result<&mut Self, PatternError> {
        self.route(template, handler, Method::Post)
    }

    /// Serves until the process exits.
    pub async fn start(self) {
        self.start_with_shutdown(std::future::pending()).await;
    }

    /// Serves until `signal` completes, then shuts down.
    ///
    /// Shutdown stops accepting first, then waits for the workers to finish
    /// any connections still queued, and finally drops the route table.
    pub async fn start_with_shutdown(self, signal: impl Future<Output = ()>) {
        let Self {
            listener,
            local_addr,
            config,
            routes,
        } = self;

        info!("starting server");
        let routes = Arc::new(routes);
        let mut pool: WorkerPool<TcpStream> =
            WorkerPool::new(config.workers, Arc::clone(&routes), config.max_request_size);
        pool.start();

        info!(
            address = %local_addr,
            workers = config.workers,
            routes = routes.len(),
            "server listening"
        );

        tokio::pin!(signal);
        loop {
            tokio::select! {
                () = &mut signal => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "connection accepted");
                        if pool.queue().add(ConnectionHandle::new(stream, peer)).is_err() {
                            warn!(peer = %peer, "connection queue closed, dropping connection");
                        }
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                },
            }
        }

        info!("stopping server");
        drop(listener);
        pool.shutdown().await;
        drop(routes);
        info!("server stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;
    use crate::http::{Request, Response};

    fn local() -> ServerConfig {
        ServerConfig::new("127.0.0.1", 0, 2)
    }

    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn zero_workers_is_rejected_before_binding() {
        let err = Server::bind(ServerConfig::new("127.0.0.1", 0, 0)).await.err().unwrap();
        assert!(matches!(err, ServerError::Config(ConfigError::NoWorkers)));
    }

    #[tokio::test]
    async fn address_in_use_is_a_bind_error() {
        let first = Server::bind(local()).await.unwrap();
        let port = first.local_addr().port();

        let err = Server::bind(ServerConfig::new("127.0.0.1", port, 1)).await.err().unwrap();
        match err {
            ServerError::Bind { addr, source } => {
                assert_eq!(addr, format!("127.0.0.1:{port}"));
                assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
            }
            other => panic!("expected a bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_template_halts_registration() {
        let mut server = Server::bind(local()).await.unwrap();
        let result = server.get("/user/:id([0-9)", |_req: &Request, _res: &mut Response| {});
        assert!(result.is_err());
        assert!(server.routes().is_empty());
    }

    #[tokio::test]
    async fn serves_routes_over_tcp_and_shuts_down() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let mut server = Server::bind(local()).await.unwrap();
        let addr = server.local_addr();
        server
            .get("/user/:id([0-9]+)", move |req: &Request, res: &mut Response| {
                counter.fetch_add(1, Ordering::SeqCst);
                res.write(format!("user {}", req.param("id").unwrap_or("?")));
            })
            .unwrap()
            .post("/user", |_req: &Request, res: &mut Response| {
                res.set_status(crate::http::StatusCode::Created);
            })
            .unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(server.start_with_shutdown(async {
            let _ = stopped.await;
        }));

        let ok = exchange(addr, b"GET /user/42 HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(ok.starts_with("HTTP/1.1 200 OK\r\n"), "{ok}");
        assert!(ok.ends_with("user 42"));

        let created = exchange(addr, b"POST /user HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await;
        assert!(created.starts_with("HTTP/1.1 201 Created\r\n"), "{created}");

        let missing = exchange(addr, b"GET /nowhere HTTP/1.1\r\n\r\n").await;
        assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"), "{missing}");

        let garbage = exchange(addr, b"\x00\x00\x00\r\n\r\n").await;
        assert!(garbage.is_empty());

        let after = exchange(addr, b"GET /user/7 HTTP/1.1\r\n\r\n").await;
        assert!(after.ends_with("user 7"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        stop.send(()).unwrap();
        running.await.unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
