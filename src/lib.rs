//! # waypost
//!
//! Route matching and connection dispatch for an embeddable HTTP/1.1 server.
//!
//! Routes are path templates with optional regex-captured parameters such as
//! `/user/:id([0-9]+)`. A fixed pool of workers pulls accepted connections
//! from one shared queue, reads a single request from each, runs the first
//! matching route and writes the response back before closing the
//! connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waypost::{Request, Response, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind(ServerConfig::new("127.0.0.1", 8080, 4)).await?;
//!     server.get("/hello/:name([a-z]+)", |req: &Request, res: &mut Response| {
//!         res.write(format!("Hello, {}!", req.param("name").unwrap_or("world")));
//!     })?;
//!     server.start().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod http;
pub mod router;
pub mod server;
pub mod worker;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{ConfigError, ServerConfig};
pub use dispatcher::RequestDispatcher;
pub use http::{Headers, Method, MethodFilter, Request, Response, StatusCode};
pub use router::{Handler, PatternError, RoutePattern, RouteTable};
pub use server::{Server, ServerError};
pub use worker::{ConnectionHandle, ConnectionQueue, ConnectionWorker, CycleOutcome, WorkerPool};
