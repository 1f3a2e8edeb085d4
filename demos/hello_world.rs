//! Minimal server with a literal route, a parameterised route and a
//! controller type. Stop it with Ctrl-C.
//!
//! ```sh
//! RUST_LOG=debug cargo run --example hello_world
//! curl http://127.0.0.1:8080/user/42
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::EnvFilter;
use waypost::{Handler, Method, MethodFilter, Request, Response, Server, ServerConfig, StatusCode};

/// Counts the requests it has answered.
#[derive(Default)]
struct Counter {
    hits: AtomicU64,
}

impl Handler for Counter {
    fn invoke(&self, _request: &Request, response: &mut Response) {
        let n = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
        response.write(format!("{n}\n"));
    }
}

fn show_user(request: &Request, response: &mut Response) {
    response.set_header("Content-Type", "application/json");
    response.write(format!(
        r#"{{"id":{}}}"#,
        request.param("id").unwrap_or("null")
    ));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut server = Server::bind(ServerConfig::default()).await?;
    server
        .route("/", |_req: &Request, res: &mut Response| res.write("Hello, World!\n"), MethodFilter::Any)?
        .route("/user/:id([0-9]+)", show_user, Method::Get)?
        .route("/hits", Counter::default(), Method::Get)?
        .route(
            "/user/:id([0-9]+)",
            |_req: &Request, res: &mut Response| res.set_status(StatusCode::NoContent),
            Method::Delete,
        )?;

    println!("Listening on http://{}", server.local_addr());
    server
        .start_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
