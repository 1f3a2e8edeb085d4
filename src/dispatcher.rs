//! Turns a parsed request into a response using a shared [`RouteTable`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::http::{Request, Response};
use crate::router::RouteTable;

/// Runs the first route that accepts a request.
///
/// Cloning a dispatcher is cheap; every worker holds its own clone pointing
/// at the same table.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    table: Arc<RouteTable>,
}

impl RequestDispatcher {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Dispatches `request` and returns the response to send.
    ///
    /// The matching route's handler receives a fresh `200 OK` response to
    /// fill in. If no route matches, a `404 Not Found` response is returned
    /// and no handler runs. A handler that panics yields
    /// `500 Internal Server Error`; the panic does not escape.
    pub fn dispatch(&self, request: &mut Request) -> Response {
        let Some(route) = self.table.find(request) else {
            warn!(method = %request.method(), path = request.path(), "no route defined");
            return Response::not_found();
        };

        debug!(
            method = %request.method(),
            path = request.path(),
            template = route.pattern().template(),
            controller = route.controller(),
            "route matched"
        );

        let request: &Request = request;
        let mut response = Response::default();
        match catch_unwind(AssertUnwindSafe(|| route.call(request, &mut response))) {
            Ok(()) => response,
            Err(_) => {
                error!(
                    method = %request.method(),
                    path = request.path(),
                    controller = route.controller(),
                    "handler panicked"
                );
                Response::internal_error()
            }
        }
    }
}
