//! Route registration and first-match lookup.
//!
//! A [`RouteTable`] is an ordered list of [`Route`]s. It is built on one
//! thread before the server starts and then shared read-only with every
//! worker behind an `Arc`; once shared there is no way to get `&mut` access
//! to it again, so lookups need no locking.
//!
//! Routes are tried in registration order and the first one whose method
//! constraint and template both accept the request wins. There is no
//! specificity ranking: register narrow routes before broad ones.

use std::any::type_name;
use std::fmt;

use tracing::debug;

use crate::http::{Method, MethodFilter, Request, Response};

mod handler;
pub mod pattern;

pub use handler::Handler;
pub use pattern::{PatternError, RoutePattern};

/// A compiled template bound to the handler it dispatches to.
pub struct Route {
    pattern: RoutePattern,
    handler: Box<dyn Handler>,
    controller: &'static str,
}

impl Route {
    /// Compiles `template` and binds it to `handler`.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if the template cannot be compiled.
    pub fn new<H: Handler>(
        template: &str,
        handler: H,
        method: impl Into<MethodFilter>,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: RoutePattern::compile(template, method.into())?,
            handler: Box::new(handler),
            controller: type_name::<H>(),
        })
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Type name of the bound handler, used in diagnostics.
    pub fn controller(&self) -> &'static str {
        self.controller
    }

    /// See [`RoutePattern::matches`].
    pub fn matches(&self, request: &mut Request) -> bool {
        self.pattern.matches(request)
    }

    pub fn call(&self, request: &Request, response: &mut Response) {
        self.handler.invoke(request, response);
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", self.pattern.method())
            .field("template", &self.pattern.template())
            .field("controller", &self.controller)
            .finish()
    }
}

/// Ordered set of routes; registration order is matching priority.
///
/// ```
/// use waypost::http::{Method, Request, Response};
/// use waypost::router::RouteTable;
///
/// let mut routes = RouteTable::new();
/// routes
///     .get("/user/:id([0-9]+)", |req: &Request, res: &mut Response| {
///         res.write(req.param("id").unwrap_or_default());
///     })
///     .unwrap();
///
/// let mut request = Request::new(Method::Get, "/user/42");
/// let route = routes.find(&mut request).unwrap();
/// assert_eq!(route.pattern().template(), "/user/:id([0-9]+)");
/// assert_eq!(request.param("id"), Some("42"));
/// ```
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `template`, restricted by `method`.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if the template cannot be compiled; the
    /// table is left unchanged.
    pub fn route(
        &mut self,
        template: &str,
        handler: impl Handler,
        method: impl Into<MethodFilter>,
    ) -> Result<&mut Self, PatternError> {
        let route = Route::new(template, handler, method)?;
        debug!(
            method = %route.pattern().method(),
            template,
            controller = route.controller(),
            "registering route"
        );
        self.routes.push(route);
        Ok(self)
    }

    /// Registers a route that accepts every method.
    pub fn any(&mut self, template: &str, handler: impl Handler) -> Result<&mut Self, PatternError> {
        self.route(template, handler, MethodFilter::Any)
    }

    pub fn get(&mut self, template: &str, handler: impl Handler) -> Result<&mut Self, PatternError> {
        self.route(template, handler, Method::Get)
    }

    pub fn post(&mut self, template: &str, handler: impl Handler) -> Result<&mut Self, PatternError> {
        self.route(template, handler, Method::Post)
    }

    pub fn put(&mut self, template: &str, handler: impl Handler) -> Result<&mut Self, PatternError> {
        self.route(template, handler, Method::Put)
    }

    pub fn delete(&mut self, template: &str, handler: impl Handler) -> Result<&mut Self, PatternError> {
        self.route(template, handler, Method::Delete)
    }

    pub fn patch(&mut self, template: &str, handler: impl Handler) -> Result<&mut Self, PatternError> {
        self.route(template, handler, Method::Patch)
    }

    /// Returns the first route that accepts `request`, binding its
    /// parameters into the request.
    pub fn find(&self, request: &mut Request) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(request))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;

    fn status(code: StatusCode) -> impl Fn(&Request, &mut Response) + Send + Sync + 'static {
        move |_req: &Request, res: &mut Response| res.set_status(code)
    }

    fn run(table: &RouteTable, method: Method, path: &str) -> Option<StatusCode> {
        let mut req = Request::new(method, path);
        let route = table.find(&mut req)?;
        let mut res = Response::default();
        route.call(&req, &mut res);
        Some(res.status())
    }

    #[test]
    fn starts_empty() {
        let table = RouteTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.find(&mut Request::new(Method::Get, "/")).is_none());
    }

    #[test]
    fn registration_preserves_order() {
        let mut table = RouteTable::new();
        table
            .get("/a", status(StatusCode::Ok))
            .unwrap()
            .post("/b", status(StatusCode::Created))
            .unwrap()
            .any("/c", status(StatusCode::Accepted))
            .unwrap();

        let templates: Vec<_> = table.iter().map(|r| r.pattern().template()).collect();
        assert_eq!(templates, ["/a", "/b", "/c"]);
    }

    #[test]
    fn failed_registration_leaves_table_unchanged() {
        let mut table = RouteTable::new();
        table.get("/ok", status(StatusCode::Ok)).unwrap();
        assert!(table.get("/bad/:id([)", status(StatusCode::Ok)).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn first_registered_match_wins() {
        let mut table = RouteTable::new();
        table.any("/user/:id([0-9]+)", status(StatusCode::Ok)).unwrap();
        table.any("/user/42", status(StatusCode::Accepted)).unwrap();

        assert_eq!(run(&table, Method::Get, "/user/42"), Some(StatusCode::Ok));
    }

    #[test]
    fn later_route_is_reached_when_earlier_rejects_method() {
        let mut table = RouteTable::new();
        table.get("/items", status(StatusCode::Ok)).unwrap();
        table.post("/items", status(StatusCode::Created)).unwrap();

        assert_eq!(run(&table, Method::Get, "/items"), Some(StatusCode::Ok));
        assert_eq!(run(&table, Method::Post, "/items"), Some(StatusCode::Created));
        assert_eq!(run(&table, Method::Put, "/items"), None);
    }

    #[test]
    fn method_helpers_constrain_routes() {
        let mut table = RouteTable::new();
        table.put("/r", status(StatusCode::Ok)).unwrap();
        table.delete("/r", status(StatusCode::NoContent)).unwrap();
        table.patch("/r", status(StatusCode::Accepted)).unwrap();

        assert_eq!(run(&table, Method::Put, "/r"), Some(StatusCode::Ok));
        assert_eq!(run(&table, Method::Delete, "/r"), Some(StatusCode::NoContent));
        assert_eq!(run(&table, Method::Patch, "/r"), Some(StatusCode::Accepted));
        assert_eq!(run(&table, Method::Get, "/r"), None);
    }

    #[test]
    fn controller_name_identifies_handler_type() {
        struct Users;
        impl Handler for Users {
            fn invoke(&self, _request: &Request, _response: &mut Response) {}
        }

        let route = Route::new("/users", Users, MethodFilter::Any).unwrap();
        assert!(route.controller().ends_with("Users"));
    }
}
