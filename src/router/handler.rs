use crate::http::{Request, Response};

/// Something a route can invoke once a request has matched it.
///
/// A controller type implements `Handler` directly; plain closures and
/// functions with the signature `Fn(&Request, &mut Response)` are handlers
/// through the blanket impl below. Handlers run on worker tasks and are
/// shared by all of them, hence the `Send + Sync` bound.
///
/// ```
/// use waypost::http::{Request, Response, StatusCode};
/// use waypost::router::Handler;
///
/// struct Health;
///
/// impl Handler for Health {
///     fn invoke(&self, _request: &Request, response: &mut Response) {
///         response.set_status(StatusCode::NoContent);
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Populates `response` for `request`.
    fn invoke(&self, request: &Request, response: &mut Response);
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    fn invoke(&self, request: &Request, response: &mut Response) {
        (self)(request, response)
    }
}
