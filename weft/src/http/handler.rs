use super::request::Request;
use super::response::Response;
use crate::log::HandlerFailure;
use crate::runtime::scheduler::Scheduler;
use crate::runtime::task::Unit;

use indexmap::IndexMap;

use std::fmt;
use std::rc::Rc;

/// Application logic answering requests for one route.
///
/// Every method returns a [`Unit`], so a handler may answer immediately
/// (`Unit::ready(response)`) or suspend first, e.g. on a timed wait or an
/// outbound request. Methods not overridden answer `405`.
pub trait Handler {
    fn get(&self, _request: &Request) -> Unit<Response> {
        Unit::ready(Response::method_not_allowed())
    }

    fn post(&self, _request: &Request) -> Unit<Response> {
        Unit::ready(Response::method_not_allowed())
    }

    fn put(&self, _request: &Request) -> Unit<Response> {
        Unit::ready(Response::method_not_allowed())
    }

    fn delete(&self, _request: &Request) -> Unit<Response> {
        Unit::ready(Response::method_not_allowed())
    }

    /// Picks the method to run for `request`.
    fn handle(&self, request: &Request) -> Unit<Response> {
        match request.method.as_str() {
            "GET" => self.get(request),
            "POST" => self.post(request),
            "PUT" => self.put(request),
            "DELETE" => self.delete(request),
            _ => Unit::ready(Response::method_not_allowed()),
        }
    }
}

/// Answers `404` to every method.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotFound;

impl Handler for NotFound {
    fn handle(&self, _request: &Request) -> Unit<Response> {
        Unit::ready(Response::not_found())
    }
}

/// A handler answering `GET` with a closure.
pub struct FnHandler<F> {
    get: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Request) -> Unit<Response>,
{
    pub fn new(get: F) -> Self {
        Self { get }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request) -> Unit<Response>,
{
    fn get(&self, request: &Request) -> Unit<Response> {
        (self.get)(request)
    }
}

/// Exact-path routing table with a fallback handler.
///
/// # Examples
///
/// ```rust,ignore
/// let router = Router::new()
///     .route("/", HomeHandler)
///     .get("/health", |_| Unit::ready(Response::text(200, "ok")));
/// ```
pub struct Router {
    routes: IndexMap<String, Rc<dyn Handler>>,
    fallback: Rc<dyn Handler>,
}

impl Router {
    /// Creates an empty table whose fallback answers `404`.
    pub fn new() -> Self {
        Self {
            routes: IndexMap::new(),
            fallback: Rc::new(NotFound),
        }
    }

    /// Routes `path` to `handler`, replacing any previous handler.
    pub fn route(mut self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.routes.insert(path.into(), Rc::new(handler));
        self
    }

    /// Routes `GET path` to a closure.
    pub fn get<F>(self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Request) -> Unit<Response> + 'static,
    {
        self.route(path, FnHandler::new(f))
    }

    /// Sets the handler for paths without a route.
    pub fn fallback(mut self, handler: impl Handler + 'static) -> Self {
        self.fallback = Rc::new(handler);
        self
    }

    /// Returns the handler for `path`.
    pub fn lookup(&self, path: &str) -> Rc<dyn Handler> {
        self.routes
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Runs the handler method matching `request`.
///
/// A handler error (or a panic inside the handler's unit) does not escape:
/// it is reported to the running scheduler's [`LogSink`] and answered with
/// `500`.
///
/// [`LogSink`]: crate::log::LogSink
pub fn dispatch(handler: &dyn Handler, request: &Request) -> Unit<Response> {
    let unit = handler.handle(request);

    let method = request.method.clone();
    let path = request.path.clone();

    Unit::new(async move {
        match unit.await {
            Ok(response) => Ok(response),
            Err(error) => {
                let failure = HandlerFailure {
                    method,
                    path,
                    message: error.to_string(),
                };

                match Scheduler::current() {
                    Some(scheduler) => scheduler.sink().handler_failed(&failure),
                    None => tracing::error!(%failure, "handler failed"),
                }

                Ok(Response::internal_error())
            }
        }
    })
}
