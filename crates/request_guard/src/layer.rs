//! tower middleware: one monitor per `http` request, run under [`RequestGuard`]

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use dispatcher::{GrandOutput, Monitor};
use futures_util::future::BoxFuture;
use http::{Method, Request, Response, Uri};
use tower::{Layer, Service};

use crate::guard::{GuardError, GuardOptions, RequestGuard, UnitOfWork};

type StartHook = Arc<dyn Fn(&Monitor, &Method, &Uri) + Send + Sync>;

/// Layer producing [`RequestMonitorService`]s.
#[derive(Clone)]
pub struct RequestMonitorLayer {
    output: GrandOutput,
    guard: RequestGuard,
    on_start_request: Option<StartHook>,
}

impl fmt::Debug for RequestMonitorLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMonitorLayer")
            .field("guard", &self.guard)
            .field("on_start_request", &self.on_start_request.is_some())
            .finish()
    }
}

impl RequestMonitorLayer {
    pub fn new(output: GrandOutput) -> Self {
        Self {
            output,
            guard: RequestGuard::default(),
            on_start_request: None,
        }
    }

    pub fn with_options(mut self, options: GuardOptions) -> Self {
        self.guard = RequestGuard::new(options);
        self
    }

    pub fn swallow_errors(self, swallow: bool) -> Self {
        self.with_options(GuardOptions {
            swallow_errors: swallow,
        })
    }

    /// Hook called with the fresh monitor before the inner service runs.
    pub fn on_start_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Monitor, &Method, &Uri) + Send + Sync + 'static,
    {
        self.on_start_request = Some(Arc::new(hook));
        self
    }

    /// Start hook emitting `"Request Started: <method> <uri>"` at Info.
    pub fn log_request_start(self) -> Self {
        self.on_start_request(|monitor, method, uri| {
            monitor.info(format!("Request Started: {method} {uri}"));
        })
    }
}

impl<S> Layer<S> for RequestMonitorLayer {
    type Service = RequestMonitorService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestMonitorService {
            inner,
            output: self.output.clone(),
            guard: self.guard,
            on_start_request: self.on_start_request.clone(),
        }
    }
}

/// Service wrapping `S`; the request's [`Monitor`] is available to it in
/// the request extensions.
#[derive(Clone)]
pub struct RequestMonitorService<S> {
    inner: S,
    output: GrandOutput,
    guard: RequestGuard,
    on_start_request: Option<StartHook>,
}

impl<S, ReqB, ResB> Service<Request<ReqB>> for RequestMonitorService<S>
where
    S: Service<Request<ReqB>, Response = Response<ResB>> + Clone + Send + 'static,
    S::Error: Into<anyhow::Error>,
    S::Future: Send + 'static,
    ReqB: Send + 'static,
    ResB: Default + Send + 'static,
{
    type Response = Response<ResB>;
    type Error = GuardError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|e| GuardError::Faulted(e.into()))
    }

    fn call(&mut self, mut req: Request<ReqB>) -> Self::Future {
        let monitor = self.output.create_monitor();
        req.extensions_mut().insert(monitor.clone());
        if let Some(hook) = &self.on_start_request {
            hook(&monitor, req.method(), req.uri());
        }

        // The ready service is the one that must be called.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let guard = self.guard;
        let output = self.output.clone();

        Box::pin(async move {
            let mut scope = UnitOfWork::new(monitor).with_fallback(output);
            let result = guard
                .run(&mut scope, move || {
                    let response = inner.call(req);
                    async move { response.await.map_err(Into::into) }
                })
                .await?;
            match result {
                Some(response) => Ok(response),
                None => {
                    let mut response = Response::new(ResB::default());
                    if let Some(status) = scope.status() {
                        *response.status_mut() = status;
                    }
                    Ok(response)
                }
            }
        })
    }
}
