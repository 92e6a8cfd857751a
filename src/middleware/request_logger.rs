//! Request logging middleware.
//!
//! Each request runs inside a `request` span carrying a generated request ID,
//! so logs emitted by handlers and services can be correlated.

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Request logger middleware factory.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware { service }))
    }
}

/// Request logger middleware service.
pub struct RequestLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        // Never log the query string: it may carry the API key
        let path = req.path().to_string();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        let span = info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %method,
            path = %path,
        );

        span.in_scope(|| {
            debug!(target: "api", remote_addr = %remote_addr, "Request started");
        });

        let fut = span.in_scope(|| self.service.call(req));

        Box::pin(
            async move {
                let res = fut.await?;
                let elapsed = start.elapsed();
                let status = res.status();
                let status_code = status.as_u16();

                if status.is_success() || status.is_redirection() {
                    info!(
                        target: "api",
                        status = status_code,
                        duration_ms = elapsed.as_millis() as u64,
                        "Request completed"
                    );
                } else if status.is_client_error() {
                    warn!(
                        target: "api",
                        status = status_code,
                        duration_ms = elapsed.as_millis() as u64,
                        "Client error"
                    );
                } else {
                    warn!(
                        target: "api",
                        status = status_code,
                        duration_ms = elapsed.as_millis() as u64,
                        "Server error"
                    );
                }

                Ok(res)
            }
            .instrument(span),
        )
    }
}
