use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{debug, info, warn};
use std::rc::Rc;
use std::time::Instant;
use tracing::Instrument;

use crate::error::{RequestId, REQUEST_ID_HEADER};

/// Request logging middleware
///
/// Assigns each request an id, exposes it to handlers through `RequestId`
/// in the request extensions and returns it in the `x-request-id` header.
/// Logs method, path, status and latency for every request. Query strings
/// and headers are never logged since they may carry credentials.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        let request_id = RequestId::generate();
        req.extensions_mut().insert(request_id.clone());
        let http_req = req.request().clone();

        debug!("Request started: {} {} request_id={}", method, path, request_id.0);

        let span = tracing::info_span!("request", request_id = %request_id.0);
        let service = self.service.clone();

        Box::pin(
            async move {
                let mut res = match service.call(req).await {
                    Ok(res) => res.map_into_left_body(),
                    Err(e) => {
                        // rejected by an inner middleware before reaching a handler
                        info!(
                            "Request rejected: {} {} - Status: {} ({}ms) request_id={}",
                            method,
                            path,
                            e.as_response_error().status_code().as_u16(),
                            start_time.elapsed().as_millis(),
                            request_id.0
                        );
                        ServiceResponse::from_err(e, http_req).map_into_right_body()
                    }
                };

                if let Ok(value) = HeaderValue::from_str(&request_id.0) {
                    res.headers_mut()
                        .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
                }

                let elapsed = start_time.elapsed().as_millis();
                let status = res.status();

                if status.is_server_error() {
                    warn!(
                        "Request failed: {} {} - Status: {} ({}ms) request_id={}",
                        method,
                        path,
                        status.as_u16(),
                        elapsed,
                        request_id.0
                    );
                } else {
                    info!(
                        "Request completed: {} {} - Status: {} ({}ms) request_id={}",
                        method,
                        path,
                        status.as_u16(),
                        elapsed,
                        request_id.0
                    );
                }

                Ok(res)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AuthError, ErrorContext};
    use actix_web::{test, web, App, HttpRequest, HttpResponse};

    async fn echo_request_id(req: HttpRequest) -> HttpResponse {
        let context = ErrorContext::for_request(&req, "echo");
        HttpResponse::Ok().body(context.request_id)
    }

    async fn always_fails() -> Result<HttpResponse, AppError> {
        Err(AuthError::InvalidCredentials.into())
    }

    fn header_id<B>(res: &ServiceResponse<B>) -> String {
        res.headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .expect("missing request id header")
            .to_string()
    }

    #[actix_web::test]
    async fn test_handler_and_header_share_one_request_id() {
        let app = test::init_service(
            App::new()
                .wrap(LoggerMiddleware)
                .route("/echo", web::get().to(echo_request_id)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/echo").to_request()).await;
        let header = header_id(&res);
        let body = test::read_body(res).await;

        assert_eq!(body, header.as_bytes());
    }

    #[actix_web::test]
    async fn test_error_responses_carry_request_id() {
        let app = test::init_service(
            App::new()
                .wrap(LoggerMiddleware)
                .route("/fail", web::get().to(always_fails)),
        )
        .await;

        let first = test::call_service(&app, test::TestRequest::get().uri("/fail").to_request()).await;
        let second = test::call_service(&app, test::TestRequest::get().uri("/fail").to_request()).await;

        assert_eq!(first.status().as_u16(), 401);
        assert_ne!(header_id(&first), header_id(&second));
    }
}
