use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Correlation id for one HTTP request, echoed in the `x-request-id` header
/// and in every response envelope.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Reuses a non-blank inbound `x-request-id` or mints a v4 UUID, exposes it to
/// handlers as a [`RequestId`] extension and copies it onto the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    use super::*;

    fn echo_app() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|Extension(id): Extension<RequestId>| async move { id.0 }),
            )
            .layer(axum::middleware::from_fn(request_id))
    }

    fn get_echo(request_id: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/echo");
        if let Some(id) = request_id {
            builder = builder.header("x-request-id", id);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn incoming_request_id_is_echoed() {
        let res = echo_app().oneshot(get_echo(Some("req-123"))).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-request-id"], "req-123");
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"req-123");
    }

    #[tokio::test]
    async fn blank_request_id_is_replaced_with_a_uuid() {
        let res = echo_app().oneshot(get_echo(Some("  "))).await.unwrap();

        let id = res.headers()["x-request-id"].to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok(), "got {id}");
    }
}
