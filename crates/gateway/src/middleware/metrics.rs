//! Request count and latency per matched route

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use viewer_common::metrics::RequestMetrics;

/// Label requests by route template so path parameters do not explode cardinality
fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

pub async fn track_metrics(request: Request, next: Next) -> Response {
    let timer = RequestMetrics::start(request.method().as_str(), &endpoint_label(&request));
    let response = next.run(request).await;
    timer.finish(response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_unmatched_label() {
        let request = Request::builder().uri("/nowhere").body(Body::empty()).unwrap();
        assert_eq!(endpoint_label(&request), "unmatched");
    }
}
