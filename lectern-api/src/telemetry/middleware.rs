//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in a `tracing` span (exported through the
//! OpenTelemetry layer when one is installed), continues any incoming W3C
//! trace context and records Prometheus metrics.

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use opentelemetry::{global, propagation::Extractor, Context};
use std::time::Instant;
use tracing::{info_span, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::metrics::with_metrics;

/// Route label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Reads propagation headers out of an HTTP header map.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Continue the caller's trace, if any. Returns whether a parent was set.
///
/// Fails when no OpenTelemetry layer is installed, which is the normal case
/// with OTLP export disabled.
fn attach_remote_parent(span: &tracing::Span, headers: &HeaderMap) -> bool {
    match span.set_parent(extract_trace_context(headers)) {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(error = %err, "Request span not linked to remote trace context");
            false
        }
    }
}

/// Route template for metric labels. Unknown paths share one label so
/// scanners cannot blow up label cardinality.
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %route,
        http.status_code = tracing::field::Empty,
        otel.kind = "server",
    );
    attach_remote_parent(&span, request.headers());

    let response = next.run(request).instrument(span.clone()).await;

    let duration = start.elapsed();
    let status = response.status();
    span.record("http.status_code", status.as_u16());

    with_metrics(|m| {
        m.record_http_request(method.as_str(), &route, status.as_u16(), duration.as_secs_f64())
    });

    tracing::info!(
        parent: &span,
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_extractor_reads_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );
        let extractor = HeaderExtractor(&headers);
        assert!(extractor.get("traceparent").is_some());
        assert_eq!(extractor.keys(), vec!["traceparent"]);
        assert!(extractor.get("tracestate").is_none());
    }

    #[test]
    fn test_attach_parent_without_otel_layer_reports_failure() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );
        let subscriber = tracing_subscriber::registry();
        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("http_request");
            assert!(!attach_remote_parent(&span, &headers));
        });
    }

    #[test]
    fn test_route_label_without_match() {
        let request = Request::builder()
            .uri("/wp-admin/setup.php")
            .body(axum::body::Body::empty());
        match request {
            Ok(request) => assert_eq!(route_label(&request), UNMATCHED_ROUTE),
            Err(e) => panic!("failed to build request: {}", e),
        }
    }
}
