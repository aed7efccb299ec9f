//! W3C trace-context headers for calls to the upstream API.
//!
//! When OTLP export is on, outbound requests carry the current span's
//! `traceparent` (and `tracestate` if any) so the upstream hop lines up with
//! our own trace. With export off the span context is invalid and nothing is
//! added.

use opentelemetry::trace::{SpanContext, TraceContextExt};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// `version-trace_id-span_id-flags`, version 00.
pub fn format_traceparent(span_context: &SpanContext) -> String {
    format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    )
}

/// Trace headers for `span_context`; empty when the context is invalid.
pub fn trace_headers(span_context: &SpanContext) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if !span_context.is_valid() {
        return headers;
    }

    if let Ok(value) = HeaderValue::from_str(&format_traceparent(span_context)) {
        headers.insert(TRACEPARENT_HEADER, value);
    }

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty()
        && let Ok(value) = HeaderValue::from_str(&tracestate)
    {
        headers.insert(TRACESTATE_HEADER, value);
    }

    headers
}

/// Trace headers for the span the caller is running in.
pub fn current_trace_headers() -> HeaderMap {
    let context = Span::current().context();
    trace_headers(context.span().span_context())
}

/// A POST that picks up trace headers at send time.
pub struct TracedRequest {
    request: reqwest::RequestBuilder,
}

impl TracedRequest {
    pub fn json<T: serde::Serialize + ?Sized>(self, json: &T) -> Self {
        Self {
            request: self.request.json(json),
        }
    }

    pub fn bearer_auth<T: std::fmt::Display>(self, token: T) -> Self {
        Self {
            request: self.request.bearer_auth(token),
        }
    }

    pub async fn send(self) -> Result<reqwest::Response, reqwest::Error> {
        self.request.headers(current_trace_headers()).send().await
    }
}

pub trait TracedClientExt {
    fn traced_post(&self, url: &str) -> TracedRequest;
}

impl TracedClientExt for reqwest::Client {
    fn traced_post(&self, url: &str) -> TracedRequest {
        TracedRequest {
            request: self.post(url),
        }
    }
}
