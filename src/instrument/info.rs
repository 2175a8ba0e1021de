//! The per-request snapshot handed to every metric updater.

use http::{header, HeaderMap, Method, StatusCode};

/// Immutable, request-scoped snapshot built once per completed
/// request/response cycle, after the response is finalized.
///
/// Every registered [`MetricUpdater`](crate::metrics::MetricUpdater)
/// receives the same `Info` for a given request. Construction is pure:
/// all derived fields (handler label, status label, rounded duration,
/// clamped sizes) are computed up front so updaters only read.
#[derive(Debug, Clone)]
pub struct Info {
    /// Request method.
    pub method: Method,
    /// The concrete request path, before template resolution.
    pub raw_path: String,
    /// Resolved handler label: route template, raw path, or the `"none"`
    /// sentinel, per the untemplated-route policy.
    pub handler: String,
    /// Raw response status code.
    pub status: StatusCode,
    /// The `status` label value: grouped (`"2xx"`) or raw (`"201"`),
    /// per configuration.
    pub status_label: String,
    /// Elapsed handler time in seconds, measured on a monotonic clock and
    /// rounded per configuration.
    pub duration_seconds: f64,
    /// Request body size in bytes, `None` when the `Content-Length` header
    /// is absent or unparseable. Unknown sizes must be excluded from size
    /// aggregation, never counted as zero.
    pub request_size: Option<u64>,
    /// Response body size in bytes, same semantics as `request_size`.
    pub response_size: Option<u64>,
    /// Request headers, for updaters deriving labels from them.
    pub request_headers: HeaderMap,
    /// Response headers.
    pub response_headers: HeaderMap,
}

/// Extracts a byte count from the `Content-Length` header.
///
/// Absent, non-UTF-8, or non-numeric values yield `None` ("unknown").
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}

/// Rounds a duration in seconds to the configured number of decimal places.
/// `None` leaves the value untouched.
pub fn round_seconds(seconds: f64, decimals: Option<u32>) -> f64 {
    match decimals {
        Some(places) => {
            let factor = 10f64.powi(places as i32);
            (seconds * factor).round() / factor
        }
        None => seconds,
    }
}

/// Caps an observed body size at the configured limit, if any.
pub fn clamp_size(size: Option<u64>, limit: Option<u64>) -> Option<u64> {
    match limit {
        Some(max) => size.map(|value| value.min(max)),
        None => size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers_with_length(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(value).expect("header value"),
        );
        headers
    }

    #[test]
    fn content_length_parses_valid_header() {
        assert_eq!(content_length(&headers_with_length("123")), Some(123));
        assert_eq!(content_length(&headers_with_length("0")), Some(0));
    }

    #[test]
    fn content_length_is_unknown_when_absent() {
        assert_eq!(content_length(&HeaderMap::new()), None);
    }

    #[test]
    fn content_length_is_unknown_when_unparseable() {
        assert_eq!(content_length(&headers_with_length("abc")), None);
        assert_eq!(content_length(&headers_with_length("-5")), None);
        assert_eq!(content_length(&headers_with_length("12.5")), None);
    }

    #[test]
    fn rounding_applies_configured_decimals() {
        assert_eq!(round_seconds(0.123456, Some(4)), 0.1235);
        assert_eq!(round_seconds(0.123456, Some(0)), 0.0);
        assert_eq!(round_seconds(0.123456, None), 0.123456);
    }

    #[test]
    fn clamp_caps_known_sizes_only() {
        assert_eq!(clamp_size(Some(5000), Some(1024)), Some(1024));
        assert_eq!(clamp_size(Some(10), Some(1024)), Some(10));
        assert_eq!(clamp_size(None, Some(1024)), None);
        assert_eq!(clamp_size(Some(5000), None), Some(5000));
    }
}
