//! Route template and status code resolution.
//!
//! Maps a concrete request onto the low-cardinality labels used by the
//! default metrics: the matched route template (rather than the raw path)
//! and, optionally, the hundreds-class of the status code.

use http::StatusCode;

/// Label used for requests that matched no route when untemplated grouping
/// is enabled.
pub const UNTEMPLATED_HANDLER: &str = "none";

/// Outcome of mapping a request to a handler label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedHandler {
    /// The router matched a route; carries its template path, e.g. `/items/:id`.
    Template(String),
    /// No route matched; carries the raw request path.
    RawPath(String),
    /// No route matched and untemplated requests are grouped under a sentinel.
    Grouped,
    /// No route matched and untemplated requests are not instrumented at all.
    Ignored,
}

impl ResolvedHandler {
    /// The string that ends up in the `handler` label.
    pub fn label(&self) -> &str {
        match self {
            ResolvedHandler::Template(path) | ResolvedHandler::RawPath(path) => path,
            ResolvedHandler::Grouped | ResolvedHandler::Ignored => UNTEMPLATED_HANDLER,
        }
    }
}

/// Resolves the handler label for a request.
///
/// `matched` is the router's template for the request, absent when no route
/// matched (e.g. a 404 served by the fallback). Matched templates are
/// returned unmodified. Unmatched paths follow the configured policy:
/// ignored entirely, grouped under [`UNTEMPLATED_HANDLER`], or kept as the
/// raw path. Absence of a match is an expected case, never an error.
pub fn resolve_handler(
    matched: Option<&str>,
    raw_path: &str,
    should_ignore_untemplated: bool,
    should_group_untemplated: bool,
) -> ResolvedHandler {
    match matched {
        Some(template) => ResolvedHandler::Template(template.to_string()),
        None if should_ignore_untemplated => ResolvedHandler::Ignored,
        None if should_group_untemplated => ResolvedHandler::Grouped,
        None => ResolvedHandler::RawPath(raw_path.to_string()),
    }
}

/// Renders the `status` label for a response.
///
/// With grouping enabled, codes in 100..=599 collapse to their hundreds
/// class (`"2xx"`, `"5xx"`, ...). Codes outside that range pass through
/// ungrouped; classification is advisory, not a validity check.
pub fn status_label(status: StatusCode, should_group_status_codes: bool) -> String {
    let code = status.as_u16();
    if should_group_status_codes && (100..=599).contains(&code) {
        format!("{}xx", code / 100)
    } else {
        code.to_string()
    }
}
