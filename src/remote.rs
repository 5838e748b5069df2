//! Helpers shared by every HTTP collaborator.
//!
//! All the endpoints this crate talks to answer failures with a small JSON
//! body, `{error}` or `{error, details}`. Which field is most useful differs:
//! the analysis relay puts the upstream text in `error`, the render and
//! share endpoints put it in `details`.

use crate::error::SidekickError;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    details: Option<String>,
}

/// Which field of an error body to surface first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefer {
    Error,
    Details,
}

/// Pick the human-readable message out of an error response body.
///
/// Falls back to `fallback` when the body is not JSON or the fields are
/// missing or empty.
pub fn failure_message(body: &str, prefer: Prefer, fallback: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
    let (first, second) = match prefer {
        Prefer::Error => (non_empty(parsed.error), non_empty(parsed.details)),
        Prefer::Details => (non_empty(parsed.details), non_empty(parsed.error)),
    };
    first.or(second).unwrap_or_else(|| fallback.to_string())
}

/// Turn a non-2xx response into a [`SidekickError::RemoteService`].
pub async fn failure(
    service: &str,
    response: reqwest::Response,
    prefer: Prefer,
    fallback: &str,
) -> SidekickError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SidekickError::remote(service, Some(status), failure_message(&body, prefer, fallback))
}

/// Map a transport-level failure (DNS, refused, reset) to a remote error.
pub fn unreachable(service: &str, err: reqwest::Error) -> SidekickError {
    SidekickError::remote(service, err.status().map(|s| s.as_u16()), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_preferred_for_relay() {
        let body = r#"{"error":"Anthropic API error: 529 overloaded"}"#;
        assert_eq!(
            failure_message(body, Prefer::Error, "Failed to analyze content"),
            "Anthropic API error: 529 overloaded"
        );
    }

    #[test]
    fn details_preferred_for_delivery() {
        let body = r#"{"error":"Failed to send email","details":"SendGrid API key not configured"}"#;
        assert_eq!(
            failure_message(body, Prefer::Details, "Failed to send email"),
            "SendGrid API key not configured"
        );
    }

    #[test]
    fn falls_back_on_garbage() {
        assert_eq!(failure_message("<html>502</html>", Prefer::Error, "fallback"), "fallback");
        assert_eq!(failure_message(r#"{"error":""}"#, Prefer::Error, "fallback"), "fallback");
    }

    #[test]
    fn uses_other_field_when_preferred_is_missing() {
        assert_eq!(
            failure_message(r#"{"error":"Missing HTML content"}"#, Prefer::Details, "x"),
            "Missing HTML content"
        );
    }
}
