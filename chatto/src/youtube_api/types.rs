//! Shared types for the YouTube API client.

use serde::{Deserialize, Serialize};

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// The total number of results in the result set.
    pub total_results: u32,
    /// The number of results included in the API response.
    pub results_per_page: u32,
}

/// The envelope Google APIs wrap failures in.
///
/// ```json
/// {"error": {"code": 403, "message": "...", "errors": [{"message": "...", "reason": "..."}]}}
/// ```
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    message: Option<String>,
}

impl ErrorResponse {
    /// Extracts the most specific message from an error response body.
    ///
    /// Falls back to the raw text when the body is not a Google error envelope.
    pub(crate) fn message_from(text: &str) -> String {
        let Ok(response) = serde_json::from_str::<ErrorResponse>(text) else {
            return text.to_string();
        };
        response
            .error
            .errors
            .into_iter()
            .find_map(|e| e.message)
            .or(response.error.message)
            .unwrap_or_else(|| text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_message_prefers_first_error() {
        let body = r#"{
            "error": {
                "code": 403,
                "message": "Request had insufficient authentication scopes.",
                "errors": [{
                    "message": "The request cannot be completed because you have exceeded your quota.",
                    "domain": "youtube.quota",
                    "reason": "quotaExceeded"
                }]
            }
        }"#;
        assert_eq!(
            ErrorResponse::message_from(body),
            "The request cannot be completed because you have exceeded your quota."
        );
    }

    #[test]
    fn error_message_fallbacks() {
        assert_eq!(
            ErrorResponse::message_from(r#"{"error": {"code": 400, "message": "Bad Request"}}"#),
            "Bad Request"
        );
        assert_eq!(
            ErrorResponse::message_from(r#"{"error": {"code": 500, "errors": []}}"#),
            r#"{"error": {"code": 500, "errors": []}}"#
        );
        assert_eq!(
            ErrorResponse::message_from("upstream connect error"),
            "upstream connect error"
        );
    }
}
