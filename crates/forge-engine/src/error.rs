use thiserror::Error;

/// Failure kinds surfaced by the AI layer. Each maps to a stable code via
/// [`AiError::code`].
#[derive(Debug, Error)]
pub enum AiError {
    #[error("API key not found. Provide it in settings or `.env`.")]
    MissingCredential,

    #[error("AI request failed ({status}): {body}")]
    HttpFailure { status: u16, body: String },

    #[error("AI response is missing content.")]
    NoContent,

    #[error("Failed to parse AI JSON response: {preview}")]
    UnparsableResponse { preview: String },

    #[error("AI returned an unexpected format for {operation} (expected {expected}).")]
    InvalidResponseShape {
        operation: &'static str,
        expected: &'static str,
    },

    #[error("AI transport failed: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl AiError {
    pub fn transport(source: reqwest::Error) -> Self {
        Self::Transport {
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn transport_message(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub fn code(&self) -> String {
        match self {
            Self::MissingCredential => "NO_API_KEY".to_string(),
            Self::HttpFailure { status: 429, .. } => "RATE_LIMIT_429".to_string(),
            Self::HttpFailure { status: 401, .. } => "INVALID_KEY_401".to_string(),
            Self::HttpFailure { status, .. } => format!("HTTP_{status}"),
            Self::NoContent => "NO_CONTENT".to_string(),
            Self::UnparsableResponse { .. } => "INVALID_JSON".to_string(),
            Self::InvalidResponseShape { .. } => "INVALID_RESPONSE".to_string(),
            Self::Transport { .. } => "TRANSPORT_ERROR".to_string(),
        }
    }

    /// Text suitable for an error dialog.
    pub fn user_message(&self) -> String {
        match self {
            Self::HttpFailure { status: 429, .. } => {
                "High traffic. AI service is throttling requests. Try again shortly.".to_string()
            }
            Self::HttpFailure { status: 401, .. } => {
                "Invalid API Key. Please check your settings.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_distinguish_rate_limit_and_auth() {
        let throttled = AiError::HttpFailure {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(throttled.code(), "RATE_LIMIT_429");
        assert!(throttled.user_message().starts_with("High traffic"));

        let auth = AiError::HttpFailure {
            status: 401,
            body: String::new(),
        };
        assert_eq!(auth.code(), "INVALID_KEY_401");

        let server = AiError::HttpFailure {
            status: 503,
            body: "upstream down".to_string(),
        };
        assert_eq!(server.code(), "HTTP_503");
        assert_eq!(server.user_message(), "AI request failed (503): upstream down");
    }

    #[test]
    fn remaining_codes_are_stable() {
        assert_eq!(AiError::MissingCredential.code(), "NO_API_KEY");
        assert_eq!(AiError::NoContent.code(), "NO_CONTENT");
        assert_eq!(
            AiError::UnparsableResponse {
                preview: "x".to_string()
            }
            .code(),
            "INVALID_JSON"
        );
        assert_eq!(
            AiError::InvalidResponseShape {
                operation: "generate_ideas",
                expected: "array"
            }
            .code(),
            "INVALID_RESPONSE"
        );
        assert_eq!(
            AiError::transport_message("connection reset").code(),
            "TRANSPORT_ERROR"
        );
    }

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
