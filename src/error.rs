use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    #[error("Page creation failed: {0}")]
    PageCreationError(String),

    #[error("Navigation failed: {0}")]
    NavigationError(String),

    #[error("Content load timed out after {0:?}")]
    ContentLoadTimeout(Duration),

    #[error("Render failed: {0}")]
    RenderError(String),

    #[error("Remote gateway unavailable: {0}")]
    RemoteGatewayUnavailable(String),

    #[error("Remote gateway error: {0}")]
    RemoteGatewayError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Render service unreachable: {0}")]
    ServiceUnreachable(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RenderError {
    /// HTTP status the dispatcher answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RenderError::InvalidRequest(_) => 400,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RenderError::InvalidRequest(_) => ErrorSeverity::Low,
            RenderError::NavigationError(_) | RenderError::ContentLoadTimeout(_) => {
                ErrorSeverity::Medium
            }
            RenderError::RemoteGatewayError(_)
            | RenderError::InvalidArtifact(_)
            | RenderError::ServiceUnreachable(_) => {
                ErrorSeverity::Medium
            }
            RenderError::LaunchError(_) | RenderError::ConfigurationError(_) => {
                ErrorSeverity::Critical
            }
            RenderError::RemoteGatewayUnavailable(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Short machine-friendly label used as a metrics/log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::InvalidRequest(_) => "invalid_request",
            RenderError::LaunchError(_) => "launch",
            RenderError::PageCreationError(_) => "page_creation",
            RenderError::NavigationError(_) => "navigation",
            RenderError::ContentLoadTimeout(_) => "content_timeout",
            RenderError::RenderError(_) => "render",
            RenderError::RemoteGatewayUnavailable(_) => "gateway_unavailable",
            RenderError::RemoteGatewayError(_) => "gateway",
            RenderError::ConfigurationError(_) => "configuration",
            RenderError::ServiceUnreachable(_) => "service_unreachable",
            RenderError::InvalidArtifact(_) => "invalid_artifact",
            RenderError::IoError(_) => "io",
            RenderError::SerializationError(_) => "serialization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        RenderError::RemoteGatewayError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_request_is_a_client_error() {
        assert_eq!(RenderError::InvalidRequest("x".into()).status_code(), 400);
        assert!(RenderError::InvalidRequest("x".into()).is_client_error());

        let server_side = [
            RenderError::LaunchError("x".into()),
            RenderError::PageCreationError("x".into()),
            RenderError::NavigationError("x".into()),
            RenderError::ContentLoadTimeout(Duration::from_secs(60)),
            RenderError::RenderError("x".into()),
            RenderError::RemoteGatewayUnavailable("x".into()),
            RenderError::RemoteGatewayError("x".into()),
        ];
        for err in server_side {
            assert_eq!(err.status_code(), 500, "{err}");
        }
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(RenderError::InvalidRequest("x".into()).severity(), ErrorSeverity::Low);
        assert_eq!(RenderError::NavigationError("x".into()).severity(), ErrorSeverity::Medium);
        assert_eq!(RenderError::RenderError("x".into()).severity(), ErrorSeverity::High);
        assert_eq!(RenderError::LaunchError("x".into()).severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn timeout_message_names_the_bound() {
        let err = RenderError::ContentLoadTimeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Content load timed out after 60s");
    }
}
