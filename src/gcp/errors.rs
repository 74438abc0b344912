use thiserror::Error;

/// Failures talking to Google Cloud, Airflow or the chat webhook
#[derive(Debug, Error)]
pub enum CloudError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure raised inside the retry middleware stack
    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// The API answered with a non-success status
    #[error("API error ({status}) from {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Token could not be obtained from the metadata server
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A response lacked a field the workflow depends on
    #[error("Missing resource: {0}")]
    MissingResource(String),
}

impl From<url::ParseError> for CloudError {
    fn from(err: url::ParseError) -> Self {
        CloudError::InvalidUrl(err.to_string())
    }
}

impl CloudError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Api { status, .. } => Some(*status),
            CloudError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
