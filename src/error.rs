use thiserror::Error;

/// Main error type for the concept highlighter
#[derive(Error, Debug)]
pub enum HighlighterError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

impl HighlighterError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a file I/O error
    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    /// Map a non-success HTTP status from the Gemini API to an error.
    pub fn from_status(status: u16) -> Self {
        let message = match status {
            400 => "Invalid request to Gemini API. Please check your API key and try again.".to_string(),
            403 => "API key access denied. Please verify your Gemini API key permissions.".to_string(),
            404 => "API endpoint not found. Please verify your API key is for Google Gemini API.".to_string(),
            429 => "API rate limit exceeded. Please wait a moment and try again.".to_string(),
            s if s >= 500 => "Gemini API server error. Please try again later.".to_string(),
            s => format!("Gemini API error: {}", s),
        };
        Self::Api { status, message }
    }

    /// Check if error is recoverable (the pipeline may continue with the next item)
    pub fn is_recoverable(&self) -> bool {
        match self {
            HighlighterError::Http(_) => true,
            HighlighterError::Api { status, .. } => *status == 429 || *status >= 500,
            HighlighterError::InvalidResponse { .. } => true,
            HighlighterError::Configuration { .. } => false,
            HighlighterError::FileIO { .. } => false,
            _ => true,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HighlighterError::Configuration { message } => {
                format!("⚙️ {}. Run `concept-highlighter config init` to set up.", message)
            }
            HighlighterError::InvalidInput { message } => format!("📄 {}", message),
            HighlighterError::Http(_) => {
                "🌐 Network error: Unable to connect to Gemini API. Please check your internet connection.".to_string()
            }
            HighlighterError::Api { message, .. } => format!("🤖 {}", message),
            HighlighterError::InvalidResponse { .. } => {
                "🤖 Failed to parse AI response. The response format may be invalid.".to_string()
            }
            HighlighterError::FileIO { path, .. } => {
                format!("📁 File access error for {}. Check file permissions.", path)
            }
            _ => "🧠 Something went wrong. Check the logs for details.".to_string(),
        }
    }
}

/// Result type alias for convenience
pub type HighlighterResult<T> = Result<T, HighlighterError>;

/// Error context for adding additional information
pub trait ErrorContext<T> {
    fn with_path(self, path: &str) -> HighlighterResult<T>;
}

impl<T> ErrorContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &str) -> HighlighterResult<T> {
        self.map_err(|e| HighlighterError::file_io(path, e))
    }
}
