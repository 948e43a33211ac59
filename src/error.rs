use std::fmt;

/// Central error types for the catch upload pipeline
#[derive(Debug)]
pub enum AppError {
    /// Database error (rusqlite)
    Database(rusqlite::Error),
    /// Filesystem error
    Filesystem(std::io::Error),
    /// Payload could not be (de)serialized
    Serialization(serde_json::Error),
    /// Configuration file could not be parsed or is invalid
    Config(String),
    /// Validation error (e.g. invalid form input)
    Validation(String),
    /// Resource not found
    NotFound(String),
    /// Image processing error
    ImageProcessing(String),
    /// Remote API or connectivity error
    Network(String),
    /// General error
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
            AppError::Serialization(e) => write!(f, "Serialization error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ImageProcessing(msg) => write!(f, "Image processing error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Database(e) => Some(e),
            AppError::Filesystem(e) => Some(e),
            AppError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

// Conversions from other error types
impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Filesystem(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<photo_codec::CodecError> for AppError {
    fn from(e: photo_codec::CodecError) -> Self {
        AppError::ImageProcessing(e.to_string())
    }
}

impl AppError {
    /// User-friendly error messages for the UI
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Serialization(_) => {
                "Your data could not be saved on this device. Please try again.".to_string()
            }
            AppError::Filesystem(_) => {
                "Error accessing files. Please check app permissions.".to_string()
            }
            AppError::Config(msg) => format!("Invalid settings: {}", msg),
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg) => format!("{} was not found.", msg),
            AppError::ImageProcessing(_) => "Error processing photo.".to_string(),
            AppError::Network(_) => "Could not reach the server.".to_string(),
            AppError::Other(msg) => msg.clone(),
        }
    }
}
