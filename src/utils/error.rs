use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarrierError {
    #[error("Carrier authentication failed: {message}")]
    AuthError {
        message: String,
        status_code: Option<u16>,
        response_body: serde_json::Value,
    },

    #[error("Carrier API request failed: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
        response_body: serde_json::Value,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl CarrierError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CarrierError::AuthError { status_code, .. }
            | CarrierError::ApiError { status_code, .. } => *status_code,
            _ => None,
        }
    }

    pub fn response_body(&self) -> Option<&serde_json::Value> {
        match self {
            CarrierError::AuthError { response_body, .. }
            | CarrierError::ApiError { response_body, .. } => Some(response_body),
            _ => None,
        }
    }

    /// 網路錯誤、逾時、429 與 5xx 可以由呼叫端自行決定是否重試
    pub fn is_retryable(&self) -> bool {
        match self {
            CarrierError::AuthError { status_code, .. }
            | CarrierError::ApiError { status_code, .. } => match status_code {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CarrierError::AuthError { .. } => {
                "Check the carrier account/secure pair and the sandbox flag"
            }
            CarrierError::ApiError { .. } if self.is_retryable() => {
                "The carrier is unreachable or overloaded, try again later"
            }
            CarrierError::ApiError { .. } => {
                "Inspect the carrier response body for rejected fields"
            }
            CarrierError::IoError(_) => "Check that the file exists and is readable",
            CarrierError::SerializationError(_) => "Check the JSON input format",
            CarrierError::ConfigError { .. }
            | CarrierError::InvalidConfigValueError { .. } => {
                "Review the configuration file and environment variables"
            }
        }
    }
}

/// 訂單無法在物流商登記的原因，呼叫端應保留訂單並標記人工處理
#[derive(Error, Debug)]
pub enum RegistrationFailure {
    #[error("carrier credentials are not configured")]
    NotConfigured,

    #[error("origin pickup point code is not configured")]
    MissingOriginPoint,

    #[error("order has no packages to ship")]
    NoPackages,

    #[error("delivery destination cannot be determined")]
    UnresolvableDestination,

    #[error("carrier rejected the order (state=INVALID): {errors}")]
    Rejected { errors: serde_json::Value },

    #[error("carrier response contains no tracking id")]
    MissingTrackingId { response: serde_json::Value },

    #[error(transparent)]
    Carrier(#[from] CarrierError),
}

pub type Result<T> = std::result::Result<T, CarrierError>;
