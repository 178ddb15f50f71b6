//! Domain error types.

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data unavailable for {instrument}: {reason}")]
    Unavailable { instrument: String, reason: String },

    #[error("insufficient data for {instrument}: have {bars} bars, need {minimum}")]
    InsufficientData {
        instrument: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid entry price {price}")]
    InvalidPrice { price: f64 },

    #[error("position already open for {instrument}")]
    LedgerInvariantViolation { instrument: String },

    #[error("built without the `{feature}` feature")]
    FeatureDisabled { feature: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// True for failures that only skip one instrument for one cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TraderError::Unavailable { .. }
                | TraderError::InsufficientData { .. }
                | TraderError::InvalidPrice { .. }
        )
    }

    pub(crate) fn invalid_config(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::FeatureDisabled { .. } => 1,
            TraderError::ConfigParse { .. } | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Database { .. } | TraderError::DatabaseQuery { .. } => 3,
            TraderError::LedgerInvariantViolation { .. } | TraderError::InvalidPrice { .. } => 4,
            TraderError::Unavailable { .. } | TraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
