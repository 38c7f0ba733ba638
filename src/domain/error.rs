//! Domain error types.

/// Top-level error type for backlab.
#[derive(Debug, thiserror::Error)]
pub enum BacklabError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("strategy {strategy} failed: {reason}")]
    StrategyComputation { strategy: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("invalid data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },

    #[error("group set not found: {name}")]
    GroupSetNotFound { name: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BacklabError> for std::process::ExitCode {
    fn from(err: &BacklabError) -> Self {
        let code: u8 = match err {
            BacklabError::Io(_) => 1,
            BacklabError::ConfigParse { .. }
            | BacklabError::ConfigMissing { .. }
            | BacklabError::ConfigInvalid { .. } => 2,
            BacklabError::Database { .. }
            | BacklabError::DatabaseQuery { .. }
            | BacklabError::Serialization(_) => 3,
            BacklabError::UnknownStrategy { .. } | BacklabError::StrategyComputation { .. } => 4,
            BacklabError::NoData { .. }
            | BacklabError::InvalidData { .. }
            | BacklabError::GroupSetNotFound { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
