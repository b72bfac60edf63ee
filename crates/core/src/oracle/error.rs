use chrono::NaiveDateTime;
use std::fmt;

/// Why the oracle refused a feature record.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleFailure {
    MissingFeature(String),
    UnexpectedFeature(String),
    TypeMismatch {
        feature: String,
        expected: &'static str,
        found: &'static str,
    },
    UnknownCategory {
        feature: String,
        value: String,
    },
    InvalidValue {
        feature: String,
        detail: String,
    },
    Model(String),
}

impl fmt::Display for OracleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFeature(name) => write!(f, "missing feature '{name}'"),
            Self::UnexpectedFeature(name) => write!(f, "unexpected feature '{name}'"),
            Self::TypeMismatch {
                feature,
                expected,
                found,
            } => write!(f, "feature '{feature}' expects {expected}, got {found}"),
            Self::UnknownCategory { feature, value } => {
                write!(f, "unknown category '{value}' for feature '{feature}'")
            }
            Self::InvalidValue { feature, detail } => {
                write!(f, "invalid value for feature '{feature}': {detail}")
            }
            Self::Model(detail) => write!(f, "model error: {detail}"),
        }
    }
}

impl std::error::Error for OracleFailure {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionStage {
    Estimate,
    History,
}

impl PredictionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStage::Estimate => "estimate",
            PredictionStage::History => "history",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionError {
    pub stage: PredictionStage,
    pub timestamp: NaiveDateTime,
    pub cause: OracleFailure,
}

impl PredictionError {
    pub fn new(stage: PredictionStage, timestamp: NaiveDateTime, cause: OracleFailure) -> Self {
        Self {
            stage,
            timestamp,
            cause,
        }
    }
}

impl fmt::Display for PredictionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (stage={}, timestamp={})",
            self.cause,
            self.stage.as_str(),
            self.timestamp.format("%Y-%m-%d %H:%M")
        )
    }
}

impl std::error::Error for PredictionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
