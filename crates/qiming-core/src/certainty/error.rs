use thiserror::Error;

use crate::certainty::CertaintyLevel;
use crate::kernel::error::ErrorKind;
use crate::pipeline::request::DataField;

/// Reason code attached to a refused upgrade
pub const DATA_INCOMPATIBLE: &str = "DATA_INCOMPATIBLE";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CertaintyError {
    #[error("Unknown certainty level: '{0}'")]
    UnknownLevel(String),

    #[error("DATA_INCOMPATIBLE: switching from {from} to {to} needs data that was not supplied: {}", format_fields(.missing_fields))]
    DataIncompatible {
        from: CertaintyLevel,
        to: CertaintyLevel,
        missing_fields: Vec<DataField>,
    },

    #[error("Invalid configuration for level {level}: {}", .reasons.join("; "))]
    ConfigInvalid { level: CertaintyLevel, reasons: Vec<String> },

    #[error("Switching from {from} to {to} failed: {message}")]
    SwitchFailed {
        from: CertaintyLevel,
        to: CertaintyLevel,
        message: String,
    },
}

fn format_fields(fields: &[DataField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl CertaintyError {
    /// Machine-readable reason for a refused switch
    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            CertaintyError::DataIncompatible { .. } => Some(DATA_INCOMPATIBLE),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CertaintyError::UnknownLevel(_) | CertaintyError::DataIncompatible { .. } => {
                ErrorKind::ValidationFailed
            }
            CertaintyError::ConfigInvalid { .. } => ErrorKind::ConfigInvalid,
            CertaintyError::SwitchFailed { .. } => ErrorKind::SystemError,
        }
    }
}
