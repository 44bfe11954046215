use std::fmt;

/// Application-level error: a message plus the process exit code it maps to.
///
/// Exit codes:
/// - `2` usage, configuration, or I/O problems
/// - `3` no usable data after ingest
/// - `4` computation failure
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Which kind of key a lookup referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Region,
    Industry,
    Pair,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyKind::Region => "region",
            KeyKind::Industry => "industry",
            KeyKind::Pair => "region/industry pair",
        };
        f.write_str(s)
    }
}

/// Recoverable engine failures.
///
/// Neither variant is fatal to a run: per-pair results carry them so the caller
/// can decide (via `UndefinedPolicy`) whether to blank, zero, or drop the row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A zero denominator in a quotient or shrinkage weight.
    #[error("undefined ratio: {what}")]
    UndefinedRatio { what: String },

    /// A region or industry referenced by a computation but absent from the base table.
    #[error("missing {kind} `{key}` in base table")]
    MissingKey { kind: KeyKind, key: String },
}

impl EngineError {
    pub fn undefined(what: impl Into<String>) -> Self {
        EngineError::UndefinedRatio { what: what.into() }
    }

    pub fn missing(kind: KeyKind, key: impl fmt::Display) -> Self {
        EngineError::MissingKey {
            kind,
            key: key.to_string(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, EngineError::UndefinedRatio { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_ratio_message_names_the_denominator() {
        let err = EngineError::undefined("vhm is zero");
        assert_eq!(err.to_string(), "undefined ratio: vhm is zero");
        assert!(err.is_undefined());
    }

    #[test]
    fn missing_key_message_names_kind() {
        let err = EngineError::missing(KeyKind::Industry, "42----");
        assert_eq!(err.to_string(), "missing industry `42----` in base table");
        assert!(!err.is_undefined());
    }
}
