//! Error type shared by every fallible operation in the runtime.
//!
//! Three kinds of failure exist:
//!
//! - **Programming errors** (a missing required component, a rect without a
//!   size, an asset that is absent after every loader has settled) are
//!   returned as [`KaboomError`] values immediately.
//! - **Not yet loaded** is not an error. Draw helpers skip the draw and
//!   return `Ok(())` while an asset is still pending.
//! - **Fatal errors** are any `Err` that escapes a frame. The frame loop
//!   stores it, stops running game logic and draws a diagnostic screen
//!   (see [`debug`](crate::debug)).

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, KaboomError>;

#[derive(Debug, Error)]
pub enum KaboomError {
    #[error("Component \"{comp}\" requires component \"{requires}\"")]
    MissingRequire { comp: String, requires: String },

    #[error("invalid draw arguments: {0}")]
    InvalidDrawArgs(String),

    #[error("{kind} not found: \"{name}\"")]
    AssetMissing { kind: &'static str, name: String },

    #[error("failed to load \"{name}\": {reason}")]
    AssetLoad { name: String, reason: String },

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl KaboomError {
    /// Build a user error from anything printable. Handy inside callbacks:
    /// `return Err(KaboomError::custom("boss escaped"))`.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Short name shown as the title of the fatal error screen.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MissingRequire { .. } => "MissingRequire",
            Self::InvalidDrawArgs(_) => "InvalidDrawArgs",
            Self::AssetMissing { .. } => "AssetMissing",
            Self::AssetLoad { .. } => "AssetLoad",
            Self::Gpu(_) => "GpuError",
            Self::Config(_) => "ConfigError",
            Self::Custom(_) => "Error",
        }
    }

    pub(crate) fn draw_args(msg: impl Into<String>) -> Self {
        Self::InvalidDrawArgs(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_require_message() {
        let err = KaboomError::MissingRequire {
            comp: "body".into(),
            requires: "area".into(),
        };
        assert_eq!(err.to_string(), "Component \"body\" requires component \"area\"");
        assert_eq!(err.name(), "MissingRequire");
    }

    #[test]
    fn config_errors_convert() {
        let bad: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: KaboomError = bad.unwrap_err().into();
        assert_eq!(err.name(), "ConfigError");
    }
}
