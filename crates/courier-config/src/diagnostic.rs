// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Converts Figment deserialization errors into miette diagnostics so the
//! binary can render actionable startup errors instead of a bare Debug dump.

use miette::Diagnostic;
use thiserror::Error;

/// A configuration error with diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A configuration key was not recognized or its value had the wrong shape.
    #[error("invalid configuration: {detail}")]
    #[diagnostic(
        code(courier::config::invalid),
        help("check courier.toml against the documented sections: log, storage, rates, lock, dispatch, campaign, http")
    )]
    Invalid {
        /// Figment's description of the failure, including the key path.
        detail: String,
    },

    /// A semantic validation failure for an otherwise well-formed value.
    #[error("validation error: {message}")]
    #[diagnostic(code(courier::config::validation))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Convert a figment error (which may aggregate several failures) into
/// individual [`ConfigError`] diagnostics.
pub fn figment_to_config_errors(err: &figment::Error) -> Vec<ConfigError> {
    err.clone()
        .into_iter()
        .map(|e| ConfigError::Invalid {
            detail: e.to_string(),
        })
        .collect()
}

/// Render configuration errors to stderr using miette's report formatting.
pub fn render_errors(errors: &[ConfigError]) {
    for error in errors {
        let report = miette::Report::msg(error.to_string());
        eprintln!("{report:?}");
    }
    eprintln!(
        "error: configuration invalid ({} problem{})",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
}
