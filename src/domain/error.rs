// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use thiserror::Error;

/// Lowercase fragments RPC nodes use when the submitted nonce was already taken.
const NONCE_COLLISION_MARKERS: [&str; 5] = [
    "nonce too low",
    "nonce has already been used",
    "nonce already used",
    "already known",
    "replacement transaction underpriced",
];

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("RPC call failed: {0}")]
    Rpc(String),

    #[error("Transaction failed: {hash:?}, reason: {reason}")]
    Transaction { hash: String, reason: String },

    #[error("Nonce already consumed: {0}")]
    NonceConflict(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Strategy {0} is already running")]
    AlreadyRunning(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

impl AppError {
    /// True when the failure means the nonce handed to the task is no longer usable.
    pub fn is_nonce_collision(&self) -> bool {
        match self {
            AppError::NonceConflict(_) => true,
            other => is_nonce_collision_message(&other.to_string()),
        }
    }
}

pub fn is_nonce_collision_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    NONCE_COLLISION_MARKERS
        .iter()
        .any(|marker| msg.contains(marker))
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
