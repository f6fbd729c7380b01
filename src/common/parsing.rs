// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use alloy::primitives::{Address, B256};

/// Parse the number of wrap/unwrap repetitions typed by the operator.
pub fn parse_repetition_count(raw: &str) -> Result<u32, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            field: "repetitions".into(),
            message: "input is empty".into(),
        });
    }
    let count: u32 = trimmed.parse().map_err(|_| AppError::Validation {
        field: "repetitions".into(),
        message: format!("`{trimmed}` is not a whole number"),
    })?;
    if count == 0 {
        return Err(AppError::Validation {
            field: "repetitions".into(),
            message: "must be at least 1".into(),
        });
    }
    Ok(count)
}

/// Comma or whitespace separated identifiers, lowercased, empties dropped.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn short_address(address: &Address) -> String {
    let full = format!("{address:#x}");
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

pub fn short_hash(hash: &B256) -> String {
    let full = format!("{hash:#x}");
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
