// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

// =============================================================================
// NETWORK
// =============================================================================

pub const DEFAULT_NETWORK_NAME: &str = "RISE TESTNET";

// =============================================================================
// GAS & TRANSACTION
// =============================================================================

pub const DEFAULT_GAS_LIMIT: u64 = 100_000;
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1_000;

// =============================================================================
// SWAP CYCLE
// =============================================================================

/// Bounds for the randomized wrap/unwrap amount, in whole native units.
pub const DEFAULT_SWAP_AMOUNT_MIN_ETH: f64 = 0.0001;
pub const DEFAULT_SWAP_AMOUNT_MAX_ETH: f64 = 0.001;
/// Decimal places kept before converting the amount to wei.
pub const SWAP_AMOUNT_DECIMALS: usize = 6;

pub const DEFAULT_CYCLE_DELAY_MIN_SECS: u64 = 30;
pub const DEFAULT_CYCLE_DELAY_MAX_SECS: u64 = 60;

pub const DEFAULT_STRATEGIES: [&str; 2] = ["gaspump", "clober"];
