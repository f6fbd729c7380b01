// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod execution;
pub mod session;
pub mod sink;
pub mod strategy;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;
