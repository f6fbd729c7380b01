// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod cycle;

pub use cycle::{CycleContext, CycleExit, CycleReport, CycleSettings, Phase, SwapCycleController};
