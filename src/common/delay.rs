// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Sleep for `delay` unless `cancel` fires first.
pub async fn wait_with_cancel(delay: Duration, cancel: &CancellationToken) -> WaitOutcome {
    if cancel.is_cancelled() {
        return WaitOutcome::Cancelled;
    }
    tokio::select! {
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        _ = sleep(delay) => WaitOutcome::Elapsed,
    }
}

/// Uniform delay in `[min, max]` with millisecond resolution.
pub fn random_delay(min: Duration, max: Duration) -> Duration {
    let lo = min.as_millis() as u64;
    let hi = max.as_millis() as u64;
    if hi <= lo {
        return min;
    }
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

/// "M min S sec" rendering used in cycle log lines.
pub fn describe_delay(delay: Duration) -> String {
    let secs = delay.as_secs();
    format!("{} min {} sec", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn elapses_without_cancellation() {
        let token = CancellationToken::new();
        let started = Instant::now();
        let outcome = wait_with_cancel(Duration::from_secs(45), &token).await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
        assert!(started.elapsed() >= Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_the_wait_short() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let outcome = wait_with_cancel(Duration::from_secs(60), &token).await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn already_cancelled_token_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            wait_with_cancel(Duration::from_secs(3600), &token).await,
            WaitOutcome::Cancelled
        );
    }

    #[test]
    fn random_delay_stays_in_bounds() {
        let min = Duration::from_secs(30);
        let max = Duration::from_secs(60);
        for _ in 0..200 {
            let d = random_delay(min, max);
            assert!(d >= min && d <= max);
        }
        assert_eq!(random_delay(max, min), max);
        assert_eq!(describe_delay(Duration::from_millis(95_400)), "1 min 35 sec");
    }
}
