// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Assertion helpers for check bodies.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, bail};
use harness_client::{ClientError, StatusCode};
use tokio::time::Instant;

/// Accept either outcome of a call racing the client deadline against the
/// engine's deadline: `DEADLINE_EXCEEDED` when the engine gives up first,
/// `CANCELLED` when the client does.
pub fn expect_deadline_or_cancelled<T>(result: Result<T, ClientError>) -> anyhow::Result<StatusCode> {
    match result {
        Ok(_) => bail!("call succeeded, expected DEADLINE_EXCEEDED or CANCELLED"),
        Err(e) => match e.status_code() {
            Some(code @ (StatusCode::DeadlineExceeded | StatusCode::Cancelled)) => Ok(code),
            _ => Err(e).context("expected DEADLINE_EXCEEDED or CANCELLED"),
        },
    }
}

/// Expect a bounded result wait to expire.
pub fn expect_timeout<T>(result: Result<T, ClientError>) -> anyhow::Result<()> {
    match result {
        Ok(_) => bail!("result arrived, expected a timeout"),
        Err(e) if e.is_timeout() => Ok(()),
        Err(e) => Err(e).context("expected a timeout"),
    }
}

/// Poll `condition` every `interval` until it reports true, failing once
/// `timeout` has passed.
pub async fn wait_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_deadline_or_cancelled_accepts_both() {
        let deadline: Result<(), _> = Err(ClientError::service(StatusCode::DeadlineExceeded, "no worker"));
        assert_eq!(
            expect_deadline_or_cancelled(deadline).unwrap(),
            StatusCode::DeadlineExceeded
        );

        let cancelled: Result<(), _> = Err(ClientError::service(StatusCode::Cancelled, "client deadline"));
        assert_eq!(
            expect_deadline_or_cancelled(cancelled).unwrap(),
            StatusCode::Cancelled
        );
    }

    #[test]
    fn test_deadline_or_cancelled_rejects_others() {
        assert!(expect_deadline_or_cancelled(Ok(1)).is_err());

        let not_found: Result<(), _> = Err(ClientError::service(StatusCode::NotFound, "gone"));
        let err = expect_deadline_or_cancelled(not_found).unwrap_err();
        assert!(format!("{:#}", err).contains("NOT_FOUND"));
    }

    #[test]
    fn test_expect_timeout() {
        let timed_out: Result<(), _> = Err(ClientError::Timeout(Duration::from_secs(1)));
        assert!(expect_timeout(timed_out).is_ok());
        assert!(expect_timeout(Ok(())).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_polls_until_true() {
        let calls = AtomicU32::new(0);
        wait_until(Duration::from_secs(1), Duration::from_millis(100), || async {
            Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2)
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_gives_up() {
        let err = wait_until(Duration::from_millis(300), Duration::from_millis(100), || async {
            Ok(false)
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not met"));
    }
}
