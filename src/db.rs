use std::{fmt::Display, future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;

/// Bounded retry with linearly increasing delay: after the n-th failed
/// attempt the caller waits `n * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Runs `op` until it succeeds or the policy is exhausted, returning the last
/// error in the latter case. `sleep` is injected so callers can skip real waits.
pub async fn retry_with_backoff<T, E, Op, OpFut, Sleep, SleepFut>(
    policy: RetryPolicy,
    mut op: Op,
    mut sleep: Sleep,
) -> Result<T, E>
where
    E: Display,
    Op: FnMut(u32) -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                error!(attempt, max_attempts, error = %e, "giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed; retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Opens the connection pool, retrying per `cfg.retry`. Exhaustion is
/// returned as an error and treated as fatal by the caller.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = retry_with_backoff(
        cfg.retry,
        |attempt| {
            info!(attempt, "connecting to database");
            PgPoolOptions::new()
                .max_connections(cfg.max_connections)
                .connect_with(cfg.connect_options.clone())
        },
        tokio::time::sleep,
    )
    .await
    .with_context(|| {
        format!(
            "connect to database after {} attempts",
            cfg.retry.max_attempts
        )
    })?;

    info!("database connection established");
    Ok(pool)
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run database migrations")?;
    info!("database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(2),
        }
    }

    #[test]
    fn delay_grows_linearly() {
        let p = policy();
        assert_eq!(p.delay_after(1), Duration::from_secs(2));
        assert_eq!(p.delay_after(2), Duration::from_secs(4));
        assert_eq!(p.delay_after(9), Duration::from_secs(18));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let mut calls = 0u32;
        let mut slept = Vec::new();

        let result = retry_with_backoff(
            policy(),
            |attempt| {
                calls += 1;
                ready(if attempt < 3 {
                    Err("connection refused")
                } else {
                    Ok(attempt)
                })
            },
            |d| {
                slept.push(d);
                ready(())
            },
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
        assert_eq!(slept, vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let mut calls = 0u32;
        let mut slept = Vec::new();

        let result: Result<(), &str> = retry_with_backoff(
            policy(),
            |_| {
                calls += 1;
                ready(Err("connection refused"))
            },
            |d| {
                slept.push(d);
                ready(())
            },
        )
        .await;

        assert_eq!(result, Err("connection refused"));
        assert_eq!(calls, 10);
        // no wait after the final attempt
        assert_eq!(slept.len(), 9);
        assert_eq!(slept.last(), Some(&Duration::from_secs(18)));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let mut calls = 0u32;
        let result: Result<(), &str> = retry_with_backoff(
            RetryPolicy {
                max_attempts: 0,
                base_delay: Duration::from_millis(1),
            },
            |_| {
                calls += 1;
                ready(Err("down"))
            },
            |_| ready(()),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
