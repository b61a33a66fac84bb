//! Exponential-backoff reconnection for the chat socket.
//!
//! When the connection drops (or the first attempt fails) the session
//! calls [`reconnect_loop`], which keeps retrying with increasing delays
//! until the connection is restored or the [`CancellationToken`] fires.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{ChatClient, ChatClientError, ChatConnection};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Reconnect to the chat server with exponential backoff.
///
/// Sleeps before every attempt. `on_failure` is called with the attempt
/// number and error after each failed attempt. Returns `None` if `cancel`
/// fires before a connection succeeds.
pub async fn reconnect_loop<F>(
    client: &ChatClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
    mut on_failure: F,
) -> Option<ChatConnection>
where
    F: FnMut(u32, &ChatClientError),
{
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(
            url = client.socket_url(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to chat server",
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(url = client.socket_url(), "Reconnect cancelled");
                return None;
            }
            result = client.connect() => match result {
                Ok(conn) => {
                    tracing::info!(url = client.socket_url(), attempt, "Reconnected to chat server");
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(
                        url = client.socket_url(),
                        error = %e,
                        "Reconnect attempt {attempt} failed",
                    );
                    on_failure(attempt, &e);
                }
            }
        }

        delay = next_delay(delay, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        let d = next_delay(Duration::from_secs(1), &config);
        assert_eq!(d, Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        let d = next_delay(Duration::from_secs(8), &config);
        assert_eq!(d, Duration::from_secs(10));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    #[tokio::test]
    async fn cancellation_token_stops_reconnect() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = ChatClient::new("ws://localhost:9999", None);
        let config = ReconnectConfig::default();

        let result = reconnect_loop(&client, &config, &cancel, |_, _| {}).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn failures_are_reported_with_attempt_numbers() {
        let cancel = CancellationToken::new();
        let client = ChatClient::new("ws://127.0.0.1:1", None)
            .with_handshake_timeout(Duration::from_millis(500));
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
        };

        let mut attempts = Vec::new();
        let stop = cancel.clone();
        let result = reconnect_loop(&client, &config, &cancel, |attempt, _| {
            attempts.push(attempt);
            if attempt == 3 {
                stop.cancel();
            }
        })
        .await;

        assert!(result.is_none());
        assert_eq!(attempts, vec![1, 2, 3]);
    }
}
