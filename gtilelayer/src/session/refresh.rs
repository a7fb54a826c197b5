//! Background session renewal.
//!
//! While a layer is attached, a single task keeps its session fresh. It
//! sleeps for a fraction of the session's remaining lifetime, then expires
//! the cached session and acquires a new one. Tiles already waiting on a
//! session request keep waiting on it. Cancelling the token stops the loop at
//! its next suspension point; a cancelled loop never touches the session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Session, SessionManager};
use crate::config::RefreshPolicy;
use crate::http::AsyncHttpClient;

/// How long to wait before renewing `session`.
///
/// `policy.fraction` of the remaining lifetime, never less than
/// `policy.min_delay`. Sessions without an expiry use `policy.fallback`.
pub fn refresh_delay(policy: &RefreshPolicy, session: &Session, now: DateTime<Utc>) -> Duration {
    let Some(expires_at) = session.expires_at else {
        return policy.fallback.max(policy.min_delay);
    };

    let remaining = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
    remaining.mul_f64(policy.fraction).max(policy.min_delay)
}

/// Runs until `cancel` fires or an acquisition fails.
pub(crate) async fn run_refresh_loop<C: AsyncHttpClient>(
    manager: SessionManager<C>,
    policy: RefreshPolicy,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Refresh loop cancelled while acquiring");
                return;
            }
            result = manager.acquire() => result,
        };

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session refresh failed, refresh loop stopped");
                return;
            }
        };

        let delay = refresh_delay(&policy, &session, Utc::now());
        debug!(
            delay_secs = delay.as_secs(),
            expires_at = ?session.expires_at,
            "Next session refresh scheduled"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Refresh loop cancelled while waiting");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if cancel.is_cancelled() {
            return;
        }

        info!("Refreshing session");
        manager.expire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerConfig;
    use crate::endpoints::Endpoints;
    use crate::http::tests::MockAsyncHttpClient;
    use std::sync::Arc;

    fn policy() -> RefreshPolicy {
        RefreshPolicy {
            fraction: 0.9,
            min_delay: Duration::from_secs(60),
            fallback: Duration::from_secs(3600),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_delay_is_fraction_of_remaining_lifetime() {
        let session = Session::new("t", Some(now() + chrono::Duration::seconds(10_000)));
        assert_eq!(
            refresh_delay(&policy(), &session, now()),
            Duration::from_secs(9_000)
        );
    }

    #[test]
    fn test_short_lifetime_is_clamped() {
        // The old `expiry - now - 3600` arithmetic went negative here
        let session = Session::new("t", Some(now() + chrono::Duration::seconds(30)));
        assert_eq!(
            refresh_delay(&policy(), &session, now()),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_expired_session_is_clamped() {
        let session = Session::new("t", Some(now() - chrono::Duration::seconds(500)));
        assert_eq!(
            refresh_delay(&policy(), &session, now()),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_no_expiry_uses_fallback() {
        let session = Session::new("t", None);
        assert_eq!(
            refresh_delay(&policy(), &session, now()),
            Duration::from_secs(3600)
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_delay_never_below_min(
                offset in -1_000_000i64..10_000_000,
                fraction in 0.01..=1.0_f64,
                min_secs in 1u64..10_000,
            ) {
                let policy = RefreshPolicy {
                    fraction,
                    min_delay: Duration::from_secs(min_secs),
                    fallback: Duration::from_secs(3600),
                };
                let session = Session::new("t", Some(now() + chrono::Duration::seconds(offset)));
                let delay = refresh_delay(&policy, &session, now());

                prop_assert!(delay >= policy.min_delay);
                if offset > 0 {
                    prop_assert!(delay <= Duration::from_secs(offset as u64).max(policy.min_delay));
                }
            }
        }
    }

    fn manager(client: &MockAsyncHttpClient) -> SessionManager<MockAsyncHttpClient> {
        SessionManager::new(
            Arc::new(client.clone()),
            Arc::new(LayerConfig::new("key")),
            Arc::new(Endpoints::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_refreshes_after_delay() {
        let client = MockAsyncHttpClient::new();
        client.route_json("/createSession", r#"{"session":"first"}"#);
        let manager = manager(&client);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_refresh_loop(
            manager.clone(),
            policy(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(client.count_matching("/createSession"), 1);
        assert_eq!(manager.current().unwrap().token, "first");

        client.route_json("/createSession", r#"{"session":"second"}"#);
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(client.count_matching("/createSession"), 2);
        assert_eq!(manager.current().unwrap().token, "second");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_loop_does_not_refresh() {
        let client = MockAsyncHttpClient::new();
        client.route_json("/createSession", r#"{"session":"first"}"#);
        let manager = manager(&client);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_refresh_loop(
            manager.clone(),
            policy(),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(1)).await;

        cancel.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(10 * 3600)).await;

        assert_eq!(client.count_matching("/createSession"), 1);
        assert_eq!(manager.current().unwrap().token, "first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_on_failure() {
        let client = MockAsyncHttpClient::new();
        let manager = manager(&client);

        // Unrouted, so the mock answers 404
        run_refresh_loop(manager.clone(), policy(), CancellationToken::new()).await;

        assert_eq!(client.count_matching("/createSession"), 1);
        assert!(manager.current().is_none());
    }
}
