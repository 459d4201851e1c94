//! Shared-secret gates and failed-attempt rate limiting.
//!
//! - Ops endpoints require `x-ops-key` to equal the ops secret
//! - The watch trigger requires `Authorization: Bearer <cron secret>` when a
//!   cron secret is configured, and is open outside production otherwise
//!
//! Failed ops attempts are counted per client IP: 5 failures inside 10
//! minutes lock that IP out for 30 minutes.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use parking_lot::Mutex;

use super::error::ApiError;
use super::state::ServerConfig;

pub const OPS_KEY_HEADER: &str = "x-ops-key";

pub const MAX_FAILURES: usize = 5;
pub const FAILURE_WINDOW: Duration = Duration::from_secs(10 * 60);
pub const LOCKOUT: Duration = Duration::from_secs(30 * 60);

/// Entries kept before idle clients are pruned
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Default)]
struct ClientRecord {
    failures: VecDeque<Instant>,
    locked_until: Option<Instant>,
}

impl ClientRecord {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.failures.front() {
            if now.duration_since(oldest) >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
        if self.locked_until.map_or(false, |until| until <= now) {
            self.locked_until = None;
        }
    }

    fn is_idle(&self) -> bool {
        self.failures.is_empty() && self.locked_until.is_none()
    }
}

/// Why an attempt did not succeed
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Client is locked out for this long
    Locked(Duration),
    /// Verification failed (and was recorded)
    Rejected(E),
}

/// Sliding-window failure counter keyed by client IP
pub struct RateLimiter {
    max_failures: usize,
    window: Duration,
    lockout: Duration,
    clients: Mutex<HashMap<String, ClientRecord>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MAX_FAILURES, FAILURE_WINDOW, LOCKOUT)
    }
}

impl RateLimiter {
    pub fn new(max_failures: usize, window: Duration, lockout: Duration) -> Self {
        Self {
            max_failures: max_failures.max(1),
            window,
            lockout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Check the lockout, run `verify` and record the result atomically.
    ///
    /// The lock is held across `verify`, so it must not block.
    pub fn attempt<E>(
        &self,
        client: &str,
        now: Instant,
        verify: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), AttemptError<E>> {
        let mut clients = self.clients.lock();

        if clients.len() > PRUNE_THRESHOLD {
            let window = self.window;
            clients.retain(|_, record| {
                record.prune(now, window);
                !record.is_idle()
            });
        }

        let record = clients.entry(client.to_string()).or_default();
        record.prune(now, self.window);

        if let Some(until) = record.locked_until {
            return Err(AttemptError::Locked(until.duration_since(now)));
        }

        match verify() {
            Ok(()) => {
                clients.remove(client);
                Ok(())
            }
            Err(e) => {
                record.failures.push_back(now);
                if record.failures.len() >= self.max_failures {
                    record.failures.clear();
                    record.locked_until = Some(now + self.lockout);
                    tracing::warn!(%client, "Client locked out after repeated failures");
                }
                Err(AttemptError::Rejected(e))
            }
        }
    }

    /// Remaining lockout for a client, if any
    pub fn locked_for(&self, client: &str, now: Instant) -> Option<Duration> {
        let clients = self.clients.lock();
        clients
            .get(client)
            .and_then(|r| r.locked_until)
            .filter(|until| *until > now)
            .map(|until| until.duration_since(now))
    }
}

/// Seconds to report for a remaining lockout (rounded up)
pub fn wait_seconds(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Client IP: first `x-forwarded-for` entry, `x-real-ip`, socket, `unknown`
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real) = header("x-real-ip") {
        return real.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Compare secrets without short-circuiting on the first differing byte
pub fn secrets_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check the `x-ops-key` header against the configured ops secret
pub fn verify_ops_key(config: &ServerConfig, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = config
        .ops_secret
        .as_deref()
        .ok_or(ApiError::Unconfigured("ops secret"))?;

    let given = headers
        .get(OPS_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if secrets_match(given, expected) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Gate for the watch trigger
pub fn authorize_watch(config: &ServerConfig, headers: &HeaderMap) -> Result<(), ApiError> {
    match config.cron_secret.as_deref() {
        Some(secret) => {
            let token = headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .unwrap_or_default();

            if secrets_match(token.trim(), secret) {
                Ok(())
            } else {
                tracing::debug!("watch trigger with missing or wrong cron secret");
                Err(ApiError::Unauthorized)
            }
        }
        None if config.production => {
            tracing::debug!("manual watch trigger refused in production");
            Err(ApiError::Unauthorized)
        }
        None => Ok(()),
    }
}
