//! Client polling intervals, jitter and backoff.
//!
//! Browser clients fetch this configuration so every polling loop in the
//! frontend is tuned from one place.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Floor applied to jittered intervals.
pub const MIN_INTERVAL_MS: u64 = 1_000;

/// Ceiling applied to backoff delays.
pub const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollTarget {
    pub interval_ms: u64,
    pub enabled: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl PollTarget {
    const fn every(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            enabled: true,
            max_retries: 2,
            retry_delay_ms: 2_000,
        }
    }
}

impl Default for PollTarget {
    fn default() -> Self {
        Self::every(30_000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalPolling {
    pub cache_busting: bool,
    pub concurrent_requests: u32,
    pub timeout_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for GlobalPolling {
    fn default() -> Self {
        Self {
            cache_busting: true,
            concurrent_requests: 2,
            timeout_ms: 5_000,
            backoff_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub community_notifications: PollTarget,
    pub community_chat: PollTarget,
    pub conversation_list: PollTarget,
    pub message_list: PollTarget,
    pub global_nav: PollTarget,
    pub global: GlobalPolling,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            community_notifications: PollTarget::every(30_000),
            community_chat: PollTarget::every(15_000),
            conversation_list: PollTarget::every(20_000),
            message_list: PollTarget::every(10_000),
            global_nav: PollTarget::every(60_000),
            global: GlobalPolling::default(),
        }
    }
}

impl PollingConfig {
    /// `base_ms * multiplier^attempt`, capped at [`MAX_BACKOFF_MS`].
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32, base_ms: u64) -> u64 {
        backoff_delay(attempt, base_ms, self.global.backoff_multiplier)
    }
}

#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay(attempt: u32, base_ms: u64, multiplier: f64) -> u64 {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let delay = base_ms as f64 * multiplier.powi(exponent);
    if !delay.is_finite() || delay >= MAX_BACKOFF_MS as f64 {
        MAX_BACKOFF_MS
    } else {
        delay as u64
    }
}

/// Spreads `base_ms` by up to `±base_ms * jitter`, never below
/// [`MIN_INTERVAL_MS`].
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn interval_with_jitter(base_ms: u64, jitter: f64) -> u64 {
    let spread = base_ms as f64 * jitter.abs();
    let offset = if spread > 0.0 {
        rand::rng().random_range(-spread..=spread)
    } else {
        0.0
    };
    let jittered = (base_ms as f64 + offset).max(MIN_INTERVAL_MS as f64);
    jittered.round() as u64
}
