//! Submission rate limiting, per client IP and per link token.
//!
//! Each key owns a sliding window aggregated into one-minute buckets. An IP
//! that reaches its hourly cap is additionally blocked for a fixed period,
//! independent of the window draining. State is in memory only and resets on
//! restart.
//!
//! Every method takes `now` explicitly so window behaviour is deterministic
//! under test.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use parish_core::link::token_prefix;

/// Decision and bookkeeping interface used by the intake gate. Swappable for
/// a shared external counter without touching the gate.
pub trait RateLimiter: Send + Sync {
  fn is_ip_allowed(&self, ip: &str, now: DateTime<Utc>) -> bool;
  fn is_token_allowed(&self, token: &str, now: DateTime<Utc>) -> bool;
  fn record_ip_submission(&self, ip: &str, now: DateTime<Utc>);
  fn record_token_submission(&self, token: &str, now: DateTime<Utc>);
  fn remaining_for_ip(&self, ip: &str, now: DateTime<Utc>) -> u32;
  fn remaining_for_token(&self, token: &str, now: DateTime<Utc>) -> u32;
  /// Drop expired blocks and windows with no recent activity.
  fn cleanup(&self, now: DateTime<Utc>);
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
  pub max_per_ip:      u32,
  pub ip_window:       TimeDelta,
  /// How long an IP stays blocked once it reaches `max_per_ip`.
  pub ip_block:        TimeDelta,
  pub max_per_token:   u32,
  pub token_window:    TimeDelta,
  /// Buckets older than these are purged by [`RateLimiter::cleanup`].
  pub ip_retention:    TimeDelta,
  pub token_retention: TimeDelta,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self {
      max_per_ip:      5,
      ip_window:       TimeDelta::hours(1),
      ip_block:        TimeDelta::minutes(30),
      max_per_token:   10,
      token_window:    TimeDelta::hours(24),
      ip_retention:    TimeDelta::hours(2),
      token_retention: TimeDelta::hours(48),
    }
  }
}

// ─── Window ──────────────────────────────────────────────────────────────────

/// Submission counts keyed by minute since the epoch.
#[derive(Debug, Default)]
struct Window {
  buckets: BTreeMap<i64, u32>,
}

impl Window {
  fn minute(at: DateTime<Utc>) -> i64 { at.timestamp().div_euclid(60) }

  fn record(&mut self, now: DateTime<Utc>) {
    *self.buckets.entry(Self::minute(now)).or_default() += 1;
  }

  /// Forget buckets that started before `cutoff`.
  fn prune(&mut self, cutoff: DateTime<Utc>) {
    let cutoff = cutoff.timestamp();
    self.buckets.retain(|&minute, _| minute * 60 >= cutoff);
  }

  fn count(&self) -> u32 { self.buckets.values().sum() }

  fn is_empty(&self) -> bool { self.buckets.is_empty() }
}

// ─── In-memory limiter ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
  config:  RateLimitConfig,
  ips:     DashMap<String, Window>,
  tokens:  DashMap<String, Window>,
  blocked: DashMap<String, DateTime<Utc>>,
}

impl InMemoryRateLimiter {
  pub fn new(config: RateLimitConfig) -> Self {
    Self { config, ..Default::default() }
  }

  /// The block expiry for `ip`, if one is still in force. Expired blocks are
  /// removed as a side effect.
  fn active_block(&self, ip: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let until = self.blocked.get(ip).map(|entry| *entry)?;
    if now < until {
      Some(until)
    } else {
      self.blocked.remove(ip);
      None
    }
  }

  fn recent(
    map: &DashMap<String, Window>,
    key: &str,
    cutoff: DateTime<Utc>,
  ) -> u32 {
    match map.get_mut(key) {
      Some(mut window) => {
        window.prune(cutoff);
        window.count()
      }
      None => 0,
    }
  }

  pub fn tracked_ips(&self) -> usize { self.ips.len() }

  pub fn tracked_tokens(&self) -> usize { self.tokens.len() }
}

impl RateLimiter for InMemoryRateLimiter {
  fn is_ip_allowed(&self, ip: &str, now: DateTime<Utc>) -> bool {
    if ip.is_empty() {
      warn!("empty client address in rate limit check");
      return false;
    }
    if let Some(until) = self.active_block(ip, now) {
      warn!(ip, %until, "blocked address attempted submission");
      return false;
    }
    Self::recent(&self.ips, ip, now - self.config.ip_window)
      < self.config.max_per_ip
  }

  fn is_token_allowed(&self, token: &str, now: DateTime<Utc>) -> bool {
    if token.is_empty() {
      return false;
    }
    Self::recent(&self.tokens, token, now - self.config.token_window)
      < self.config.max_per_token
  }

  fn record_ip_submission(&self, ip: &str, now: DateTime<Utc>) {
    if ip.is_empty() {
      return;
    }
    let count = {
      let mut window = self.ips.entry(ip.to_owned()).or_default();
      window.prune(now - self.config.ip_window);
      window.record(now);
      window.count()
    };
    if count >= self.config.max_per_ip {
      let until = now + self.config.ip_block;
      self.blocked.insert(ip.to_owned(), until);
      warn!(ip, %until, "address blocked for exceeding rate limit");
    }
    debug!(ip, count, "recorded submission from address");
  }

  fn record_token_submission(&self, token: &str, now: DateTime<Utc>) {
    if token.is_empty() {
      return;
    }
    let count = {
      let mut window = self.tokens.entry(token.to_owned()).or_default();
      window.prune(now - self.config.token_window);
      window.record(now);
      window.count()
    };
    debug!(token = token_prefix(token), count, "recorded submission for link");
  }

  fn remaining_for_ip(&self, ip: &str, now: DateTime<Utc>) -> u32 {
    if ip.is_empty() || self.active_block(ip, now).is_some() {
      return 0;
    }
    let used = Self::recent(&self.ips, ip, now - self.config.ip_window);
    self.config.max_per_ip.saturating_sub(used)
  }

  fn remaining_for_token(&self, token: &str, now: DateTime<Utc>) -> u32 {
    if token.is_empty() {
      return 0;
    }
    let used = Self::recent(&self.tokens, token, now - self.config.token_window);
    self.config.max_per_token.saturating_sub(used)
  }

  fn cleanup(&self, now: DateTime<Utc>) {
    self.blocked.retain(|_, until| now < *until);

    let ip_cutoff = now - self.config.ip_retention;
    self.ips.retain(|_, window| {
      window.prune(ip_cutoff);
      !window.is_empty()
    });

    let token_cutoff = now - self.config.token_retention;
    self.tokens.retain(|_, window| {
      window.prune(token_cutoff);
      !window.is_empty()
    });

    debug!(
      ips = self.ips.len(),
      tokens = self.tokens.len(),
      blocked = self.blocked.len(),
      "rate limit cleanup complete"
    );
  }
}
