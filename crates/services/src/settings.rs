use std::env;
use std::time::Duration;

use crate::error::SettingsError;

/// What the countdown timer does once the remaining time reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Leave the session open at 00:00 and wait for the student to submit.
    #[default]
    Ignore,
    /// Submit the current answers automatically.
    AutoSubmit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    tick_interval: Duration,
    timeout_policy: TimeoutPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            timeout_policy: TimeoutPolicy::Ignore,
        }
    }
}

impl SessionSettings {
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidTickInterval` for a zero interval.
    pub fn new(tick_interval: Duration, timeout_policy: TimeoutPolicy) -> Result<Self, SettingsError> {
        if tick_interval.is_zero() {
            return Err(SettingsError::InvalidTickInterval);
        }
        Ok(Self {
            tick_interval,
            timeout_policy,
        })
    }

    /// Read `HUBX_TICK_MS` and `HUBX_AUTO_SUBMIT`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, SettingsError> {
        let tick = env::var("HUBX_TICK_MS").ok();
        let auto = env::var("HUBX_AUTO_SUBMIT").ok();
        Self::from_vars(tick.as_deref(), auto.as_deref())
    }

    pub(crate) fn from_vars(
        tick_ms: Option<&str>,
        auto_submit: Option<&str>,
    ) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if let Some(raw) = tick_ms.map(str::trim).filter(|v| !v.is_empty()) {
            let ms: u64 = raw.parse().map_err(|_| SettingsError::InvalidValue {
                key: "HUBX_TICK_MS",
                raw: raw.to_owned(),
            })?;
            settings = Self::new(Duration::from_millis(ms), settings.timeout_policy)?;
        }

        if let Some(raw) = auto_submit.map(str::trim).filter(|v| !v.is_empty()) {
            let enabled = parse_flag(raw).ok_or_else(|| SettingsError::InvalidValue {
                key: "HUBX_AUTO_SUBMIT",
                raw: raw.to_owned(),
            })?;
            if enabled {
                settings.timeout_policy = TimeoutPolicy::AutoSubmit;
            }
        }

        Ok(settings)
    }

    #[must_use]
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    #[must_use]
    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.timeout_policy
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
