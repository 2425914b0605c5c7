//! Tunable constants for scheduling and session building.
//!
//! Every value has a default matching the stock SM-2 variant, so an empty
//! TOML file (or no file at all) yields the standard behaviour.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Step ladder for new cards, in minutes.
    pub learning_steps_minutes: Vec<u32>,
    /// Step ladder for lapsed cards, in minutes. Must not be empty.
    pub relearning_steps_minutes: Vec<u32>,
    /// Hard floor for the ease factor.
    pub min_ease_factor: f64,
    /// Ease factor given to freshly authored cards.
    pub initial_ease_factor: f64,
    /// Cards at most this many days overdue are not compensated.
    pub overdue_threshold_days: u32,
    /// Upper bound on the interval shrink factor for overdue cards.
    pub overdue_cap: f64,
    /// Ease lost when overdue compensation engages.
    pub overdue_ease_penalty: f64,
    /// Share of the old interval kept when a relearning card graduates.
    pub relearn_graduation_scale: f64,
    /// Minimum interval after a good first review of a just-graduated card.
    pub graduation_jump_days: u32,
    /// Ceiling on any scheduled interval, in days.
    pub max_interval_days: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            learning_steps_minutes: vec![1, 10, 1440],
            relearning_steps_minutes: vec![10, 1440],
            min_ease_factor: 1.3,
            initial_ease_factor: 2.5,
            overdue_threshold_days: 14,
            overdue_cap: 0.75,
            overdue_ease_penalty: 0.1,
            relearn_graduation_scale: 0.5,
            graduation_jump_days: 3,
            max_interval_days: 36500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Fraction of a session reserved for due cards; the rest goes to new cards.
    pub due_ratio: f64,
    pub default_size: usize,
    /// Interleaving leaves inputs shorter than this untouched.
    pub interleave_min_cards: usize,
    /// Interleaving needs at least this many topics to do anything.
    pub interleave_min_topics: usize,
    /// Tags the learner is struggling with; interleaving picks these first.
    pub weak_topics: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            due_ratio: 0.7,
            default_size: 20,
            interleave_min_cards: 4,
            interleave_min_topics: 2,
            weak_topics: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Share of a session reserved for new cards, in thousandths.
    /// Rounded once here so session sizing is exact integer arithmetic.
    pub fn new_per_mille(&self) -> usize {
        ((1.0 - self.due_ratio) * 1000.0).round() as usize
    }
}

impl Config {
    /// Load from a TOML file, or return the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Config::from_toml(&text)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        if s.relearning_steps_minutes.is_empty() {
            return Err(ConfigError::Invalid(
                "relearning_steps_minutes must not be empty".into(),
            ));
        }
        if s.learning_steps_minutes.contains(&0) || s.relearning_steps_minutes.contains(&0) {
            return Err(ConfigError::Invalid("step lengths must be positive".into()));
        }
        if !(s.min_ease_factor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_ease_factor must be positive, got {}",
                s.min_ease_factor
            )));
        }
        if !(s.initial_ease_factor >= s.min_ease_factor) {
            return Err(ConfigError::Invalid(format!(
                "initial_ease_factor {} is below min_ease_factor {}",
                s.initial_ease_factor, s.min_ease_factor
            )));
        }
        if s.overdue_threshold_days == 0 {
            return Err(ConfigError::Invalid(
                "overdue_threshold_days must be positive".into(),
            ));
        }
        if !(s.overdue_cap > 0.0 && s.overdue_cap <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "overdue_cap must be in (0, 1], got {}",
                s.overdue_cap
            )));
        }
        if !(s.max_interval_days >= 1.0 && s.max_interval_days.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "max_interval_days must be at least 1, got {}",
                s.max_interval_days
            )));
        }
        if !(0.0..=1.0).contains(&self.session.due_ratio) {
            return Err(ConfigError::Invalid(format!(
                "due_ratio must be in [0, 1], got {}",
                self.session.due_ratio
            )));
        }
        Ok(())
    }
}
