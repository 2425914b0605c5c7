// SM-2 scheduler with fixed learning and relearning step ladders.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;

const MINUTES_PER_DAY: f64 = 1440.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Recall quality on the 1-5 scale. Anything below `Hard` is a lapse.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quality {
    Blackout = 1,
    Wrong = 2,
    Hard = 3,
    Good = 4,
    Perfect = 5,
}

impl Quality {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn is_pass(self) -> bool {
        self >= Quality::Hard
    }
}

impl TryFrom<u8> for Quality {
    type Error = SchedulerError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Quality::Blackout),
            2 => Ok(Quality::Wrong),
            3 => Ok(Quality::Hard),
            4 => Ok(Quality::Good),
            5 => Ok(Quality::Perfect),
            _ => Err(SchedulerError::InvalidRating(n)),
        }
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> u8 {
        q.value()
    }
}

/// Learning stage. The step index only exists for the laddered stages.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Learning { step: usize },
    Relearning { step: usize },
    Review,
}

impl Stage {
    /// Session ordering: new material first, then lapses, then reviews.
    pub fn rank(self) -> u8 {
        match self {
            Stage::Learning { .. } => 0,
            Stage::Relearning { .. } => 1,
            Stage::Review => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Learning { .. } => "learning",
            Stage::Relearning { .. } => "relearning",
            Stage::Review => "review",
        }
    }

    pub fn step(self) -> Option<usize> {
        match self {
            Stage::Learning { step } | Stage::Relearning { step } => Some(step),
            Stage::Review => None,
        }
    }

    /// Rebuild a stage from its flat stored form (stage name + optional step).
    pub fn from_parts(name: &str, step: Option<usize>) -> Result<Stage, SchedulerError> {
        match (name, step) {
            ("learning", Some(step)) => Ok(Stage::Learning { step }),
            ("relearning", Some(step)) => Ok(Stage::Relearning { step }),
            ("review", None) => Ok(Stage::Review),
            ("learning" | "relearning", None) => Err(SchedulerError::MalformedSchedulingState(
                format!("{name} stage without a current step"),
            )),
            ("review", Some(step)) => Err(SchedulerError::MalformedSchedulingState(format!(
                "review stage with current step {step}"
            ))),
            (other, _) => Err(SchedulerError::MalformedSchedulingState(format!(
                "unknown stage {other:?}"
            ))),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct SchedulingState {
    /// Days until the card is due again; fractional while on a step ladder.
    pub interval: f64,
    pub ease_factor: f64,
    pub due: DateTime<Utc>,
    #[serde(flatten)]
    pub stage: Stage,
}

impl SchedulingState {
    /// Reject states that cannot have come out of this scheduler.
    pub fn validate(&self, config: &SchedulerConfig) -> Result<(), SchedulerError> {
        if !self.interval.is_finite() || self.interval <= 0.0 {
            return Err(SchedulerError::MalformedSchedulingState(format!(
                "interval must be positive, got {}",
                self.interval
            )));
        }
        if !self.ease_factor.is_finite() || self.ease_factor < config.min_ease_factor {
            return Err(SchedulerError::MalformedSchedulingState(format!(
                "ease factor {} is below the floor of {}",
                self.ease_factor, config.min_ease_factor
            )));
        }
        Ok(())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

pub fn initial_schedule(now: DateTime<Utc>, config: &SchedulerConfig) -> SchedulingState {
    let interval = 1.0;
    SchedulingState {
        interval,
        ease_factor: config.initial_ease_factor,
        due: due_after(now, interval),
        stage: Stage::Learning { step: 0 },
    }
}

pub fn next_schedule(
    state: SchedulingState,
    quality: Quality,
    hint_used: bool,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> SchedulingState {
    let ease_factor = next_ease(state.ease_factor, quality, hint_used, config);
    let old_interval = state.interval;

    let (stage, interval) = if !quality.is_pass() {
        // An empty relearning ladder is rejected at config load; one day is a fallback.
        let first = config
            .relearning_steps_minutes
            .first()
            .map_or(1.0, |&m| minutes_to_days(m));
        (Stage::Relearning { step: 0 }, first)
    } else {
        match state.stage {
            Stage::Learning { step } => match ladder_step(&config.learning_steps_minutes, step) {
                Some((step, interval)) => (Stage::Learning { step }, interval),
                None => (Stage::Review, 1.0),
            },
            Stage::Relearning { step } => {
                match ladder_step(&config.relearning_steps_minutes, step) {
                    Some((step, interval)) => (Stage::Relearning { step }, interval),
                    None => {
                        let scale = config.relearn_graduation_scale;
                        let interval = (old_interval * scale * ease_factor).floor().max(1.0);
                        (Stage::Review, interval)
                    }
                }
            }
            Stage::Review => {
                let interval = review_interval(old_interval, ease_factor, quality, config);
                (Stage::Review, interval)
            }
        }
    };
    let interval = interval.min(config.max_interval_days);

    tracing::debug!(
        quality = quality.value(),
        hint_used,
        from = state.stage.name(),
        to = stage.name(),
        interval,
        ease_factor,
        "scheduled card"
    );

    SchedulingState {
        interval,
        ease_factor,
        due: due_after(now, interval),
        stage,
    }
}

fn next_ease(ease: f64, quality: Quality, hint_used: bool, config: &SchedulerConfig) -> f64 {
    let mut q = quality.value();
    if hint_used && quality.is_pass() && quality != Quality::Perfect {
        q -= 1;
    }
    let q_factor = f64::from(5 - q);
    let delta = 0.1 - q_factor * 0.08 + q_factor * 0.02;
    (ease + delta).max(config.min_ease_factor)
}

/// Advance one rung. `None` means the card walked off the end and graduates.
fn ladder_step(ladder: &[u32], step: usize) -> Option<(usize, f64)> {
    let next = step + 1;
    ladder.get(next).map(|&m| (next, minutes_to_days(m)))
}

fn review_interval(old: f64, ease: f64, quality: Quality, config: &SchedulerConfig) -> f64 {
    if old <= 1.0 {
        let interval = ease.round();
        if quality >= Quality::Good && interval <= 1.0 {
            f64::from(config.graduation_jump_days)
        } else {
            interval
        }
    } else {
        (old * ease).round()
    }
}

fn minutes_to_days(minutes: u32) -> f64 {
    f64::from(minutes) / MINUTES_PER_DAY
}

/// `now` plus a fractional number of days, saturating at the end of time.
pub fn due_after(now: DateTime<Utc>, interval_days: f64) -> DateTime<Utc> {
    let millis = (interval_days * MILLIS_PER_DAY).round();
    if !(millis < i64::MAX as f64) {
        return DateTime::<Utc>::MAX_UTC;
    }
    Duration::try_milliseconds(millis as i64)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
