// Interval shrinkage for cards reviewed long after their due date.

use chrono::{DateTime, Utc};

use crate::config::SchedulerConfig;
use crate::schedule::SchedulingState;

/// Whole days between the due date and the review, truncated toward zero.
/// Negative when the card is reviewed early.
pub fn days_overdue(state: &SchedulingState, reviewed_at: DateTime<Utc>) -> i64 {
    (reviewed_at - state.due).num_days()
}

/// Must run before `next_schedule` for the same review.
pub fn adjust_for_overdue(
    state: SchedulingState,
    days_overdue: i64,
    config: &SchedulerConfig,
) -> SchedulingState {
    let threshold = i64::from(config.overdue_threshold_days);
    if days_overdue <= threshold {
        return state;
    }

    let factor = f64::min(config.overdue_cap, threshold as f64 / days_overdue as f64);
    let interval = (state.interval * factor).round().max(1.0);
    let ease_factor = (state.ease_factor - config.overdue_ease_penalty).max(config.min_ease_factor);

    tracing::debug!(
        days_overdue,
        factor,
        from = state.interval,
        to = interval,
        "compensated overdue card"
    );

    SchedulingState {
        interval,
        ease_factor,
        ..state
    }
}
