//! Property tests for the scheduler, overdue compensation and queue builder.

use cadence::config::{SchedulerConfig, SessionConfig};
use cadence::overdue::adjust_for_overdue;
use cadence::queue::{CardSchedulingView, build_queue};
use cadence::schedule::{Quality, SchedulingState, Stage, initial_schedule, next_schedule};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

fn quality_strategy() -> impl Strategy<Value = Quality> {
    (1u8..=5).prop_map(|n| Quality::try_from(n).unwrap())
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop_oneof![
        (0usize..4).prop_map(|step| Stage::Learning { step }),
        (0usize..3).prop_map(|step| Stage::Relearning { step }),
        Just(Stage::Review),
    ]
}

fn state_strategy() -> impl Strategy<Value = SchedulingState> {
    (0.001f64..400.0, 1.3f64..4.0, -60i64..60, stage_strategy()).prop_map(
        |(interval, ease_factor, due_offset, stage)| SchedulingState {
            interval,
            ease_factor,
            due: now() + Duration::days(due_offset),
            stage,
        },
    )
}

proptest! {
    #[test]
    fn ease_never_drops_below_floor(
        state in state_strategy(),
        quality in quality_strategy(),
        hint in any::<bool>(),
    ) {
        let config = SchedulerConfig::default();
        let next = next_schedule(state, quality, hint, now(), &config);
        prop_assert!(next.ease_factor >= config.min_ease_factor);
        prop_assert!(next.interval > 0.0);
        prop_assert!(next.due > now());
    }

    #[test]
    fn failures_always_relearn_from_step_zero(
        state in state_strategy(),
        quality in (1u8..3).prop_map(|n| Quality::try_from(n).unwrap()),
        hint in any::<bool>(),
    ) {
        let next = next_schedule(state, quality, hint, now(), &SchedulerConfig::default());
        prop_assert_eq!(next.stage, Stage::Relearning { step: 0 });
        prop_assert_eq!(next.stage.step(), Some(0));
    }

    #[test]
    fn graduation_takes_exactly_the_ladder_length(
        ladder in prop::collection::vec(1u32..2000, 0..6),
        passes in prop::collection::vec(3u8..=5, 6),
    ) {
        let config = SchedulerConfig {
            learning_steps_minutes: ladder.clone(),
            ..SchedulerConfig::default()
        };
        let mut state = initial_schedule(now(), &config);
        let needed = ladder.len().max(1);
        for (n, q) in passes.iter().take(needed).enumerate() {
            prop_assert!(matches!(state.stage, Stage::Learning { .. }), "graduated early at {n}");
            state = next_schedule(state, Quality::try_from(*q).unwrap(), false, now(), &config);
        }
        prop_assert_eq!(state.stage, Stage::Review);
        prop_assert_eq!(state.interval, 1.0);
    }

    #[test]
    fn overdue_identity_up_to_threshold(state in state_strategy(), days in -365i64..=14) {
        prop_assert_eq!(adjust_for_overdue(state, days, &SchedulerConfig::default()), state);
    }

    #[test]
    fn overdue_never_grows_interval_past_cap(state in state_strategy(), days in 15i64..2000) {
        let config = SchedulerConfig::default();
        let adjusted = adjust_for_overdue(state, days, &config);
        prop_assert!(adjusted.interval >= 1.0);
        prop_assert!(adjusted.interval <= (state.interval * config.overdue_cap).round().max(1.0));
        prop_assert!(adjusted.ease_factor >= config.min_ease_factor);
        prop_assert_eq!(adjusted.stage, state.stage);
    }

    #[test]
    fn queue_never_exceeds_target(
        states in prop::collection::vec(state_strategy(), 0..40),
        target in 0usize..30,
    ) {
        let ids: Vec<String> = (0..states.len()).map(|i| format!("c{i}")).collect();
        let views: Vec<CardSchedulingView> = ids
            .iter()
            .zip(&states)
            .map(|(id, s)| CardSchedulingView { id, scheduling: *s, created: None })
            .collect();
        let queue = build_queue(&views, target, now(), &SessionConfig::default());
        prop_assert!(queue.len() <= target);
        let mut unique = queue.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), queue.len());
        if !views.is_empty() && target > 0 {
            prop_assert!(!queue.is_empty());
        }
    }
}

#[test]
fn initial_schedule_defaults() {
    let s = initial_schedule(now(), &SchedulerConfig::default());
    assert_eq!(s.interval, 1.0);
    assert_eq!(s.ease_factor, 2.5);
    assert_eq!(s.stage, Stage::Learning { step: 0 });
    assert_eq!(s.stage.step(), Some(0));
}
