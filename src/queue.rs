// Picks and orders the cards for one study session.

use chrono::{DateTime, Utc};

use crate::config::SessionConfig;
use crate::schedule::{SchedulingState, Stage};

/// The slice of a card the queue builder needs.
#[derive(Clone, Copy, Debug)]
pub struct CardSchedulingView<'a> {
    pub id: &'a str,
    pub scheduling: SchedulingState,
    pub created: Option<DateTime<Utc>>,
}

/// Returns at most `target_size` card ids, learning cards first, then
/// relearning, then review, each group in due-date order.
pub fn build_queue(
    cards: &[CardSchedulingView<'_>],
    target_size: usize,
    now: DateTime<Utc>,
    config: &SessionConfig,
) -> Vec<String> {
    if target_size == 0 || cards.is_empty() {
        return Vec::new();
    }

    let mut due: Vec<&CardSchedulingView> = cards
        .iter()
        .filter(|c| {
            matches!(c.scheduling.stage, Stage::Review | Stage::Relearning { .. })
                && c.scheduling.is_due(now)
        })
        .collect();
    let mut new: Vec<&CardSchedulingView> = cards
        .iter()
        .filter(|c| matches!(c.scheduling.stage, Stage::Learning { .. }))
        .collect();

    if due.is_empty() && new.is_empty() {
        return fallback(cards, target_size, now);
    }

    due.sort_by_key(|c| c.scheduling.due);
    // FIFO by creation; cards without a timestamp go last.
    new.sort_by_key(|c| (c.created.is_none(), c.created));

    let (due_count, new_count) = split(target_size, due.len(), new.len(), config.new_per_mille());

    let mut selected: Vec<&CardSchedulingView> = due
        .into_iter()
        .take(due_count)
        .chain(new.into_iter().take(new_count))
        .collect();
    selected.sort_by_key(|c| (c.scheduling.stage.rank(), c.scheduling.due));

    tracing::debug!(
        target_size,
        due = due_count,
        new = new_count,
        "built session queue"
    );

    selected.into_iter().map(|c| c.id.to_string()).collect()
}

/// How many due and new cards to take. Shortfalls in one pool are made up
/// from the other, due cards first.
fn split(
    target: usize,
    due_available: usize,
    new_available: usize,
    new_per_mille: usize,
) -> (usize, usize) {
    // ceil(target * share), kept in integers
    let new_target = (target * new_per_mille).div_ceil(1000).min(target);
    let due_target = target - new_target;

    let mut due = due_available.min(due_target);
    let mut new = new_available.min(new_target);

    let mut remaining = target - due - new;
    let extra_due = (due_available - due).min(remaining);
    due += extra_due;
    remaining -= extra_due;
    new += (new_available - new).min(remaining);

    (due, new)
}

fn fallback(
    cards: &[CardSchedulingView<'_>],
    target_size: usize,
    now: DateTime<Utc>,
) -> Vec<String> {
    let effective_due = |c: &CardSchedulingView| match c.scheduling.stage {
        Stage::Learning { .. } => now,
        _ => c.scheduling.due,
    };
    let mut all: Vec<&CardSchedulingView> = cards.iter().collect();
    all.sort_by_key(|c| effective_due(*c));
    tracing::debug!(target_size, "nothing due, falling back to earliest cards");
    all.into_iter()
        .take(target_size)
        .map(|c| c.id.to_string())
        .collect()
}
