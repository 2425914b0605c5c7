use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::config::Config;
use crate::interleave::{self, Pattern};
use crate::overdue;
use crate::queue;
use crate::schedule::{self, Quality, Stage};

/// One submitted rating. Kept for analytics; the scheduler never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub reviewed_at: DateTime<Utc>,
    pub quality: Quality,
    pub hint_used: bool,
    pub answer_ms: u64,
    /// The interval in effect before this review.
    pub interval_before: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    pub quality: Quality,
    #[serde(default)]
    pub hint_used: bool,
    #[serde(default)]
    pub answer_ms: u64,
}

/// What a study session should contain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub deck: Option<String>,
    pub size: Option<usize>,
    pub pattern: Option<Pattern>,
    pub topics: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeckSummary {
    pub name: String,
    pub total: usize,
    pub due: usize,
    pub new: usize,
    pub relearning: usize,
}

/// Rate a card: compensate if badly overdue, reschedule, and append the event.
pub fn apply_review(
    card: &mut Card,
    submission: ReviewSubmission,
    now: DateTime<Utc>,
    config: &Config,
) -> ReviewEvent {
    let s = &config.scheduler;
    let mut state = card.scheduling;
    let interval_before = state.interval;

    if state.stage == Stage::Review {
        let days = overdue::days_overdue(&state, now);
        state = overdue::adjust_for_overdue(state, days, s);
    }
    card.scheduling =
        schedule::next_schedule(state, submission.quality, submission.hint_used, now, s);

    let event = ReviewEvent {
        reviewed_at: now,
        quality: submission.quality,
        hint_used: submission.hint_used,
        answer_ms: submission.answer_ms,
        interval_before,
    };
    card.history.push(event.clone());
    tracing::info!(
        card = %card.id,
        quality = submission.quality.value(),
        stage = card.scheduling.stage.name(),
        due = %card.scheduling.due,
        "reviewed card"
    );
    event
}

/// Indices into `cards` for the next session, in presentation order.
pub fn session_queue(
    cards: &[Card],
    request: &SessionRequest,
    now: DateTime<Utc>,
    config: &Config,
) -> Vec<usize> {
    let pool: Vec<usize> = cards
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.archived)
        .filter(|(_, c)| request.deck.as_deref().is_none_or(|d| c.deck == d))
        .map(|(i, _)| i)
        .collect();

    let views: Vec<_> = pool.iter().map(|&i| cards[i].view()).collect();
    let size = request.size.unwrap_or(config.session.default_size);
    let ids = queue::build_queue(&views, size, now, &config.session);

    let order: Vec<usize> = ids
        .iter()
        .filter_map(|id| pool.iter().copied().find(|&i| cards[i].id == *id))
        .collect();

    match request.pattern {
        Some(pattern) => {
            let picked: Vec<IndexedCard> =
                order.iter().map(|&i| IndexedCard(i, &cards[i])).collect();
            let topics = request.topics.unwrap_or(usize::MAX);
            let session = &config.session;
            interleave::interleave(&picked, topics, pattern, &session.weak_topics, session)
                .into_iter()
                .map(|c| c.0)
                .collect()
        }
        None => order,
    }
}

/// Lets the interleaver shuffle indices while grouping by the card's tags.
#[derive(Clone)]
struct IndexedCard<'a>(usize, &'a Card);

impl interleave::Tagged for IndexedCard<'_> {
    fn primary_tag(&self) -> Option<&str> {
        self.1.tags.first().map(String::as_str)
    }
}

pub fn deck_summaries(cards: &[Card], now: DateTime<Utc>) -> Vec<DeckSummary> {
    let mut decks: BTreeMap<&str, DeckSummary> = BTreeMap::new();
    for card in cards.iter().filter(|c| !c.archived) {
        let entry = decks.entry(card.deck.as_str()).or_insert_with(|| DeckSummary {
            name: card.deck.clone(),
            total: 0,
            due: 0,
            new: 0,
            relearning: 0,
        });
        entry.total += 1;
        match card.scheduling.stage {
            Stage::Learning { .. } => entry.new += 1,
            Stage::Relearning { .. } => entry.relearning += 1,
            Stage::Review => {}
        }
        // Same notion of "due" as the session queue: learning cards count as new.
        if !matches!(card.scheduling.stage, Stage::Learning { .. }) && card.scheduling.is_due(now) {
            entry.due += 1;
        }
    }
    decks.into_values().collect()
}
