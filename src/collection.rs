//! All cards from a set of deck files, remembering which file each came from.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::card::{self, Card};
use crate::config::Config;
use crate::error::DeckError;
use crate::review::{self, ReviewEvent, ReviewSubmission};

pub struct Collection {
    pub cards: Vec<Card>,
    sources: Vec<PathBuf>,
}

impl Collection {
    /// Load every deck under `paths`. A file that fails to load is skipped
    /// with a warning so one corrupt deck doesn't block the rest.
    pub fn load(paths: &[PathBuf], now: DateTime<Utc>, config: &Config) -> Collection {
        let mut collection = Collection {
            cards: Vec::new(),
            sources: Vec::new(),
        };
        for file in card::discover_files(paths) {
            if let Err(e) = collection.load_file(&file, now, config) {
                tracing::warn!("skipping deck: {e}");
            }
        }
        collection
    }

    fn load_file(
        &mut self,
        file: &Path,
        now: DateTime<Utc>,
        config: &Config,
    ) -> Result<(), DeckError> {
        let mut cards = card::load_csv(file, now, &config.scheduler)?;
        card::load_review_log(&card::review_log_path(file), &mut cards)?;
        for c in cards {
            self.sources.push(file.to_path_buf());
            self.cards.push(c);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn file_count(&self) -> usize {
        let mut files: Vec<&PathBuf> = self.sources.iter().collect();
        files.sort();
        files.dedup();
        files.len()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.id == id)
    }

    /// Rate the card at `index`, then persist its deck and review log.
    ///
    /// The card only changes in memory once its deck file has been written,
    /// so a failed save leaves the collection as it was. A failure to append
    /// to the review log is logged and otherwise ignored: the scheduling
    /// state is already on disk by then.
    pub fn review(
        &mut self,
        index: usize,
        submission: ReviewSubmission,
        now: DateTime<Utc>,
        config: &Config,
    ) -> Result<ReviewEvent, DeckError> {
        let mut updated = self.cards[index].clone();
        let event = review::apply_review(&mut updated, submission, now, config);
        let source = self.sources[index].clone();
        self.save_file(&source, index, &updated)?;
        self.cards[index] = updated;

        let log = card::review_log_path(&source);
        if let Err(e) = card::append_review_log(&log, &self.cards[index].id, &event) {
            tracing::warn!(card = %self.cards[index].id, "review not logged: {e}");
        }
        Ok(event)
    }

    /// Write every card from `target`, with `replacement` standing in for
    /// the card at `index`.
    fn save_file(&self, target: &Path, index: usize, replacement: &Card) -> Result<(), DeckError> {
        let file_cards: Vec<Card> = self
            .cards
            .iter()
            .zip(&self.sources)
            .enumerate()
            .filter(|(_, (_, source))| source.as_path() == target)
            .map(|(i, (c, _))| if i == index { replacement.clone() } else { c.clone() })
            .collect();
        card::save_csv(target, &file_cards)
    }
}
