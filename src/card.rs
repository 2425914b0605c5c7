use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::config::SchedulerConfig;
use crate::error::{DeckError, SchedulerError};
use crate::interleave::Tagged;
use crate::queue::CardSchedulingView;
use crate::review::ReviewEvent;
use crate::schedule::{self, Quality, SchedulingState, Stage};

const HEADER: [&str; 12] = [
    "deck", "front", "back", "tags", "id", "created", "archived", "stage", "step", "interval",
    "ease", "due",
];

#[derive(Debug, Clone, serde::Serialize)]
pub struct Card {
    pub deck: String,
    pub front: String,
    pub back: String,
    pub id: String,
    pub tags: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub archived: bool,
    pub scheduling: SchedulingState,
    pub history: Vec<ReviewEvent>,
}

impl Card {
    /// A freshly authored card, scheduled from `now`.
    pub fn new(
        deck: &str,
        front: &str,
        back: &str,
        now: DateTime<Utc>,
        config: &SchedulerConfig,
    ) -> Card {
        Card {
            deck: deck.to_string(),
            front: front.to_string(),
            back: back.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            tags: Vec::new(),
            created: Some(now),
            archived: false,
            scheduling: schedule::initial_schedule(now, config),
            history: Vec::new(),
        }
    }

    pub fn view(&self) -> CardSchedulingView<'_> {
        CardSchedulingView {
            id: &self.id,
            scheduling: self.scheduling,
            created: self.created,
        }
    }
}

impl Tagged for Card {
    fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }
}

fn get_field(record: &csv::StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("").trim()
}

fn parse_tags(s: &str) -> Vec<String> {
    s.split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" => Some(false),
        "true" | "1" | "yes" => Some(true),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Per-row parsing context, so every failure names its file and line.
struct Row<'a> {
    path: &'a Path,
    line: u64,
    record: &'a csv::StringRecord,
}

impl Row<'_> {
    fn field(&self, index: usize) -> &str {
        get_field(self.record, index)
    }

    fn parse<T>(&self, index: usize, f: impl Fn(&str) -> Option<T>) -> Result<T, DeckError> {
        let value = self.field(index);
        f(value).ok_or_else(|| DeckError::Parse {
            path: self.path.to_path_buf(),
            line: self.line,
            field: HEADER[index],
            value: value.to_string(),
        })
    }

    fn malformed(&self, source: SchedulerError) -> DeckError {
        DeckError::Row {
            path: self.path.to_path_buf(),
            line: self.line,
            source,
        }
    }

    fn required<T>(&self, index: usize, f: impl Fn(&str) -> Option<T>) -> Result<T, DeckError> {
        if self.field(index).is_empty() {
            return Err(self.malformed(SchedulerError::MalformedSchedulingState(format!(
                "missing {}",
                HEADER[index]
            ))));
        }
        self.parse(index, f)
    }

    /// Empty scheduling columns mean a hand-authored card that was never reviewed.
    fn scheduling(
        &self,
        created: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        config: &SchedulerConfig,
    ) -> Result<SchedulingState, DeckError> {
        let stage_name = self.field(7);
        if stage_name.is_empty() {
            return Ok(schedule::initial_schedule(created.unwrap_or(now), config));
        }
        let step = match self.field(8) {
            "" => None,
            _ => Some(self.parse(8, |s| s.parse::<usize>().ok())?),
        };
        let stage = Stage::from_parts(stage_name, step).map_err(|e| self.malformed(e))?;
        let state = SchedulingState {
            interval: self.required(9, |s| s.parse::<f64>().ok())?,
            ease_factor: self.required(10, |s| s.parse::<f64>().ok())?,
            due: self.required(11, parse_timestamp)?,
            stage,
        };
        state.validate(config).map_err(|e| self.malformed(e))?;
        Ok(state)
    }
}

/// Load a deck file. Rows with a corrupt scheduling state fail the whole
/// load rather than being silently reset.
pub fn load_csv(
    path: &Path,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Result<Vec<Card>, DeckError> {
    let default_deck = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("default")
        .to_string();

    let csv_err = |source| DeckError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut cards = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        let row = Row {
            path,
            line: record.position().map_or(0, |p| p.line()),
            record: &record,
        };

        let deck = match row.field(0) {
            "" => default_deck.clone(),
            d => d.to_string(),
        };
        let id = match row.field(4) {
            "" => uuid::Uuid::new_v4().to_string(),
            id => id.to_string(),
        };
        let created = match row.field(5) {
            "" => None,
            _ => Some(row.parse(5, parse_timestamp)?),
        };
        let archived = row.parse(6, parse_bool)?;
        let scheduling = row.scheduling(created, now, config)?;

        cards.push(Card {
            deck,
            front: expand_newlines(row.field(1)),
            back: expand_newlines(row.field(2)),
            id,
            tags: parse_tags(row.field(3)),
            created,
            archived,
            scheduling,
            history: Vec::new(),
        });
    }
    tracing::info!(path = %path.display(), cards = cards.len(), "loaded deck");
    Ok(cards)
}

pub fn expand_newlines(s: &str) -> String {
    s.replace("\\n", "\n")
}

fn collapse_newlines(s: &str) -> String {
    s.replace('\n', "\\n")
}

pub fn save_csv(path: &Path, cards: &[Card]) -> Result<(), DeckError> {
    let csv_err = |source| DeckError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(HEADER).map_err(csv_err)?;

    for card in cards {
        let s = &card.scheduling;
        writer
            .write_record([
                card.deck.clone(),
                collapse_newlines(&card.front),
                collapse_newlines(&card.back),
                card.tags.join(";"),
                card.id.clone(),
                card.created.map_or(String::new(), |c| c.to_rfc3339()),
                card.archived.to_string(),
                s.stage.name().to_string(),
                s.stage.step().map_or(String::new(), |n| n.to_string()),
                s.interval.to_string(),
                s.ease_factor.to_string(),
                s.due.to_rfc3339(),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|source| DeckError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), cards = cards.len(), "saved deck");
    Ok(())
}

/// One line of the append-only review log. Spelled out field by field
/// because the csv crate cannot (de)serialize flattened structs.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct LogRecord {
    card_id: String,
    reviewed_at: DateTime<Utc>,
    quality: Quality,
    hint_used: bool,
    answer_ms: u64,
    interval_before: f64,
}

impl LogRecord {
    fn new(card_id: &str, event: &ReviewEvent) -> LogRecord {
        LogRecord {
            card_id: card_id.to_string(),
            reviewed_at: event.reviewed_at,
            quality: event.quality,
            hint_used: event.hint_used,
            answer_ms: event.answer_ms,
            interval_before: event.interval_before,
        }
    }

    fn into_event(self) -> (String, ReviewEvent) {
        let event = ReviewEvent {
            reviewed_at: self.reviewed_at,
            quality: self.quality,
            hint_used: self.hint_used,
            answer_ms: self.answer_ms,
            interval_before: self.interval_before,
        };
        (self.card_id, event)
    }
}

/// The review log that sits beside a deck file (`math.csv` → `math.log`).
pub fn review_log_path(deck_path: &Path) -> PathBuf {
    deck_path.with_extension("log")
}

pub fn append_review_log(path: &Path, card_id: &str, event: &ReviewEvent) -> Result<(), DeckError> {
    let io_err = |source| DeckError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    let is_new = file.metadata().map_err(io_err)?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    writer
        .serialize(LogRecord::new(card_id, event))
        .map_err(|source| DeckError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(io_err)
}

/// Read a review log and attach each event to its card, oldest first.
/// A missing log just means nothing has been reviewed yet.
pub fn load_review_log(path: &Path, cards: &mut [Card]) -> Result<usize, DeckError> {
    if !path.exists() {
        return Ok(0);
    }
    let csv_err = |source| DeckError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let mut attached = 0;
    for result in reader.deserialize::<LogRecord>() {
        let (card_id, event) = result.map_err(csv_err)?.into_event();
        match cards.iter_mut().find(|c| c.id == card_id) {
            Some(card) => {
                card.history.push(event);
                attached += 1;
            }
            None => tracing::warn!(%card_id, "review log entry for unknown card"),
        }
    }
    for card in cards.iter_mut() {
        card.history.sort_by_key(|e| e.reviewed_at);
    }
    Ok(attached)
}

pub fn discover_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_csv_recursive(path, &mut files);
        } else if is_csv(path) {
            files.push(path.clone());
        }
    }
    files.sort();
    files
}

fn is_csv(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("csv")
}

fn collect_csv_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "cannot read directory: {e}");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_csv_recursive(&path, files);
        } else if is_csv(&path) {
            files.push(path);
        }
    }
}
