// Topic interleaving: mix cards from different tags instead of serving them in blocks.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

/// How aggressively topics are mixed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    Low,
    Medium,
    High,
}

impl Pattern {
    /// Cards taken from a topic per turn.
    pub fn chunk_size(self) -> usize {
        match self {
            Pattern::Low => 3,
            Pattern::Medium => 2,
            Pattern::High => 1,
        }
    }
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Pattern::Low),
            "medium" => Ok(Pattern::Medium),
            "high" => Ok(Pattern::High),
            other => Err(format!(
                "unknown interleave pattern {other:?} (expected low, medium or high)"
            )),
        }
    }
}

pub trait Tagged {
    /// The tag a card is grouped under, if any.
    fn primary_tag(&self) -> Option<&str>;
}

pub fn interleave<T: Tagged + Clone>(
    cards: &[T],
    topic_count: usize,
    pattern: Pattern,
    weak_topics: &[String],
    config: &SessionConfig,
) -> Vec<T> {
    if cards.len() < config.interleave_min_cards || topic_count < config.interleave_min_topics {
        return cards.to_vec();
    }

    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    let mut untagged: Vec<usize> = Vec::new();
    for (i, card) in cards.iter().enumerate() {
        match card.primary_tag() {
            Some(tag) => match groups.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, members)) => members.push(i),
                None => groups.push((tag, vec![i])),
            },
            None => untagged.push(i),
        }
    }

    // Weak topics first, then bigger groups. The sort is stable, so ties
    // keep first-appearance order.
    groups.sort_by_key(|(tag, members)| {
        let weak = weak_topics.iter().any(|w| w == tag);
        (!weak, std::cmp::Reverse(members.len()))
    });
    let rest = groups.split_off(topic_count.min(groups.len()));

    let chunk = pattern.chunk_size();
    let mut order: Vec<usize> = Vec::with_capacity(cards.len());
    let mut cursors = vec![0usize; groups.len()];
    loop {
        let mut emitted = false;
        for ((_, members), cursor) in groups.iter().zip(cursors.iter_mut()) {
            if *cursor >= members.len() {
                continue;
            }
            let end = (*cursor + chunk).min(members.len());
            order.extend_from_slice(&members[*cursor..end]);
            *cursor = end;
            emitted = true;
        }
        if !emitted {
            break;
        }
    }

    // Cards outside the chosen topics keep their order and go at the end.
    let mut leftovers: Vec<usize> = rest.into_iter().flat_map(|(_, m)| m).collect();
    leftovers.sort_unstable();

    tracing::debug!(
        topics = groups.len(),
        chunk,
        leftover = leftovers.len(),
        untagged = untagged.len(),
        "interleaved session"
    );

    order.extend(leftovers);
    order.extend(untagged);
    order.into_iter().map(|i| cards[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        tag: Option<&'static str>,
        n: usize,
    }

    impl Tagged for Item {
        fn primary_tag(&self) -> Option<&str> {
            self.tag
        }
    }

    fn items(spec: &[(Option<&'static str>, usize)]) -> Vec<Item> {
        let mut out = Vec::new();
        let mut n = 0;
        for &(tag, count) in spec {
            for _ in 0..count {
                out.push(Item { tag, n });
                n += 1;
            }
        }
        out
    }

    fn tags(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.tag.unwrap_or("-")).collect()
    }

    #[test]
    fn medium_pattern_two_topics() {
        let cards = items(&[(Some("A"), 5), (Some("B"), 3)]);
        let out = interleave(&cards, 2, Pattern::Medium, &[], &SessionConfig::default());
        assert_eq!(tags(&out), vec!["A", "A", "B", "B", "A", "A", "B", "A"]);
        // within a topic, original order is kept
        let a: Vec<usize> = out.iter().filter(|i| i.tag == Some("A")).map(|i| i.n).collect();
        assert_eq!(a, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn high_pattern_alternates() {
        let cards = items(&[(Some("A"), 3), (Some("B"), 3)]);
        let out = interleave(&cards, 2, Pattern::High, &[], &SessionConfig::default());
        assert_eq!(tags(&out), vec!["A", "B", "A", "B", "A", "B"]);
    }

    #[test]
    fn low_pattern_chunks_of_three() {
        let cards = items(&[(Some("A"), 4), (Some("B"), 4)]);
        let out = interleave(&cards, 2, Pattern::Low, &[], &SessionConfig::default());
        assert_eq!(tags(&out), vec!["A", "A", "A", "B", "B", "B", "A", "B"]);
    }

    #[test]
    fn small_inputs_untouched() {
        let cards = items(&[(Some("A"), 2), (Some("B"), 1)]);
        let out = interleave(&cards, 2, Pattern::High, &[], &SessionConfig::default());
        assert_eq!(out, cards);

        let cards = items(&[(Some("A"), 5), (Some("B"), 5)]);
        let out = interleave(&cards, 1, Pattern::High, &[], &SessionConfig::default());
        assert_eq!(out, cards);
    }

    #[test]
    fn untagged_go_last() {
        let cards = items(&[(None, 2), (Some("A"), 2), (Some("B"), 2)]);
        let out = interleave(&cards, 2, Pattern::High, &[], &SessionConfig::default());
        assert_eq!(tags(&out), vec!["A", "B", "A", "B", "-", "-"]);
        assert_eq!(out[4].n, 0);
        assert_eq!(out[5].n, 1);
    }

    #[test]
    fn prefers_largest_groups() {
        let cards = items(&[(Some("S"), 1), (Some("L"), 4), (Some("M"), 2)]);
        let out = interleave(&cards, 2, Pattern::High, &[], &SessionConfig::default());
        assert_eq!(tags(&out), vec!["L", "M", "L", "M", "L", "L", "S"]);
    }

    #[test]
    fn prefers_weak_topics() {
        let cards = items(&[(Some("S"), 1), (Some("L"), 4), (Some("M"), 2)]);
        let weak = vec!["S".to_string()];
        let out = interleave(&cards, 2, Pattern::High, &weak, &SessionConfig::default());
        assert_eq!(tags(&out), vec!["S", "L", "L", "L", "L", "M", "M"]);
    }

    #[test]
    fn nothing_dropped() {
        let cards = items(&[(Some("A"), 3), (Some("B"), 2), (Some("C"), 4), (None, 1)]);
        let out = interleave(&cards, 2, Pattern::Medium, &[], &SessionConfig::default());
        assert_eq!(out.len(), cards.len());
        let mut seen: Vec<usize> = out.iter().map(|i| i.n).collect();
        seen.sort();
        assert_eq!(seen, (0..cards.len()).collect::<Vec<_>>());
    }

    #[test]
    fn pattern_parsing() {
        assert_eq!("low".parse::<Pattern>(), Ok(Pattern::Low));
        assert_eq!("HIGH".parse::<Pattern>(), Ok(Pattern::High));
        assert!("extreme".parse::<Pattern>().is_err());
    }
}
