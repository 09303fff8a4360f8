//! Heuristic relationship suggestions
//!
//! Scores are a fixed-weight blend of tag overlap, type match and author
//! match. This is a heuristic, not a learned model: false positives and
//! misses are expected.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::graph::{Node, RelationshipType};

/// Candidates scoring below this are dropped
pub const MIN_SUGGESTION_SCORE: f64 = 0.1;

const TAG_WEIGHT: f64 = 0.7;
const TYPE_BONUS: f64 = 0.2;
const AUTHOR_BONUS: f64 = 0.1;
const HIGH_TAG_SIMILARITY: f64 = 0.5;

/// A proposed relationship from the source node to `target_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub target_id: String,
    pub target_title: String,
    pub relationship_type: RelationshipType,
    pub score: f64,
    pub tag_similarity: f64,
    pub reason: String,
}

/// Result of a suggestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionOutcome {
    pub source_id: String,
    pub suggestions: Vec<Suggestion>,
    /// Nodes scored after exclusions
    pub candidates_considered: usize,
    pub warnings: Vec<String>,
}

/// `|A ∩ B| / max(|A|, |B|)`, zero when both sets are empty
pub fn tag_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let largest = a.len().max(b.len());
    if largest == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / largest as f64
}

/// Score one candidate against the source; `None` when below the threshold
pub fn score_candidate(source: &Node, candidate: &Node) -> Option<Suggestion> {
    let similarity = tag_similarity(&source.tags, &candidate.tags);
    let same_type = source.node_type == candidate.node_type;
    let same_author = match (source.author(), candidate.author()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };

    let mut score = TAG_WEIGHT * similarity;
    if same_type {
        score += TYPE_BONUS;
    }
    if same_author {
        score += AUTHOR_BONUS;
    }
    if score < MIN_SUGGESTION_SCORE {
        return None;
    }

    let relationship_type = if same_type {
        RelationshipType::SimilarTo
    } else if similarity >= HIGH_TAG_SIMILARITY {
        RelationshipType::Related
    } else {
        RelationshipType::References
    };

    let mut reasons = Vec::new();
    let shared: Vec<&str> = source
        .tags
        .intersection(&candidate.tags)
        .map(String::as_str)
        .collect();
    if !shared.is_empty() {
        reasons.push(format!(
            "{} shared tag{} ({})",
            shared.len(),
            if shared.len() == 1 { "" } else { "s" },
            shared.join(", ")
        ));
    }
    if same_type {
        reasons.push(format!("same type ({})", candidate.node_type));
    }
    if same_author {
        if let Some(author) = candidate.author() {
            reasons.push(format!("same author ({})", author));
        }
    }

    Some(Suggestion {
        target_id: candidate.id.clone(),
        target_title: candidate.title.clone(),
        relationship_type,
        score,
        tag_similarity: similarity,
        reason: reasons.join("; "),
    })
}

/// Sort by score descending, then title, and keep the first `limit`
pub(crate) fn rank(mut suggestions: Vec<Suggestion>, limit: usize) -> Vec<Suggestion> {
    suggestions.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.target_title.cmp(&b.target_title))
            .then_with(|| a.target_id.cmp(&b.target_id))
    });
    suggestions.truncate(limit);
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::NodeType;

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tag_similarity() {
        assert_eq!(tag_similarity(&tags(&["a", "b"]), &tags(&["b", "c", "d", "e"])), 0.25);
        assert_eq!(tag_similarity(&tags(&["a"]), &tags(&["a"])), 1.0);
        assert_eq!(tag_similarity(&tags(&[]), &tags(&[])), 0.0);
    }

    #[test]
    fn test_same_type_suggests_similar_to() {
        let source = Node::with_id("s", "Source", NodeType::Concept).with_tags(["rust", "memory"]);
        let candidate = Node::with_id("c", "Candidate", NodeType::Concept).with_tags(["rust"]);

        let suggestion = score_candidate(&source, &candidate).unwrap();
        assert_eq!(suggestion.relationship_type, RelationshipType::SimilarTo);
        assert!((suggestion.score - (0.7 * 0.5 + 0.2)).abs() < 1e-9);
        assert!(suggestion.reason.contains("1 shared tag (rust)"));
        assert!(suggestion.reason.contains("same type (concept)"));
    }

    #[test]
    fn test_inferred_type_without_type_match() {
        let source = Node::with_id("s", "Source", NodeType::Note).with_tags(["a", "b"]);
        let related = Node::with_id("r", "R", NodeType::Concept).with_tags(["a", "b"]);
        let weak = Node::with_id("w", "W", NodeType::Concept).with_tags(["a", "x", "y", "z"]);

        assert_eq!(
            score_candidate(&source, &related).unwrap().relationship_type,
            RelationshipType::Related
        );
        assert_eq!(
            score_candidate(&source, &weak).unwrap().relationship_type,
            RelationshipType::References
        );
    }

    #[test]
    fn test_author_bonus_alone_reaches_threshold() {
        let source = Node::with_id("s", "S", NodeType::Note).with_metadata("author", "Ana");
        let candidate = Node::with_id("c", "C", NodeType::Concept).with_metadata("creator", "ana");

        let suggestion = score_candidate(&source, &candidate).unwrap();
        assert!((suggestion.score - 0.1).abs() < 1e-9);
        assert!(suggestion.reason.contains("same author"));
    }

    #[test]
    fn test_unrelated_candidate_dropped() {
        let source = Node::with_id("s", "S", NodeType::Note).with_tags(["a"]);
        let candidate = Node::with_id("c", "C", NodeType::Concept).with_tags(["b"]);
        assert!(score_candidate(&source, &candidate).is_none());
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let make = |id: &str, title: &str, score: f64| Suggestion {
            target_id: id.into(),
            target_title: title.into(),
            relationship_type: RelationshipType::Related,
            score,
            tag_similarity: 0.0,
            reason: String::new(),
        };
        let ranked = rank(
            vec![make("1", "B", 0.5), make("2", "A", 0.5), make("3", "C", 0.9)],
            2,
        );
        let ids: Vec<&str> = ranked.iter().map(|s| s.target_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }
}
