use std::sync::Arc;

use super::matching::names_match;

/// Verdict of an external drug-drug interaction source for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairSignal {
    pub severe: bool,
    pub description: String,
}

/// Source of pairwise drug-drug interaction signals, consulted for each
/// ingredient of a scanned medicine against each current medication.
pub trait PairwiseSignal: Send + Sync {
    fn check(&self, ingredient: &str, current_medication: &str) -> Option<PairSignal>;
}

/// Signals consulted in order; the first verdict wins.
impl PairwiseSignal for Vec<Arc<dyn PairwiseSignal>> {
    fn check(&self, ingredient: &str, current_medication: &str) -> Option<PairSignal> {
        self.iter()
            .find_map(|signal| signal.check(ingredient, current_medication))
    }
}

/// In-memory pairwise signal, e.g. loaded from a clinical interaction export.
#[derive(Debug, Clone, Default)]
pub struct StaticInteractionTable {
    entries: Vec<(String, String, PairSignal)>,
}

impl StaticInteractionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, a: &str, b: &str, severe: bool, description: &str) -> Self {
        self.entries.push((
            a.to_string(),
            b.to_string(),
            PairSignal {
                severe,
                description: description.to_string(),
            },
        ));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PairwiseSignal for StaticInteractionTable {
    fn check(&self, ingredient: &str, current_medication: &str) -> Option<PairSignal> {
        self.entries
            .iter()
            .find(|(a, b, _)| {
                (names_match(a, ingredient) && names_match(b, current_medication))
                    || (names_match(b, ingredient) && names_match(a, current_medication))
            })
            .map(|(_, _, signal)| signal.clone())
    }
}
