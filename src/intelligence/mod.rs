//! Pure analytical core: interaction rule engine, risk aggregation and
//! enrichment reconciliation. Nothing here performs I/O or suspends.

pub mod detection;
pub mod engine;
pub mod matching;
pub mod messages;
pub mod reconcile;
pub mod reference;
pub mod risk;
pub mod signal;
pub mod types;

pub use engine::InteractionEngine;
pub use matching::{names_match, normalize};
pub use reconcile::reconcile;
pub use reference::InteractionRules;
pub use risk::{aggregate, aggregate_for, assess_prescription, merge_findings, search_metadata};
pub use signal::{PairSignal, PairwiseSignal, StaticInteractionTable};
pub use types::{IntelligenceError, MedicineQuery};
