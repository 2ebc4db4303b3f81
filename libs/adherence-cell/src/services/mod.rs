pub mod adherence;
pub mod aggregator;

pub use adherence::AdherenceService;
pub use aggregator::summarize;
