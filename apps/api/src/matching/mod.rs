//! Candidate/job matching: pure criteria scorers, the pairwise engine, the
//! batch matcher and the cached listing flow built on top of it.

pub mod batch;
pub mod criteria;
pub mod engine;
pub mod handlers;
pub mod listing;
pub mod similarity;
pub mod skills;
pub mod weights;

pub use batch::{BatchConfig, BatchCriteria, BatchMatcher, BatchReport, PairFailure};
pub use engine::{MatchingConfig, MatchingEngine};
pub use listing::{ListingQuery, MatchListings, MatchPage};
pub use weights::{MatchWeights, NormalizedWeights};
