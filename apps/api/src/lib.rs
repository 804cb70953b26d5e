//! Hybrid candidate/job matching service: skill normalization against a
//! curated taxonomy with semantic fallback, weighted multi-criteria scoring,
//! bounded batch matching and cached match listings.

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod matching;
pub mod models;
pub mod normalizer;
pub mod providers;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
