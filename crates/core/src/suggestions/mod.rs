//! Course Recommendation Pipeline
//!
//! Turns a student's criteria into a source query, then deduplicates and
//! filters the returned candidates against the current schedule.

mod engine;
pub mod types;

pub use engine::{
    build_query, dedup_candidates, filter_recommendations, validate_criteria, RecommendationEngine,
};
pub use types::*;

use crate::errors::ApplicationError;

/// Result type for recommendation operations
pub type RecommendationResult<T> = Result<T, ApplicationError>;

/// Maximum recommendations a source returns
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 50;
