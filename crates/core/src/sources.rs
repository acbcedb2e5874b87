//! Collaborator ports: course data sources and the conflict decision maker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::normalize::RawRecord;
use crate::domain::course::Course;
use crate::suggestions::types::RecommendationQuery;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("source returned malformed data: {0}")]
    Decode(String),
    #[error("source io failure: {0}")]
    Io(String),
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_all_courses(
        &self,
        year: Option<u16>,
        semester: Option<u8>,
    ) -> Result<Vec<RawRecord>, SourceError>;

    async fn fetch_departments(
        &self,
        year: Option<u16>,
        semester: Option<u8>,
    ) -> Result<Vec<String>, SourceError>;
}

#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn fetch_recommendations(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Vec<RawRecord>, SourceError>;
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, query: &str) -> Result<Vec<RawRecord>, SourceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Replace,
    Keep,
}

/// Decides whether an incoming course displaces the one holding its slot.
/// An error or abandoned decision is treated as [`Decision::Keep`].
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn resolve(&self, incoming: &Course, existing: &Course) -> Result<Decision, SourceError>;
}

/// Answers every conflict the same way.
#[derive(Clone, Copy, Debug)]
pub struct FixedResolver(pub Decision);

#[async_trait]
impl ConflictResolver for FixedResolver {
    async fn resolve(&self, _incoming: &Course, _existing: &Course) -> Result<Decision, SourceError> {
        Ok(self.0)
    }
}
