//! File-backed implementation of the course data ports.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::normalize::{normalize, RawRecord};
use crate::domain::course::{Course, CourseKey};
use crate::domain::grade::GradeRules;
use crate::history::HISTORY_LIMIT;
use crate::schedule::grid::Slot;
use crate::sources::{CatalogSource, HistorySource, RecommendationSource, SourceError};
use crate::suggestions::{Category, RecommendationQuery, DEFAULT_RECOMMENDATION_LIMIT};

#[derive(Clone, Debug)]
struct Entry {
    raw: RawRecord,
    course: Course,
}

/// Serves catalog, recommendation and history queries from one JSON record
/// file holding every term.
#[derive(Clone, Debug, Default)]
pub struct LocalCatalog {
    entries: Vec<Entry>,
    rules: GradeRules,
}

impl LocalCatalog {
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|raw| {
                let course = normalize(&raw);
                Entry { raw, course }
            })
            .collect();
        Self { entries, rules: GradeRules::default() }
    }

    /// Accepts a JSON array of records or an object with a `courses` array.
    pub fn from_json(text: &str) -> Result<Self, SourceError> {
        let value: Value =
            serde_json::from_str(text).map_err(|error| SourceError::Decode(error.to_string()))?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove("courses") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(SourceError::Decode(
                        "expected an array or an object with a `courses` array".to_owned(),
                    ))
                }
            },
            _ => return Err(SourceError::Decode("expected a JSON array of course records".to_owned())),
        };

        let total = items.len();
        let records: Vec<RawRecord> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect();
        if records.len() < total {
            debug!(
                event_name = "catalog.records_skipped",
                skipped = total - records.len(),
                "ignored non-object catalog entries"
            );
        }
        Ok(Self::from_records(records))
    }

    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)
            .map_err(|error| SourceError::Io(format!("{}: {error}", path.display())))?;
        let catalog = Self::from_json(&text)?;
        info!(
            event_name = "catalog.loaded",
            path = %path.display(),
            records = catalog.len(),
            "local catalog loaded"
        );
        Ok(catalog)
    }

    pub fn with_rules(mut self, rules: GradeRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest year present, then the latest semester within it.
    pub fn latest_term(&self) -> Option<(u16, u8)> {
        let year = self.entries.iter().filter_map(|entry| entry.course.year).max()?;
        let semester = self
            .entries
            .iter()
            .filter(|entry| entry.course.year == Some(year))
            .filter_map(|entry| entry.course.semester)
            .max()
            .unwrap_or(1);
        Some((year, semester))
    }

    /// Normalized courses of one term; the latest term when either half is missing.
    pub fn courses(&self, year: Option<u16>, semester: Option<u8>) -> Vec<Course> {
        self.term_entries(year, semester).map(|entry| entry.course.clone()).collect()
    }

    fn resolve_term(&self, year: Option<u16>, semester: Option<u8>) -> Option<(u16, u8)> {
        year.zip(semester).or_else(|| self.latest_term())
    }

    fn term_entries(&self, year: Option<u16>, semester: Option<u8>) -> impl Iterator<Item = &Entry> {
        let term = self.resolve_term(year, semester);
        self.entries.iter().filter(move |entry| match term {
            Some((year, semester)) => {
                entry.course.year == Some(year) && entry.course.semester == Some(semester)
            }
            None => false,
        })
    }

    fn matches_query(&self, course: &Course, query: &RecommendationQuery, excluded: &HashSet<CourseKey>) -> bool {
        if let Some(label) = query.category.as_deref() {
            let category = Category::parse(label);
            if category.is_global() && !course.class_label.contains(category.label()) {
                return false;
            }
        }
        if let Some(college) = non_empty(&query.college) {
            if course.college != college {
                return false;
            }
        }
        if let Some(department) = non_empty(&query.department) {
            if course.department != department && !course.class_label.contains(department) {
                return false;
            }
        }
        if let Some(grade) = non_empty(&query.grade) {
            if course.grade != grade {
                return false;
            }
        }
        if let Some(level) = query.level {
            if self.rules.study_level(course) != level {
                return false;
            }
        }
        if !query.preferred_days.is_empty()
            && !course.weekday.is_some_and(|day| query.preferred_days.contains(&day))
        {
            return false;
        }
        if excluded.contains(&course.key()) {
            return false;
        }
        if let Some(slots) = &query.empty_slots {
            let free: HashSet<Slot> = slots.iter().copied().collect();
            let fits = course.meeting().is_some_and(|(day, periods)| {
                periods.periods().all(|period| free.contains(&Slot::new(day, period)))
            });
            if !fits {
                return false;
            }
        }
        true
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

#[async_trait]
impl CatalogSource for LocalCatalog {
    async fn fetch_all_courses(
        &self,
        year: Option<u16>,
        semester: Option<u8>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        Ok(self.term_entries(year, semester).map(|entry| entry.raw.clone()).collect())
    }

    async fn fetch_departments(
        &self,
        year: Option<u16>,
        semester: Option<u8>,
    ) -> Result<Vec<String>, SourceError> {
        let departments: BTreeSet<&str> = self
            .term_entries(year, semester)
            .map(|entry| entry.course.department.as_str())
            .filter(|department| !department.is_empty())
            .collect();
        Ok(departments.into_iter().map(str::to_string).collect())
    }
}

#[async_trait]
impl RecommendationSource for LocalCatalog {
    async fn fetch_recommendations(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let excluded: HashSet<CourseKey> = query.current_courses.iter().cloned().collect();
        let records: Vec<RawRecord> = self
            .term_entries(query.year, query.semester)
            .filter(|entry| self.matches_query(&entry.course, query, &excluded))
            .take(DEFAULT_RECOMMENDATION_LIMIT)
            .map(|entry| entry.raw.clone())
            .collect();
        debug!(
            event_name = "catalog.recommendations_served",
            results = records.len(),
            "local recommendations served"
        );
        Ok(records)
    }
}

#[async_trait]
impl HistorySource for LocalCatalog {
    async fn fetch_history(&self, query: &str) -> Result<Vec<RawRecord>, SourceError> {
        let needle = query.trim().to_lowercase();
        let mut matches: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.course.name.to_lowercase().contains(&needle)
                    || entry.course.teacher.to_lowercase().contains(&needle)
            })
            .collect();
        matches.sort_by(|left, right| {
            right
                .course
                .year
                .cmp(&left.course.year)
                .then_with(|| right.course.semester.cmp(&left.course.semester))
        });
        Ok(matches.into_iter().take(HISTORY_LIMIT).map(|entry| entry.raw.clone()).collect())
    }
}
