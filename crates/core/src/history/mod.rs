//! Historical offering aggregation and difficulty ranking.
//!
//! Offerings are grouped by (course name, teacher). Each group carries two
//! averages over its valid offerings, those with both a capacity and a
//! registered count above zero:
//!
//! * selection rate, `min(1, capacity / registered)`: the chance a registrant got in;
//! * saturation, `registered / capacity`: how oversubscribed the course runs.
//!
//! Groups sort hardest first: ascending selection rate, then descending
//! saturation. Groups without valid offerings sort last.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::catalog::normalize::normalize_all;
use crate::domain::course::Course;
use crate::errors::{ApplicationError, DomainError};
use crate::sources::HistorySource;

pub const HISTORY_LIMIT: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub selection_rate: f64,
    pub saturation: f64,
    pub valid_offerings: usize,
}

impl HistoryStats {
    const EMPTY: Self = Self { selection_rate: 0.0, saturation: -1.0, valid_offerings: 0 };

    pub fn compute(offerings: &[Course]) -> Self {
        let valid: Vec<(f64, f64)> = offerings
            .iter()
            .filter_map(|offering| match (offering.capacity, offering.registered) {
                (Some(capacity), Some(registered)) if capacity > 0 && registered > 0 => {
                    Some((f64::from(capacity), f64::from(registered)))
                }
                _ => None,
            })
            .collect();
        if valid.is_empty() {
            return Self::EMPTY;
        }

        let count = valid.len() as f64;
        let rate_sum: f64 = valid.iter().map(|(capacity, registered)| (capacity / registered).min(1.0)).sum();
        let saturation_sum: f64 = valid.iter().map(|(capacity, registered)| registered / capacity).sum();
        Self {
            selection_rate: rate_sum / count,
            saturation: saturation_sum / count,
            valid_offerings: valid.len(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.valid_offerings > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Hard,
    Moderate,
    Easy,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopularityTier {
    Oversubscribed,
    Full,
    Open,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryGroup {
    pub name: String,
    pub teacher: String,
    pub department: String,
    pub offerings: Vec<Course>,
    pub stats: HistoryStats,
}

impl HistoryGroup {
    /// Most recent offering by year, then semester.
    pub fn latest(&self) -> Option<&Course> {
        self.offerings.iter().max_by_key(|offering| term_of(offering))
    }

    /// Offerings oldest first.
    pub fn chronological(&self) -> Vec<&Course> {
        let mut ordered: Vec<&Course> = self.offerings.iter().collect();
        ordered.sort_by_key(|offering| term_of(offering));
        ordered
    }

    pub fn difficulty(&self) -> DifficultyTier {
        if !self.stats.has_data() {
            DifficultyTier::Unknown
        } else if self.stats.selection_rate < 0.3 {
            DifficultyTier::Hard
        } else if self.stats.selection_rate < 0.6 {
            DifficultyTier::Moderate
        } else {
            DifficultyTier::Easy
        }
    }

    pub fn popularity(&self) -> PopularityTier {
        if !self.stats.has_data() {
            PopularityTier::Unknown
        } else if self.stats.saturation >= 1.5 {
            PopularityTier::Oversubscribed
        } else if self.stats.saturation >= 1.0 {
            PopularityTier::Full
        } else {
            PopularityTier::Open
        }
    }
}

fn term_of(course: &Course) -> (u16, u8) {
    (course.year.unwrap_or(0), course.semester.unwrap_or(0))
}

/// `enrolled / capacity` for one offering.
pub fn fill_ratio(offering: &Course) -> Option<f64> {
    match (offering.enrolled, offering.capacity) {
        (Some(enrolled), Some(capacity)) if capacity > 0 => {
            Some(f64::from(enrolled) / f64::from(capacity))
        }
        _ => None,
    }
}

/// Drops repeated (year, semester, code, serial) records, keeping the first.
pub fn dedup_offerings(records: Vec<Course>) -> Vec<Course> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            seen.insert((record.year, record.semester, record.code.trim().to_string(), record.serial.trim().to_string()))
        })
        .collect()
}

fn rank(left: &HistoryGroup, right: &HistoryGroup) -> Ordering {
    match (left.stats.has_data(), right.stats.has_data()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
        (true, true) => left
            .stats
            .selection_rate
            .total_cmp(&right.stats.selection_rate)
            .then_with(|| right.stats.saturation.total_cmp(&left.stats.saturation)),
    }
}

pub fn aggregate(records: Vec<Course>) -> Vec<HistoryGroup> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<HistoryGroup> = Vec::new();

    for record in dedup_offerings(records) {
        let key = (record.name.trim().to_string(), record.teacher.trim().to_string());
        match index.get(&key) {
            Some(position) => groups[*position].offerings.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(HistoryGroup {
                    name: key.0,
                    teacher: key.1,
                    department: record.department.clone(),
                    offerings: vec![record],
                    stats: HistoryStats::EMPTY,
                });
            }
        }
    }

    for group in &mut groups {
        group.stats = HistoryStats::compute(&group.offerings);
    }
    groups.sort_by(rank);
    groups
}

/// Fetches history matching a course name or teacher and ranks it.
pub async fn search_history<S>(source: &S, query: &str) -> Result<Vec<HistoryGroup>, ApplicationError>
where
    S: HistorySource + ?Sized,
{
    let query = query.trim();
    if query.is_empty() {
        return Err(DomainError::EmptyHistoryQuery.into());
    }

    let records = source.fetch_history(query).await.map_err(|source_error| {
        error!(
            event_name = "history.source_failed",
            query = query,
            error = %source_error,
            "history source failed"
        );
        ApplicationError::from(source_error)
    })?;

    let groups = aggregate(normalize_all(&records));
    info!(
        event_name = "history.aggregated",
        query = query,
        records = records.len(),
        groups = groups.len(),
        "history search ranked"
    );
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::{aggregate, fill_ratio, search_history, DifficultyTier, HistoryStats, PopularityTier};
    use crate::catalog::normalize::RawRecord;
    use crate::domain::course::Course;
    use crate::errors::{ApplicationError, DomainError};
    use crate::sources::{HistorySource, SourceError};

    fn offering(name: &str, teacher: &str, year: u16, capacity: u32, registered: u32) -> Course {
        Course {
            code: format!("{name}-{teacher}"),
            serial: "01".to_string(),
            name: name.to_string(),
            teacher: teacher.to_string(),
            year: Some(year),
            semester: Some(1),
            capacity: Some(capacity),
            registered: Some(registered),
            ..Course::default()
        }
    }

    #[test]
    fn harder_group_ranks_first() {
        let groups = aggregate(vec![
            offering("Y", "t", 112, 60, 60),
            offering("X", "t", 112, 30, 100),
        ]);
        assert_eq!(groups[0].name, "X");
        assert!((groups[0].stats.selection_rate - 0.3).abs() < 1e-9);
        assert!((groups[1].stats.selection_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ties_break_on_higher_saturation() {
        let groups = aggregate(vec![
            offering("Calm", "t", 112, 50, 60),
            offering("Busy", "t", 112, 50, 200),
            offering("Busy", "t", 111, 50, 50),
        ]);
        let calm = &groups[1];
        assert_eq!(calm.name, "Calm");
        assert!(groups[0].stats.selection_rate < calm.stats.selection_rate);

        let tied = aggregate(vec![offering("A", "t", 112, 50, 60), offering("B", "t", 112, 100, 120)]);
        assert!((tied[0].stats.selection_rate - tied[1].stats.selection_rate).abs() < 1e-9);
        assert!(tied[0].stats.saturation >= tied[1].stats.saturation);
    }

    #[test]
    fn groups_without_valid_offerings_sort_last_with_sentinels() {
        let unknown = Course { registered: Some(0), ..offering("Empty", "t", 112, 40, 0) };
        let groups = aggregate(vec![unknown, offering("Easy", "t", 112, 100, 10)]);
        assert_eq!(groups[1].name, "Empty");
        assert_eq!(groups[1].stats, HistoryStats { selection_rate: 0.0, saturation: -1.0, valid_offerings: 0 });
        assert_eq!(groups[1].difficulty(), DifficultyTier::Unknown);
        assert_eq!(groups[0].difficulty(), DifficultyTier::Easy);
    }

    #[test]
    fn repeated_term_records_count_once() {
        let record = offering("Algo", "Lee", 112, 30, 90);
        let groups = aggregate(vec![record.clone(), record, offering("Algo", "Lee", 111, 30, 30)]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].offerings.len(), 2);
        assert_eq!(groups[0].stats.valid_offerings, 2);
        assert_eq!(groups[0].latest().and_then(|latest| latest.year), Some(112));
        let years: Vec<_> = groups[0].chronological().iter().map(|c| c.year).collect();
        assert_eq!(years, vec![Some(111), Some(112)]);
    }

    #[test]
    fn tiers_follow_thresholds() {
        let groups = aggregate(vec![offering("Hot", "t", 112, 20, 100)]);
        assert_eq!(groups[0].difficulty(), DifficultyTier::Hard);
        assert_eq!(groups[0].popularity(), PopularityTier::Oversubscribed);

        let groups = aggregate(vec![offering("Contested", "t", 112, 50, 100)]);
        assert_eq!(groups[0].difficulty(), DifficultyTier::Moderate);
        assert_eq!(groups[0].popularity(), PopularityTier::Oversubscribed);

        let groups = aggregate(vec![offering("Warm", "t", 112, 50, 60)]);
        assert_eq!(groups[0].difficulty(), DifficultyTier::Easy);
        assert_eq!(groups[0].popularity(), PopularityTier::Full);

        let groups = aggregate(vec![offering("Quiet", "t", 112, 100, 10)]);
        assert_eq!(groups[0].popularity(), PopularityTier::Open);
    }

    #[test]
    fn popularity_boundaries_are_inclusive() {
        let exactly_full = aggregate(vec![offering("Even", "t", 112, 50, 50)]);
        assert_eq!(exactly_full[0].popularity(), PopularityTier::Full);

        let just_below = aggregate(vec![offering("Near", "t", 112, 100, 149)]);
        assert_eq!(just_below[0].popularity(), PopularityTier::Full);

        let at_threshold = aggregate(vec![offering("Packed", "t", 112, 100, 150)]);
        assert_eq!(at_threshold[0].popularity(), PopularityTier::Oversubscribed);
    }

    #[test]
    fn rate_is_capped_when_capacity_exceeds_registrations() {
        let groups = aggregate(vec![
            offering("Y", "t", 112, 50, 10),
            offering("X", "t", 112, 50, 100),
        ]);
        assert_eq!(groups[0].name, "X");
        assert!((groups[0].stats.selection_rate - 0.5).abs() < 1e-9);
        assert!((groups[0].stats.saturation - 2.0).abs() < 1e-9);
        assert_eq!(groups[1].name, "Y");
        assert!((groups[1].stats.selection_rate - 1.0).abs() < 1e-9);
        assert!((groups[1].stats.saturation - 0.2).abs() < 1e-9);
    }

    #[test]
    fn fill_ratio_needs_capacity() {
        let full = Course { enrolled: Some(45), capacity: Some(50), ..Course::default() };
        assert_eq!(fill_ratio(&full), Some(0.9));
        assert_eq!(fill_ratio(&Course { capacity: Some(0), ..full }), None);
    }

    struct OneRecord;

    #[async_trait]
    impl HistorySource for OneRecord {
        async fn fetch_history(&self, query: &str) -> Result<Vec<RawRecord>, SourceError> {
            let record = json!({"課程名稱": query, "教師姓名": "陳", "上限人數": 40, "登記人數": 80});
            Ok(record.as_object().cloned().into_iter().collect())
        }
    }

    #[tokio::test]
    async fn search_rejects_blank_query() {
        let error = search_history(&OneRecord, "   ").await.expect_err("blank query");
        assert_eq!(error, ApplicationError::Domain(DomainError::EmptyHistoryQuery));
    }

    #[tokio::test]
    async fn search_normalizes_and_groups() {
        let groups = search_history(&OneRecord, "微積分").await.expect("search succeeds");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].teacher, "陳");
        assert!((groups[0].stats.selection_rate - 0.5).abs() < 1e-9);
    }
}
