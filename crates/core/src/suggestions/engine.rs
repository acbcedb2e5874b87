//! Recommendation pipeline: query building, deduplication and filtering.

use std::collections::HashSet;

use tracing::{debug, error, info};

use super::types::{Category, RecommendationCriteria, RecommendationQuery};
use super::RecommendationResult;
use crate::catalog::normalize::normalize_all;
use crate::domain::course::{Course, CourseKey, Weekday};
use crate::errors::{ApplicationError, DomainError};
use crate::schedule::store::SelectionStore;
use crate::sources::RecommendationSource;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum CandidateKey {
    Identity(CourseKey),
    Composite { name: String, teacher: String, weekday: Option<Weekday>, start: Option<u8> },
}

fn candidate_key(course: &Course) -> CandidateKey {
    let key = CourseKey::new(course.code.trim(), course.serial.trim());
    if key.is_complete() {
        return CandidateKey::Identity(key);
    }
    CandidateKey::Composite {
        name: course.name.trim().to_string(),
        teacher: course.teacher.trim().to_string(),
        weekday: course.weekday,
        start: course.periods.map(|periods| periods.start()),
    }
}

/// Keeps the first occurrence of each candidate.
pub fn dedup_candidates(candidates: Vec<Course>) -> Vec<Course> {
    let mut seen = HashSet::new();
    candidates.into_iter().filter(|course| seen.insert(candidate_key(course))).collect()
}

/// Rejects criteria that cannot produce a meaningful search.
pub fn validate_criteria(
    criteria: &RecommendationCriteria,
    store: &SelectionStore,
) -> Result<(), DomainError> {
    if criteria.weekdays.is_empty() {
        return Err(DomainError::NoWeekdaySelected);
    }
    if criteria.empty_slots_only && store.empty_slots().is_empty() {
        return Err(DomainError::NoEmptySlots);
    }
    if criteria.category == Category::OutsideElective
        && criteria.department.as_deref().map_or(true, |dept| dept.trim().is_empty())
    {
        return Err(DomainError::MissingDepartment { category: criteria.category.to_string() });
    }
    Ok(())
}

/// Builds the outbound query. Global categories drop the college, department
/// and grade scope. The term comes from the first selected course, else `default_term`.
pub fn build_query(
    criteria: &RecommendationCriteria,
    store: &SelectionStore,
    default_term: Option<(u16, u8)>,
) -> RecommendationQuery {
    let scoped = !criteria.category.is_global();
    let term = store.year_semester_hint().or(default_term);

    RecommendationQuery {
        empty_slots: criteria.empty_slots_only.then(|| store.empty_slots()),
        category: Some(criteria.category.to_string()),
        college: criteria.college.clone().filter(|_| scoped),
        department: criteria.department.clone().filter(|_| scoped),
        grade: criteria.grade.clone().filter(|_| scoped),
        level: criteria.level,
        current_courses: store.selected_keys(),
        year: term.map(|(year, _)| year),
        semester: term.map(|(_, semester)| semester),
        preferred_days: criteria.weekdays.clone(),
    }
}

fn matches_category(course: &Course, criteria: &RecommendationCriteria) -> bool {
    let category = &criteria.category;
    if category.is_global() {
        if !course.class_label.contains(category.label()) {
            return false;
        }
        if *category == Category::CoreGeneral {
            if let Some(own) = criteria.user_college.as_deref().filter(|own| !own.is_empty()) {
                return course.college != own;
            }
        }
        return true;
    }
    if *category == Category::OutsideElective {
        let scope_match = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().filter(|wanted| !wanted.is_empty()).map_or(true, |wanted| wanted == actual)
        };
        return scope_match(&criteria.college, &course.college)
            && scope_match(&criteria.department, &course.department)
            && scope_match(&criteria.grade, &course.grade);
    }
    true
}

/// Dedup, category, weekday and empty-slot filters in that order. Preserves
/// the relative order of the candidates.
pub fn filter_recommendations(
    candidates: Vec<Course>,
    criteria: &RecommendationCriteria,
    store: &SelectionStore,
) -> Vec<Course> {
    let received = candidates.len();
    let filtered: Vec<Course> = dedup_candidates(candidates)
        .into_iter()
        .filter(|course| matches_category(course, criteria))
        .filter(|course| course.weekday.is_some_and(|day| criteria.weekdays.contains(&day)))
        .filter(|course| !criteria.empty_slots_only || !store.check_conflict(course).has_conflict)
        .collect();

    debug!(
        event_name = "recommend.filtered",
        received = received,
        kept = filtered.len(),
        category = %criteria.category,
        "recommendation candidates filtered"
    );
    filtered
}

/// Queries a recommendation source and runs its results through the pipeline.
pub struct RecommendationEngine<'a, S: ?Sized> {
    source: &'a S,
    default_term: Option<(u16, u8)>,
}

impl<'a, S> RecommendationEngine<'a, S>
where
    S: RecommendationSource + ?Sized,
{
    pub fn new(source: &'a S) -> Self {
        Self { source, default_term: None }
    }

    pub fn with_default_term(mut self, year: u16, semester: u8) -> Self {
        self.default_term = Some((year, semester));
        self
    }

    pub async fn recommend(
        &self,
        store: &SelectionStore,
        criteria: &RecommendationCriteria,
    ) -> RecommendationResult<Vec<Course>> {
        validate_criteria(criteria, store)?;
        let query = build_query(criteria, store, self.default_term);

        let records = self.source.fetch_recommendations(&query).await.map_err(|source_error| {
            error!(
                event_name = "recommend.source_failed",
                error = %source_error,
                "recommendation source failed"
            );
            ApplicationError::from(source_error)
        })?;

        let courses = filter_recommendations(normalize_all(&records), criteria, store);
        info!(
            event_name = "recommend.completed",
            category = %criteria.category,
            results = courses.len(),
            "recommendations ready"
        );
        Ok(courses)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::{build_query, dedup_candidates, filter_recommendations, validate_criteria, RecommendationEngine};
    use crate::catalog::normalize::RawRecord;
    use crate::domain::course::{Course, PeriodRange, Weekday};
    use crate::errors::{ApplicationError, DomainError};
    use crate::schedule::store::SelectionStore;
    use crate::sources::{RecommendationSource, SourceError};
    use crate::suggestions::types::{Category, RecommendationCriteria, RecommendationQuery};

    fn course(code: &str, day: Weekday, start: u8, end: u8) -> Course {
        Course {
            code: code.to_string(),
            serial: "01".to_string(),
            name: format!("{code} course"),
            weekday: Some(day),
            periods: PeriodRange::new(start, end),
            class_label: "核心通識(人文)".to_string(),
            college: "理學院".to_string(),
            ..Course::default()
        }
    }

    fn all_days() -> RecommendationCriteria {
        RecommendationCriteria::new(Category::CoreGeneral).with_weekdays(Weekday::ALL.to_vec())
    }

    #[test]
    fn duplicates_by_identity_collapse_to_first() {
        let first = Course { teacher: "王".to_string(), ..course("CS101", Weekday::Monday, 1, 2) };
        let second = Course { teacher: "王、李".to_string(), ..first.clone() };
        let kept = dedup_candidates(vec![first, second]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].teacher, "王");
    }

    #[test]
    fn records_without_identity_use_composite_key() {
        let anonymous = Course { code: String::new(), ..course("", Weekday::Monday, 1, 2) };
        let other_slot = Course { periods: PeriodRange::new(3, 4), ..anonymous.clone() };
        let kept = dedup_candidates(vec![anonymous.clone(), anonymous, other_slot]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn core_general_excludes_own_college_and_other_tracks() {
        let own = course("A", Weekday::Monday, 1, 1);
        let other = Course { college: "文學院".to_string(), ..course("B", Weekday::Monday, 2, 2) };
        let pe = Course { class_label: "大二體育".to_string(), ..course("C", Weekday::Monday, 3, 3) };

        let criteria = all_days().with_user_college("理學院");
        let kept = filter_recommendations(vec![own, other, pe], &criteria, &SelectionStore::default());
        assert_eq!(kept.iter().map(|c| c.code.as_str()).collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn outside_elective_matches_scope_exactly() {
        let wanted = Course { department: "資管系".to_string(), ..course("A", Weekday::Tuesday, 1, 1) };
        let other = Course { department: "資工系".to_string(), ..course("B", Weekday::Tuesday, 2, 2) };
        let criteria = RecommendationCriteria::new(Category::OutsideElective)
            .with_weekdays(vec![Weekday::Tuesday])
            .with_scope(None, Some("資管系".to_string()), None);

        let kept = filter_recommendations(vec![wanted, other], &criteria, &SelectionStore::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].code, "A");
    }

    #[test]
    fn weekday_filter_drops_other_days_and_unscheduled_courses() {
        let monday = course("A", Weekday::Monday, 1, 1);
        let friday = course("B", Weekday::Friday, 1, 1);
        let unscheduled = Course { weekday: None, periods: None, ..course("C", Weekday::Monday, 1, 1) };
        let criteria = RecommendationCriteria::new(Category::CoreGeneral).with_weekday_labels(["五"]);

        let kept =
            filter_recommendations(vec![monday, friday, unscheduled], &criteria, &SelectionStore::default());
        assert_eq!(kept.iter().map(|c| c.code.as_str()).collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn empty_slot_filter_excludes_only_when_requested() {
        let mut store = SelectionStore::default();
        store.add(course("TAKEN", Weekday::Wednesday, 3, 4));
        let candidate = course("NEW", Weekday::Wednesday, 3, 4);

        let relaxed = filter_recommendations(vec![candidate.clone()], &all_days(), &store);
        assert_eq!(relaxed.len(), 1);

        let strict = filter_recommendations(vec![candidate], &all_days().only_empty_slots(true), &store);
        assert!(strict.is_empty());
    }

    #[test]
    fn preconditions_are_reported_as_domain_errors() {
        let store = SelectionStore::default();
        assert_eq!(
            validate_criteria(&RecommendationCriteria::default(), &store),
            Err(DomainError::NoWeekdaySelected)
        );

        let outside = RecommendationCriteria::new(Category::OutsideElective)
            .with_weekdays(vec![Weekday::Monday]);
        assert!(matches!(
            validate_criteria(&outside, &store),
            Err(DomainError::MissingDepartment { .. })
        ));

        let mut full = SelectionStore::new(1);
        for day in Weekday::ALL {
            full.add(course(&format!("D{}", day.number()), day, 1, 1));
        }
        assert_eq!(
            validate_criteria(&all_days().only_empty_slots(true), &full),
            Err(DomainError::NoEmptySlots)
        );
    }

    #[test]
    fn global_query_drops_scope_and_infers_term() {
        let mut store = SelectionStore::default();
        store.add(Course { year: Some(113), semester: Some(1), ..course("A", Weekday::Monday, 1, 1) });
        let criteria = all_days()
            .with_scope(Some("理學院".to_string()), Some("數學系".to_string()), Some("2".to_string()))
            .only_empty_slots(true);

        let query = build_query(&criteria, &store, Some((112, 2)));
        assert_eq!(query.college, None);
        assert_eq!(query.department, None);
        assert_eq!((query.year, query.semester), (Some(113), Some(1)));
        assert_eq!(query.current_courses.len(), 1);
        assert_eq!(query.empty_slots.map(|slots| slots.len()), Some(7 * 12 - 1));

        let scoped = build_query(
            &RecommendationCriteria { category: Category::OutsideElective, ..criteria },
            &SelectionStore::default(),
            Some((112, 2)),
        );
        assert_eq!(scoped.department.as_deref(), Some("數學系"));
        assert_eq!((scoped.year, scoped.semester), (Some(112), Some(2)));
    }

    struct StaticSource(Result<Vec<RawRecord>, SourceError>);

    #[async_trait]
    impl RecommendationSource for StaticSource {
        async fn fetch_recommendations(
            &self,
            _query: &RecommendationQuery,
        ) -> Result<Vec<RawRecord>, SourceError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn engine_normalizes_and_filters_source_records() {
        let records: Vec<RawRecord> = [
            json!({"課程代碼": "CS101", "序號": "01", "教師姓名": "甲", "星期": "1", "起始節次": 1, "結束節次": 2, "開課班別(代表)": "核心通識"}),
            json!({"課程代碼": "CS101", "序號": "01", "教師姓名": "甲乙", "星期": "1", "起始節次": 1, "結束節次": 2, "開課班別(代表)": "核心通識"}),
        ]
        .into_iter()
        .filter_map(|value| value.as_object().cloned())
        .collect();

        let source = StaticSource(Ok(records));
        let courses = RecommendationEngine::new(&source)
            .recommend(&SelectionStore::default(), &all_days())
            .await
            .expect("recommendation succeeds");
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].teacher, "甲");
    }

    #[tokio::test]
    async fn engine_surfaces_source_failure_as_integration_error() {
        let source = StaticSource(Err(SourceError::Unavailable("timeout".to_string())));
        let error = RecommendationEngine::new(&source)
            .recommend(&SelectionStore::default(), &all_days())
            .await
            .expect_err("source failure propagates");
        assert!(matches!(error, ApplicationError::Integration(_)));
    }
}
