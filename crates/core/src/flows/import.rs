//! Bulk import with per-conflict decisions.
//!
//! Courses are processed strictly in order, one decision at a time. Each course
//! runs the [`transition`] state machine until it is `Resolved`. A course that
//! fails, or displaced occupants and still ends skipped, is rolled back to the
//! store as it was before that course started, so no course is ever half-applied.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::normalize::{normalize, RawRecord};
use crate::domain::course::{Course, CourseKey};
use crate::errors::DomainError;
use crate::flows::states::{transition, ImportAction, ImportEvent, ImportState, SkipReason};
use crate::schedule::store::{AddOutcome, SelectionStore};
use crate::sources::{ConflictResolver, Decision};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum ImportResult {
    Added,
    Skipped { reason: SkipReason },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutcome {
    pub key: CourseKey,
    pub name: String,
    pub result: ImportResult,
    pub replaced: Vec<CourseKey>,
    pub rolled_back: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
    pub outcomes: Vec<CourseOutcome>,
}

impl ImportSummary {
    fn record(&mut self, outcome: CourseOutcome) {
        match outcome.result {
            ImportResult::Added => self.added += 1,
            ImportResult::Skipped { .. } => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Normalizes raw catalog records and imports them.
pub async fn import_records<R>(
    store: &mut SelectionStore,
    records: &[RawRecord],
    resolver: &R,
) -> Result<ImportSummary, DomainError>
where
    R: ConflictResolver + ?Sized,
{
    let courses = records.iter().map(normalize).collect();
    import_courses(store, courses, resolver).await
}

pub async fn import_courses<R>(
    store: &mut SelectionStore,
    targets: Vec<Course>,
    resolver: &R,
) -> Result<ImportSummary, DomainError>
where
    R: ConflictResolver + ?Sized,
{
    let mut seen = HashSet::new();
    let targets: Vec<Course> =
        targets.into_iter().filter(|course| seen.insert(course.key())).collect();

    info!(event_name = "import.started", targets = targets.len(), "importing courses");

    let mut summary = ImportSummary::default();
    for course in targets {
        let outcome = import_one(store, course, resolver).await?;
        debug!(
            event_name = "import.course_resolved",
            course = %outcome.key,
            result = ?outcome.result,
            replaced = outcome.replaced.len(),
            rolled_back = outcome.rolled_back,
            "course resolved"
        );
        summary.record(outcome);
    }

    info!(
        event_name = "import.completed",
        added = summary.added,
        skipped = summary.skipped,
        "import finished"
    );
    Ok(summary)
}

struct Resolution {
    result: ImportResult,
    replaced: Vec<CourseKey>,
}

async fn import_one<R>(
    store: &mut SelectionStore,
    course: Course,
    resolver: &R,
) -> Result<CourseOutcome, DomainError>
where
    R: ConflictResolver + ?Sized,
{
    let checkpoint = store.clone();
    let resolved = resolve_course(store, &course, resolver).await;
    settle(store, checkpoint, course, resolved)
}

/// Restores `checkpoint` when the course failed, or was skipped after displacing occupants.
fn settle(
    store: &mut SelectionStore,
    checkpoint: SelectionStore,
    course: Course,
    resolved: Result<Resolution, DomainError>,
) -> Result<CourseOutcome, DomainError> {
    let Resolution { result, replaced } = match resolved {
        Ok(resolution) => resolution,
        Err(error) => {
            warn!(
                event_name = "import.course_failed",
                course = %course.key(),
                error = %error,
                "restoring schedule after a failed import"
            );
            *store = checkpoint;
            return Err(error);
        }
    };

    let mut rolled_back = false;
    if let ImportResult::Skipped { reason } = result {
        if !replaced.is_empty() {
            warn!(
                event_name = "import.course_rolled_back",
                course = %course.key(),
                reason = ?reason,
                replaced = replaced.len(),
                "restoring courses displaced by a skipped import"
            );
            *store = checkpoint;
            rolled_back = true;
        }
    }

    Ok(CourseOutcome { key: course.key(), name: course.name, result, replaced, rolled_back })
}

async fn resolve_course<R>(
    store: &mut SelectionStore,
    course: &Course,
    resolver: &R,
) -> Result<Resolution, DomainError>
where
    R: ConflictResolver + ?Sized,
{
    let mut state = ImportState::Checking;
    let mut forced: Option<ImportEvent> = None;
    let mut occupant: Option<Course> = None;
    let mut replaced = Vec::new();
    let mut result = None;

    while state != ImportState::Resolved {
        let event = match forced.take() {
            Some(event) => event,
            None => {
                let (event, blocking) =
                    next_event(store, state, course, occupant.as_ref(), resolver).await?;
                if blocking.is_some() {
                    occupant = blocking;
                }
                event
            }
        };
        let step = transition(state, event)?;

        for action in step.actions {
            match action {
                ImportAction::AddCourse => match store.add(course.clone()) {
                    AddOutcome::Added => result = Some(ImportResult::Added),
                    other => {
                        return Err(DomainError::InvariantViolation(format!(
                            "course {} reported free slots but add returned {other:?}",
                            course.key()
                        )))
                    }
                },
                ImportAction::RequestDecision => {}
                ImportAction::RemoveOccupant => {
                    let Some(existing) = occupant.take() else {
                        return Err(DomainError::InvariantViolation(
                            "replace chosen without an occupant".to_owned(),
                        ));
                    };
                    if store.remove(&existing.code, &existing.serial) {
                        replaced.push(existing.key());
                    } else {
                        forced = Some(ImportEvent::OccupantMissing);
                    }
                }
                ImportAction::SkipCourse(reason) => result = Some(ImportResult::Skipped { reason }),
            }
        }
        state = step.to;
    }

    match result {
        Some(result) => Ok(Resolution { result, replaced }),
        None => Err(DomainError::InvariantViolation(format!(
            "course {} resolved without a result",
            course.key()
        ))),
    }
}

/// Produces the next event for `state`, plus the blocking course when the check finds one.
async fn next_event<R>(
    store: &SelectionStore,
    state: ImportState,
    course: &Course,
    occupant: Option<&Course>,
    resolver: &R,
) -> Result<(ImportEvent, Option<Course>), DomainError>
where
    R: ConflictResolver + ?Sized,
{
    match state {
        ImportState::Checking => {
            if store.is_selected(course) {
                return Ok((ImportEvent::AlreadySelected, None));
            }
            Ok(match store.check_conflict(course).conflicting_course {
                Some(existing) => (ImportEvent::SlotsOccupied, Some(existing)),
                None => (ImportEvent::SlotsFree, None),
            })
        }
        ImportState::AwaitingDecision => {
            let Some(existing) = occupant else {
                return Err(DomainError::InvariantViolation(
                    "awaiting a decision without an occupant".to_owned(),
                ));
            };
            match resolver.resolve(course, existing).await {
                Ok(Decision::Replace) => Ok((ImportEvent::ReplaceChosen, None)),
                Ok(Decision::Keep) => Ok((ImportEvent::KeepChosen, None)),
                Err(error) => {
                    warn!(
                        event_name = "import.resolver_failed",
                        course = %course.key(),
                        error = %error,
                        "conflict decision failed; keeping existing course"
                    );
                    Ok((ImportEvent::ResolverFailed, None))
                }
            }
        }
        ImportState::Resolved => Err(DomainError::InvariantViolation(
            "resolved course asked for another event".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{import_courses, import_records, settle, ImportResult, Resolution};
    use crate::catalog::normalize::RawRecord;
    use crate::domain::course::{Course, CourseKey, PeriodRange, Weekday};
    use crate::errors::DomainError;
    use crate::flows::states::SkipReason;
    use crate::schedule::store::SelectionStore;
    use crate::sources::{ConflictResolver, Decision, FixedResolver, SourceError};

    struct ScriptedResolver {
        answers: Mutex<VecDeque<Result<Decision, SourceError>>>,
    }

    impl ScriptedResolver {
        fn new(answers: Vec<Result<Decision, SourceError>>) -> Self {
            Self { answers: Mutex::new(answers.into()) }
        }
    }

    #[async_trait]
    impl ConflictResolver for ScriptedResolver {
        async fn resolve(&self, _incoming: &Course, _existing: &Course) -> Result<Decision, SourceError> {
            self.answers
                .lock()
                .expect("resolver lock")
                .pop_front()
                .unwrap_or(Err(SourceError::Unavailable("no scripted answer".to_owned())))
        }
    }

    struct RecordingResolver {
        decision: Decision,
        seen: Mutex<Vec<(CourseKey, CourseKey)>>,
    }

    #[async_trait]
    impl ConflictResolver for RecordingResolver {
        async fn resolve(&self, incoming: &Course, existing: &Course) -> Result<Decision, SourceError> {
            self.seen.lock().expect("resolver lock").push((incoming.key(), existing.key()));
            Ok(self.decision)
        }
    }

    fn course(code: &str, day: Weekday, start: u8, end: u8) -> Course {
        Course {
            code: code.to_string(),
            serial: "01".to_string(),
            name: format!("{code} course"),
            credits: Decimal::from(2),
            weekday: Some(day),
            periods: PeriodRange::new(start, end),
            ..Course::default()
        }
    }

    #[tokio::test]
    async fn keep_decision_adds_one_and_skips_the_other() {
        let mut store = SelectionStore::default();
        let summary = import_courses(
            &mut store,
            vec![course("A", Weekday::Monday, 1, 2), course("B", Weekday::Monday, 2, 3)],
            &FixedResolver(Decision::Keep),
        )
        .await
        .expect("import succeeds");

        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            summary.outcomes[1].result,
            ImportResult::Skipped { reason: SkipReason::Kept }
        );
        assert!(store.find("A", "01").is_some());
        assert!(store.find("B", "01").is_none());
    }

    #[tokio::test]
    async fn replace_decision_displaces_every_overlapping_occupant() {
        let mut store = SelectionStore::default();
        store.add(course("A", Weekday::Tuesday, 1, 1));
        store.add(course("B", Weekday::Tuesday, 2, 2));

        let summary = import_courses(
            &mut store,
            vec![course("C", Weekday::Tuesday, 1, 2)],
            &FixedResolver(Decision::Replace),
        )
        .await
        .expect("import succeeds");

        assert_eq!(summary.added, 1);
        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.replaced.len(), 2);
        assert!(!outcome.rolled_back);
        assert_eq!(store.len(), 1);
        assert!(store.find("C", "01").is_some());
    }

    #[tokio::test]
    async fn resolver_failure_after_replace_rolls_the_course_back() {
        let mut store = SelectionStore::default();
        store.add(course("A", Weekday::Wednesday, 1, 1));
        store.add(course("B", Weekday::Wednesday, 2, 2));
        let before = store.clone();

        let resolver = ScriptedResolver::new(vec![
            Ok(Decision::Replace),
            Err(SourceError::Unavailable("prompt closed".to_owned())),
        ]);
        let summary =
            import_courses(&mut store, vec![course("C", Weekday::Wednesday, 1, 2)], &resolver)
                .await
                .expect("import succeeds");

        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.result, ImportResult::Skipped { reason: SkipReason::ResolverFailed });
        assert!(outcome.rolled_back);
        assert_eq!(store, before);
    }

    #[tokio::test]
    async fn duplicates_and_selected_courses_are_skipped() {
        let mut store = SelectionStore::default();
        store.add(course("A", Weekday::Friday, 1, 1));

        let records: Vec<RawRecord> = [
            json!({"課程代碼": "A", "序號": "01", "星期": "5", "起始節次": 1, "結束節次": 1}),
            json!({"課程代碼": "B", "序號": "01", "星期": "週五", "起始節次": 3, "結束節次": 4}),
            json!({"code": "B", "serial": "01", "day": "5", "start_period": 3, "end_period": 4}),
        ]
        .into_iter()
        .filter_map(|value| value.as_object().cloned())
        .collect();

        let summary = import_records(&mut store, &records, &FixedResolver(Decision::Keep))
            .await
            .expect("import succeeds");

        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(
            summary.outcomes[0].result,
            ImportResult::Skipped { reason: SkipReason::AlreadySelected }
        );
        assert_eq!(summary.outcomes[1].result, ImportResult::Added);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn schedule_less_courses_import_without_decisions() {
        let mut store = SelectionStore::default();
        let thesis = Course { code: "T".to_string(), serial: "1".to_string(), ..Course::default() };
        let resolver = ScriptedResolver::new(Vec::new());
        let summary =
            import_courses(&mut store, vec![thesis], &resolver).await.expect("import succeeds");
        assert_eq!(summary.added, 1);
    }

    #[tokio::test]
    async fn resolver_sees_the_blocking_course() {
        let mut store = SelectionStore::default();
        let resolver = RecordingResolver { decision: Decision::Keep, seen: Mutex::new(Vec::new()) };
        import_courses(
            &mut store,
            vec![course("A", Weekday::Monday, 1, 2), course("B", Weekday::Monday, 2, 3)],
            &resolver,
        )
        .await
        .expect("import succeeds");

        let seen = resolver.seen.lock().expect("resolver lock").clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.code, "B");
        assert_eq!(seen[0].1.code, "A");
    }

    #[tokio::test]
    async fn replace_asks_once_per_displaced_occupant() {
        let mut store = SelectionStore::default();
        store.add(course("A", Weekday::Thursday, 1, 1));
        store.add(course("B", Weekday::Thursday, 2, 2));
        let resolver = RecordingResolver { decision: Decision::Replace, seen: Mutex::new(Vec::new()) };

        import_courses(&mut store, vec![course("C", Weekday::Thursday, 1, 2)], &resolver)
            .await
            .expect("import succeeds");

        let existing: Vec<String> = resolver
            .seen
            .lock()
            .expect("resolver lock")
            .iter()
            .map(|(_, existing)| existing.code.clone())
            .collect();
        assert_eq!(existing, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn failed_course_restores_the_checkpoint() {
        let mut store = SelectionStore::default();
        store.add(course("A", Weekday::Saturday, 1, 1));
        store.add(course("B", Weekday::Saturday, 2, 2));
        let checkpoint = store.clone();
        assert!(store.remove("A", "01"));

        let failure: Result<Resolution, DomainError> =
            Err(DomainError::InvariantViolation("grid out of sync".to_owned()));
        let error =
            settle(&mut store, checkpoint.clone(), course("C", Weekday::Saturday, 1, 2), failure)
                .expect_err("failure propagates");

        assert!(matches!(error, DomainError::InvariantViolation(_)));
        assert_eq!(store, checkpoint);
        assert!(store.find("A", "01").is_some());
    }

    #[test]
    fn added_course_keeps_its_replacements() {
        let mut store = SelectionStore::default();
        let checkpoint = store.clone();
        store.add(course("C", Weekday::Sunday, 1, 2));

        let outcome = settle(
            &mut store,
            checkpoint,
            course("C", Weekday::Sunday, 1, 2),
            Ok(Resolution { result: ImportResult::Added, replaced: Vec::new() }),
        )
        .expect("added course settles");

        assert!(!outcome.rolled_back);
        assert!(store.find("C", "01").is_some());
    }
}
