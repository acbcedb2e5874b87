use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::course::{Course, CourseKey, Weekday};
use crate::schedule::grid::{ConflictCheck, Slot, TimeGrid, DEFAULT_MAX_PERIOD};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AddOutcome {
    Added,
    Conflict { existing: Box<Course> },
    AlreadySelected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditStatus {
    pub total: Decimal,
    pub target: Decimal,
    pub over_target: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub day: Weekday,
    pub period: u8,
    pub key: CourseKey,
}

/// Whole-state persisted form of the selection and its grid.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub selection: Vec<Course>,
    pub occupancy: Vec<SlotAssignment>,
}

#[derive(Clone, Debug)]
pub struct Restored {
    pub store: SelectionStore,
    pub duplicates_removed: usize,
    pub dropped_assignments: usize,
    pub repaired_slots: usize,
}

impl Restored {
    /// Cleanup happened and the cleaned state should be written back.
    pub fn needs_persist(&self) -> bool {
        self.duplicates_removed > 0 || self.dropped_assignments > 0 || self.repaired_slots > 0
    }
}

/// The student's selected courses and the grid they occupy.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionStore {
    selection: Vec<Course>,
    grid: TimeGrid,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PERIOD)
    }
}

impl SelectionStore {
    pub fn new(max_period: u8) -> Self {
        Self { selection: Vec::new(), grid: TimeGrid::new(max_period) }
    }

    pub fn courses(&self) -> &[Course] {
        &self.selection
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.selection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    pub fn is_selected(&self, course: &Course) -> bool {
        self.find(&course.code, &course.serial).is_some()
    }

    pub fn find(&self, code: &str, serial: &str) -> Option<&Course> {
        self.selection.iter().find(|selected| selected.has_key(code, serial))
    }

    pub fn selected_keys(&self) -> Vec<CourseKey> {
        self.selection.iter().map(Course::key).collect()
    }

    pub fn check_conflict(&self, course: &Course) -> ConflictCheck {
        self.grid.check_conflict(course)
    }

    pub fn empty_slots(&self) -> Vec<Slot> {
        self.grid.empty_slots()
    }

    pub fn add(&mut self, course: Course) -> AddOutcome {
        if self.is_selected(&course) {
            debug!(event_name = "schedule.add_skipped", course = %course.key(), "course already selected");
            return AddOutcome::AlreadySelected;
        }

        let check = self.grid.check_conflict(&course);
        if let Some(existing) = check.conflicting_course {
            debug!(
                event_name = "schedule.add_conflict",
                course = %course.key(),
                existing = %existing.key(),
                "course conflicts with an occupied slot"
            );
            return AddOutcome::Conflict { existing: Box::new(existing) };
        }

        if let Some((weekday, periods)) = check.weekday.zip(check.periods) {
            self.grid.occupy(&course, weekday, periods);
        }
        debug!(event_name = "schedule.course_added", course = %course.key(), "course added");
        self.selection.push(course);
        AddOutcome::Added
    }

    pub fn remove(&mut self, code: &str, serial: &str) -> bool {
        let Some(index) = self.selection.iter().position(|course| course.has_key(code, serial))
        else {
            warn!(
                event_name = "schedule.remove_missing",
                code = code,
                serial = serial,
                "course to remove is not selected"
            );
            return false;
        };

        let removed = self.selection.remove(index);
        let released = self.grid.release(&removed.key());
        debug!(
            event_name = "schedule.course_removed",
            course = %removed.key(),
            released_slots = released,
            "course removed"
        );
        true
    }

    pub fn clear(&mut self) {
        let cleared = self.selection.len();
        self.selection.clear();
        self.grid.reset();
        info!(event_name = "schedule.cleared", cleared = cleared, "selection cleared");
    }

    pub fn total_credits(&self) -> Decimal {
        self.selection.iter().map(|course| course.credits).sum()
    }

    pub fn credit_status(&self, target: Decimal) -> CreditStatus {
        let total = self.total_credits();
        CreditStatus { total, target, over_target: total > target }
    }

    /// Year and semester of the first selected course, when both are known.
    pub fn year_semester_hint(&self) -> Option<(u16, u8)> {
        let first = self.selection.first()?;
        first.year.zip(first.semester)
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        ScheduleSnapshot {
            selection: self.selection.clone(),
            occupancy: self
                .grid
                .occupied()
                .map(|(slot, course)| SlotAssignment {
                    day: slot.day,
                    period: slot.period,
                    key: course.key(),
                })
                .collect(),
        }
    }

    /// Rebuilds a store from persisted state.
    ///
    /// Duplicate selections collapse to their first occurrence. Persisted slot
    /// assignments are kept only when they name a selected course whose meeting
    /// covers the slot. Declared slots missing from the persisted map are
    /// re-occupied when free.
    pub fn restore(snapshot: ScheduleSnapshot, max_period: u8) -> Restored {
        let mut seen = HashSet::new();
        let mut selection = Vec::with_capacity(snapshot.selection.len());
        let mut duplicates_removed = 0;
        for course in snapshot.selection {
            if seen.insert(course.key()) {
                selection.push(course);
            } else {
                duplicates_removed += 1;
            }
        }
        if duplicates_removed > 0 {
            info!(
                event_name = "schedule.duplicates_collapsed",
                removed = duplicates_removed,
                "cleaned duplicate selected courses"
            );
        }

        let index: HashMap<CourseKey, usize> =
            selection.iter().enumerate().map(|(position, course)| (course.key(), position)).collect();

        let mut grid = TimeGrid::new(max_period);
        let mut dropped_assignments = 0;
        for assignment in snapshot.occupancy {
            let slot = Slot::new(assignment.day, assignment.period);
            let covers = index.get(&assignment.key).map(|position| &selection[*position]).filter(
                |course| {
                    course
                        .meeting()
                        .is_some_and(|(day, periods)| day == slot.day && periods.contains(slot.period))
                },
            );
            match covers {
                Some(course) if grid.place(slot, course) => {}
                _ => dropped_assignments += 1,
            }
        }

        let mut repaired_slots = 0;
        for course in &selection {
            let Some((day, periods)) = course.meeting() else {
                continue;
            };
            for period in periods.periods() {
                let slot = Slot::new(day, period);
                match grid.occupant(slot) {
                    Some(occupant) if occupant.has_key(&course.code, &course.serial) => {}
                    Some(occupant) => warn!(
                        event_name = "schedule.restore_overlap",
                        course = %course.key(),
                        occupant = %occupant.key(),
                        period = period,
                        "persisted selection overlaps; slot kept by earlier occupant"
                    ),
                    None => {
                        grid.place(slot, course);
                        repaired_slots += 1;
                    }
                }
            }
        }
        if dropped_assignments > 0 || repaired_slots > 0 {
            warn!(
                event_name = "schedule.grid_repaired",
                dropped = dropped_assignments,
                repaired = repaired_slots,
                "persisted grid did not match the selection"
            );
        }

        Restored {
            store: SelectionStore { selection, grid },
            duplicates_removed,
            dropped_assignments,
            repaired_slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{AddOutcome, ScheduleSnapshot, SelectionStore, SlotAssignment};
    use crate::domain::course::{Course, CourseKey, PeriodRange, Weekday};
    use crate::schedule::grid::Slot;

    fn course(code: &str, day: Weekday, start: u8, end: u8) -> Course {
        Course {
            code: code.to_string(),
            serial: "01".to_string(),
            name: format!("{code} course"),
            credits: Decimal::from(3),
            weekday: Some(day),
            periods: PeriodRange::new(start, end),
            ..Course::default()
        }
    }

    #[test]
    fn added_course_conflicts_with_itself() {
        let mut store = SelectionStore::default();
        let algebra = course("MATH101", Weekday::Monday, 1, 2);
        assert_eq!(store.add(algebra.clone()), AddOutcome::Added);

        let check = store.check_conflict(&algebra);
        assert!(check.has_conflict);
        assert_eq!(check.conflicting_course.map(|c| c.key()), Some(algebra.key()));
    }

    #[test]
    fn add_is_idempotent_by_key() {
        let mut store = SelectionStore::default();
        let algebra = course("MATH101", Weekday::Monday, 1, 2);
        assert_eq!(store.add(algebra.clone()), AddOutcome::Added);
        let renamed = Course { name: "Different title".to_string(), ..algebra };
        assert_eq!(store.add(renamed), AddOutcome::AlreadySelected);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn conflicting_add_is_rejected_without_mutation() {
        let mut store = SelectionStore::default();
        let first = course("A", Weekday::Wednesday, 3, 4);
        store.add(first.clone());
        let before = store.clone();

        let outcome = store.add(course("B", Weekday::Wednesday, 4, 5));
        assert_eq!(outcome, AddOutcome::Conflict { existing: Box::new(first) });
        assert_eq!(store, before);
    }

    #[test]
    fn remove_frees_slots_for_neighbors() {
        let mut store = SelectionStore::default();
        store.add(course("A", Weekday::Monday, 1, 2));
        store.add(course("B", Weekday::Monday, 3, 4));

        assert!(store.remove("A", "01"));
        assert!(!store.check_conflict(&course("C", Weekday::Monday, 1, 2)).has_conflict);
        assert!(store.check_conflict(&course("D", Weekday::Monday, 4, 4)).has_conflict);
        assert!(!store.remove("A", "01"));
    }

    #[test]
    fn schedule_less_course_is_selected_without_occupying_slots() {
        let mut store = SelectionStore::default();
        let thesis = Course { code: "THESIS".to_string(), serial: "01".to_string(), ..Course::default() };
        assert_eq!(store.add(thesis), AddOutcome::Added);
        assert_eq!(store.grid().occupied_count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_resets_selection_and_grid() {
        let mut store = SelectionStore::default();
        store.add(course("A", Weekday::Friday, 1, 3));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.empty_slots().len(), 7 * 12);
    }

    #[test]
    fn credits_sum_and_target_flag() {
        let mut store = SelectionStore::default();
        store.add(course("A", Weekday::Monday, 1, 1));
        store.add(Course { credits: Decimal::new(15, 1), ..course("B", Weekday::Monday, 2, 2) });
        assert_eq!(store.total_credits(), Decimal::new(45, 1));

        let status = store.credit_status(Decimal::from(4));
        assert!(status.over_target);
        assert!(!store.credit_status(Decimal::from(25)).over_target);
    }

    #[test]
    fn snapshot_round_trip_preserves_selection_and_grid() {
        let mut store = SelectionStore::default();
        store.add(course("B", Weekday::Tuesday, 5, 6));
        store.add(course("A", Weekday::Monday, 1, 2));
        store.add(Course { code: "IS".to_string(), serial: "09".to_string(), ..Course::default() });

        let restored = SelectionStore::restore(store.snapshot(), 12);
        assert!(!restored.needs_persist());
        assert_eq!(restored.store, store);
        assert_eq!(restored.store.courses()[0].code, "B");
    }

    #[test]
    fn restore_collapses_duplicates_and_repairs_grid() {
        let first = course("A", Weekday::Monday, 1, 2);
        let duplicate = Course { name: "stale copy".to_string(), ..first.clone() };
        let snapshot = ScheduleSnapshot {
            selection: vec![first.clone(), duplicate, course("B", Weekday::Tuesday, 1, 1)],
            occupancy: vec![
                SlotAssignment { day: Weekday::Monday, period: 1, key: first.key() },
                SlotAssignment { day: Weekday::Friday, period: 9, key: CourseKey::new("GONE", "01") },
            ],
        };

        let restored = SelectionStore::restore(snapshot, 12);
        assert_eq!(restored.duplicates_removed, 1);
        assert_eq!(restored.dropped_assignments, 1);
        assert_eq!(restored.repaired_slots, 2);
        assert!(restored.needs_persist());

        let store = restored.store;
        assert_eq!(store.len(), 2);
        assert_eq!(store.courses()[0].name, "A course");
        assert!(store.grid().occupant(Slot::new(Weekday::Monday, 2)).is_some());
        assert!(store.grid().occupant(Slot::new(Weekday::Tuesday, 1)).is_some());
        assert!(store.grid().occupant(Slot::new(Weekday::Friday, 9)).is_none());
    }

    #[test]
    fn year_semester_hint_uses_first_selection() {
        let mut store = SelectionStore::default();
        assert_eq!(store.year_semester_hint(), None);
        store.add(Course { year: Some(113), semester: Some(2), ..course("A", Weekday::Monday, 1, 1) });
        store.add(Course { year: Some(112), semester: Some(1), ..course("B", Weekday::Monday, 2, 2) });
        assert_eq!(store.year_semester_hint(), Some((113, 2)));
    }
}
