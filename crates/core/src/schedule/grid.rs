use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::course::{Course, CourseKey, PeriodRange, Weekday};

pub const DEFAULT_MAX_PERIOD: u8 = 12;

/// One (weekday, period) cell. Orders by day, then period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub day: Weekday,
    pub period: u8,
}

impl Slot {
    pub fn new(day: Weekday, period: u8) -> Self {
        Self { day, period }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    pub conflicting_course: Option<Course>,
    pub weekday: Option<Weekday>,
    pub periods: Option<PeriodRange>,
}

impl ConflictCheck {
    fn clear(weekday: Option<Weekday>, periods: Option<PeriodRange>) -> Self {
        Self { has_conflict: false, conflicting_course: None, weekday, periods }
    }

    /// Resolved slot range for committing, when the course meets at a fixed time.
    pub fn placement(&self) -> Option<(Weekday, PeriodRange)> {
        Some((self.weekday?, self.periods?))
    }
}

/// Day × period occupancy map and conflict oracle.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeGrid {
    max_period: u8,
    slots: BTreeMap<Slot, Course>,
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PERIOD)
    }
}

impl TimeGrid {
    pub fn new(max_period: u8) -> Self {
        Self { max_period: max_period.max(1), slots: BTreeMap::new() }
    }

    pub fn max_period(&self) -> u8 {
        self.max_period
    }

    /// Scans the course's periods in ascending order and reports the first occupant found.
    pub fn check_conflict(&self, course: &Course) -> ConflictCheck {
        let Some(weekday) = course.weekday else {
            return ConflictCheck::clear(None, None);
        };
        let Some(periods) = course.periods else {
            return ConflictCheck::clear(Some(weekday), None);
        };

        let occupant = periods.periods().find_map(|period| self.slots.get(&Slot::new(weekday, period)));
        match occupant {
            Some(existing) => ConflictCheck {
                has_conflict: true,
                conflicting_course: Some(existing.clone()),
                weekday: Some(weekday),
                periods: Some(periods),
            },
            None => ConflictCheck::clear(Some(weekday), Some(periods)),
        }
    }

    /// Writes the course into every slot of the range. Callers check conflicts first.
    pub fn occupy(&mut self, course: &Course, weekday: Weekday, periods: PeriodRange) {
        for period in periods.periods() {
            self.slots.insert(Slot::new(weekday, period), course.clone());
        }
    }

    /// Frees every slot still held by `key`; slots reassigned to another course are untouched.
    pub fn release(&mut self, key: &CourseKey) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, occupant| !occupant.has_key(&key.code, &key.serial));
        before - self.slots.len()
    }

    /// Places a single slot when it is free. Used when rebuilding from a snapshot.
    pub(crate) fn place(&mut self, slot: Slot, course: &Course) -> bool {
        if self.slots.contains_key(&slot) {
            return false;
        }
        self.slots.insert(slot, course.clone());
        true
    }

    pub fn occupant(&self, slot: Slot) -> Option<&Course> {
        self.slots.get(&slot)
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Slot, &Course)> {
        self.slots.iter().map(|(slot, course)| (*slot, course))
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.len()
    }

    /// Unoccupied slots over 7 days × `1..=max_period`, ascending by (day, period).
    pub fn empty_slots(&self) -> Vec<Slot> {
        Weekday::ALL
            .iter()
            .flat_map(|day| (1..=self.max_period).map(move |period| Slot::new(*day, period)))
            .filter(|slot| !self.slots.contains_key(slot))
            .collect()
    }

    pub fn reset(&mut self) {
        self.slots.clear();
    }
}
