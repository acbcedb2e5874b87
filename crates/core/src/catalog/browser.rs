use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::course::Course;
use crate::domain::grade::{grade_display_label, grade_sort_key, GradeRules, StudyLevel, StudySystem};

/// Narrows the option lists shown while picking a class to import.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFilter {
    pub college: String,
    pub department: String,
    pub system: Option<StudySystem>,
    pub level: Option<StudyLevel>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeOption {
    pub value: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassOption {
    pub system: StudySystem,
    pub level: StudyLevel,
    pub name: String,
}

/// A fully specified class whose courses get imported together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSelection {
    pub college: String,
    pub department: String,
    pub grade: String,
    pub system: StudySystem,
    pub level: StudyLevel,
    pub class_name: String,
}

/// Read-only option lists over a normalized catalog.
pub struct CatalogBrowser<'a> {
    courses: &'a [Course],
    rules: &'a GradeRules,
}

impl<'a> CatalogBrowser<'a> {
    pub fn new(courses: &'a [Course], rules: &'a GradeRules) -> Self {
        Self { courses, rules }
    }

    pub fn colleges(&self) -> Vec<String> {
        distinct_sorted(self.courses.iter().map(|course| course.college.as_str()))
    }

    pub fn departments(&self, college: &str) -> Vec<String> {
        distinct_sorted(
            self.courses
                .iter()
                .filter(|course| course.college == college)
                .map(|course| course.department.as_str()),
        )
    }

    pub fn systems(&self) -> Vec<StudySystem> {
        let systems: BTreeSet<StudySystem> =
            self.courses.iter().map(|course| self.rules.study_system(course)).collect();
        systems.into_iter().collect()
    }

    pub fn levels(&self) -> Vec<StudyLevel> {
        let levels: BTreeSet<StudyLevel> =
            self.courses.iter().map(|course| self.rules.study_level(course)).collect();
        levels.into_iter().collect()
    }

    pub fn grades(&self, filter: &ClassFilter) -> Vec<GradeOption> {
        let mut grades: Vec<String> = self
            .courses
            .iter()
            .filter(|course| self.matches_filter(course, filter) && !course.grade.is_empty())
            .map(|course| course.grade.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        grades.sort_by_key(|grade| grade_sort_key(grade));
        grades
            .into_iter()
            .map(|grade| GradeOption { label: grade_display_label(self.rules, &grade), value: grade })
            .collect()
    }

    /// Classes offered for one grade, tagged with their derived system and level.
    pub fn classes(&self, filter: &ClassFilter, grade: &str) -> Vec<ClassOption> {
        let mut seen = HashSet::new();
        let mut classes: Vec<ClassOption> = self
            .courses
            .iter()
            .filter(|course| self.matches_filter(course, filter) && course.grade == grade)
            .filter_map(|course| {
                let name = class_name_of(course)?;
                Some(ClassOption {
                    system: self.rules.study_system(course),
                    level: self.rules.study_level(course),
                    name,
                })
            })
            .filter(|option| seen.insert(option.clone()))
            .collect();
        classes.sort_by(|left, right| left.name.cmp(&right.name));
        classes
    }

    /// Courses belonging to a class: exact class field, or the class name
    /// appearing in the class label. A blank class name selects nothing.
    pub fn class_courses(&self, selection: &ClassSelection) -> Vec<Course> {
        let wanted = selection.class_name.trim();
        if wanted.is_empty() {
            return Vec::new();
        }
        self.courses
            .iter()
            .filter(|course| {
                course.college == selection.college
                    && course.department == selection.department
                    && course.grade == selection.grade
                    && self.rules.study_system(course) == selection.system
                    && self.rules.study_level(course) == selection.level
                    && (course.class_name == wanted
                        || (!course.class_label.is_empty() && course.class_label.contains(wanted)))
            })
            .cloned()
            .collect()
    }

    fn matches_filter(&self, course: &Course, filter: &ClassFilter) -> bool {
        course.college == filter.college
            && course.department == filter.department
            && filter.system.map_or(true, |system| self.rules.study_system(course) == system)
            && filter.level.map_or(true, |level| self.rules.study_level(course) == level)
    }
}

fn distinct_sorted<'s>(values: impl Iterator<Item = &'s str>) -> Vec<String> {
    values
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Explicit class field, else an `N年級[A|B][班]` fragment of the class label.
fn class_name_of(course: &Course) -> Option<String> {
    if !course.class_name.is_empty() {
        return Some(course.class_name.clone());
    }
    let label = course.class_label.as_str();
    for (start, ch) in label.char_indices() {
        if !ch.is_ascii_digit() {
            continue;
        }
        let digits_end = label[start..]
            .find(|next: char| !next.is_ascii_digit())
            .map_or(label.len(), |offset| start + offset);
        let Some(rest) = label[digits_end..].strip_prefix("年級") else {
            continue;
        };
        let mut end = label.len() - rest.len();
        let mut tail = rest;
        if let Some(section) = tail.strip_prefix('A').or_else(|| tail.strip_prefix('B')) {
            end += 1;
            tail = section;
        }
        if tail.starts_with('班') {
            end += '班'.len_utf8();
        }
        return Some(label[start..end].to_string());
    }
    None
}
