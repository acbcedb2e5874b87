//! Types for the Recommendation Pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::course::{CourseKey, Weekday};
use crate::domain::grade::StudyLevel;
use crate::schedule::grid::Slot;

/// Recommendation category chosen by the student
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Category {
    /// 核心通識, core general education
    #[default]
    CoreGeneral,
    /// 精進中文
    Chinese,
    /// 精進英外文
    EnglishForeign,
    /// 教育學程, teacher certification
    TeacherEducation,
    /// 大二體育
    SophomorePe,
    /// 大三、四體育
    UpperYearPe,
    /// 系外選修, electives offered by another department
    OutsideElective,
    /// Any other label, passed through to the source unfiltered
    Other(String),
}

const GLOBAL_LABELS: &[(&str, Category)] = &[
    ("核心通識", Category::CoreGeneral),
    ("精進中文", Category::Chinese),
    ("精進英外文", Category::EnglishForeign),
    ("教育學程", Category::TeacherEducation),
    ("大二體育", Category::SophomorePe),
    ("大三、四體育", Category::UpperYearPe),
];

impl Category {
    /// Parse a category label; unknown labels become [`Category::Other`]
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        if label == "系外選修" {
            return Self::OutsideElective;
        }
        GLOBAL_LABELS
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, category)| category.clone())
            .unwrap_or_else(|| Self::Other(label.to_string()))
    }

    /// Label as it appears in course class-type text
    pub fn label(&self) -> &str {
        match self {
            Self::CoreGeneral => "核心通識",
            Self::Chinese => "精進中文",
            Self::EnglishForeign => "精進英外文",
            Self::TeacherEducation => "教育學程",
            Self::SophomorePe => "大二體育",
            Self::UpperYearPe => "大三、四體育",
            Self::OutsideElective => "系外選修",
            Self::Other(label) => label,
        }
    }

    /// Global categories ignore the student's college and department
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::CoreGeneral
                | Self::Chinese
                | Self::EnglishForeign
                | Self::TeacherEducation
                | Self::SophomorePe
                | Self::UpperYearPe
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.label().to_string()
    }
}

/// What the student asked for
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationCriteria {
    /// Requested category
    pub category: Category,
    /// The student's own college, excluded for core general education
    pub user_college: Option<String>,
    /// College to search in (department-scoped categories only)
    pub college: Option<String>,
    /// Department to search in (department-scoped categories only)
    pub department: Option<String>,
    /// Grade to search in (department-scoped categories only)
    pub grade: Option<String>,
    /// Study level restriction
    pub level: Option<StudyLevel>,
    /// Weekdays the student is willing to attend
    pub weekdays: Vec<Weekday>,
    /// Keep only courses that fit the current empty slots
    pub empty_slots_only: bool,
}

impl RecommendationCriteria {
    /// Create criteria for a category
    pub fn new(category: Category) -> Self {
        Self { category, ..Self::default() }
    }

    /// Set preferred weekdays from numeric or day-name text; unparseable entries are dropped
    pub fn with_weekday_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for day in labels.into_iter().filter_map(|label| Weekday::parse(label.as_ref())) {
            if !self.weekdays.contains(&day) {
                self.weekdays.push(day);
            }
        }
        self
    }

    /// Set preferred weekdays
    pub fn with_weekdays(mut self, weekdays: Vec<Weekday>) -> Self {
        self.weekdays = weekdays;
        self
    }

    /// Set the student's own college
    pub fn with_user_college(mut self, college: impl Into<String>) -> Self {
        self.user_college = Some(college.into());
        self
    }

    /// Set the department search scope
    pub fn with_scope(
        mut self,
        college: Option<String>,
        department: Option<String>,
        grade: Option<String>,
    ) -> Self {
        self.college = college;
        self.department = department;
        self.grade = grade;
        self
    }

    /// Set the study level restriction
    pub fn with_level(mut self, level: StudyLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Restrict to courses fitting empty slots
    pub fn only_empty_slots(mut self, enabled: bool) -> Self {
        self.empty_slots_only = enabled;
        self
    }
}

/// Outbound query sent to a recommendation source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationQuery {
    /// Free slots to fit, when restricted to empty slots
    pub empty_slots: Option<Vec<Slot>>,
    /// Category label
    pub category: Option<String>,
    /// College filter
    pub college: Option<String>,
    /// Department filter
    pub department: Option<String>,
    /// Grade filter
    pub grade: Option<String>,
    /// Study level filter
    pub level: Option<StudyLevel>,
    /// Courses already selected, excluded by the source
    pub current_courses: Vec<CourseKey>,
    /// Academic year to search
    pub year: Option<u16>,
    /// Semester to search
    pub semester: Option<u8>,
    /// Preferred weekdays
    pub preferred_days: Vec<Weekday>,
}

#[cfg(test)]
mod tests {
    use super::{Category, RecommendationCriteria};
    use crate::domain::course::Weekday;

    #[test]
    fn category_labels_round_trip() {
        assert_eq!(Category::parse("大三、四體育"), Category::UpperYearPe);
        assert_eq!(Category::parse(" 系外選修 "), Category::OutsideElective);
        assert_eq!(Category::parse("通識選修"), Category::Other("通識選修".to_string()));
        assert!(Category::CoreGeneral.is_global());
        assert!(!Category::OutsideElective.is_global());
        assert_eq!(String::from(Category::EnglishForeign), "精進英外文");
    }

    #[test]
    fn weekday_labels_accept_both_forms_without_duplicates() {
        let criteria = RecommendationCriteria::default().with_weekday_labels(["1", "一", "三", "x"]);
        assert_eq!(criteria.weekdays, vec![Weekday::Monday, Weekday::Wednesday]);
    }
}
