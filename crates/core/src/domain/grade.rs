//! Grade, study level and study system classification.
//!
//! Grade text mixes numeric years ("2") with graduate markers ("碩1", "博士班").
//! The marker tables live in [`GradeRules`] so deployments can extend them from
//! configuration instead of patching conditionals.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::course::Course;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRules {
    pub graduate_markers: Vec<String>,
    pub doctoral_markers: Vec<String>,
    pub evening_markers: Vec<String>,
}

impl Default for GradeRules {
    fn default() -> Self {
        Self {
            graduate_markers: vec!["碩".to_string(), "master".to_string()],
            doctoral_markers: vec!["博".to_string(), "doctor".to_string(), "phd".to_string()],
            evening_markers: vec!["夜".to_string()],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "year")]
pub enum GradeLevel {
    Year(u8),
    Master(Option<u8>),
    Doctoral(Option<u8>),
    Ungraded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyLevel {
    Undergraduate,
    Master,
    Doctoral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudySystem {
    Day,
    Evening,
}

impl StudyLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Undergraduate => "大學部",
            Self::Master => "碩士班",
            Self::Doctoral => "博士班",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim() {
            "大學部" | "undergraduate" => Some(Self::Undergraduate),
            "碩士班" | "master" => Some(Self::Master),
            "博士班" | "doctoral" => Some(Self::Doctoral),
            _ => None,
        }
    }
}

impl StudySystem {
    pub fn label(self) -> &'static str {
        match self {
            Self::Day => "日間部",
            Self::Evening => "夜間部",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim() {
            "日間部" | "day" => Some(Self::Day),
            "夜間部" | "evening" => Some(Self::Evening),
            _ => None,
        }
    }
}

impl fmt::Display for StudyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for StudySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn contains_any(haystack: &str, markers: &[String]) -> bool {
    let lowered = haystack.to_lowercase();
    markers.iter().any(|marker| !marker.is_empty() && lowered.contains(&marker.to_lowercase()))
}

fn leading_number(value: &str) -> Option<u32> {
    let digits: String = value
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

impl GradeRules {
    pub fn classify(&self, grade: &str) -> GradeLevel {
        let year = leading_number(grade).and_then(|n| u8::try_from(n).ok());
        if contains_any(grade, &self.doctoral_markers) {
            return GradeLevel::Doctoral(year);
        }
        if contains_any(grade, &self.graduate_markers) {
            return GradeLevel::Master(year);
        }
        match year {
            Some(year) if year > 0 => GradeLevel::Year(year),
            _ => GradeLevel::Ungraded,
        }
    }

    /// Explicit level field first, then markers in the class label or grade.
    pub fn study_level(&self, course: &Course) -> StudyLevel {
        if let Some(level) = StudyLevel::from_label(&course.level) {
            return level;
        }
        if contains_any(&course.class_label, &self.doctoral_markers)
            || contains_any(&course.grade, &self.doctoral_markers)
        {
            return StudyLevel::Doctoral;
        }
        if contains_any(&course.class_label, &self.graduate_markers)
            || contains_any(&course.grade, &self.graduate_markers)
        {
            return StudyLevel::Master;
        }
        StudyLevel::Undergraduate
    }

    pub fn study_system(&self, course: &Course) -> StudySystem {
        if let Some(system) = StudySystem::from_label(&course.system) {
            return system;
        }
        let class_text =
            if course.class_label.is_empty() { &course.class_name } else { &course.class_label };
        if contains_any(class_text, &self.evening_markers) {
            StudySystem::Evening
        } else {
            StudySystem::Day
        }
    }
}

/// Orders grade strings by their numeric part, then lexically.
pub fn grade_sort_key(grade: &str) -> (u32, String) {
    (leading_number(grade).unwrap_or(0), grade.to_string())
}

pub fn grade_display_label(rules: &GradeRules, grade: &str) -> String {
    match rules.classify(grade) {
        GradeLevel::Year(year) if grade.trim().chars().all(|ch| ch.is_ascii_digit()) => {
            format!("{year}年級")
        }
        GradeLevel::Master(Some(year)) => format!("碩士{year}年級"),
        GradeLevel::Doctoral(Some(year)) => format!("博士{year}年級"),
        _ => grade.to_string(),
    }
}
