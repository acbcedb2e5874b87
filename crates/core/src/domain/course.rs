use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity of a course offering within one year/semester.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CourseKey {
    pub code: String,
    pub serial: String,
}

impl CourseKey {
    pub fn new(code: impl Into<String>, serial: impl Into<String>) -> Self {
        Self { code: code.into(), serial: serial.into() }
    }

    /// Both halves present; records without a stable identity fall back to other keys.
    pub fn is_complete(&self) -> bool {
        !self.code.trim().is_empty() && !self.serial.trim().is_empty()
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.code, self.serial)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

const DAY_NAMES: &[(&str, Weekday)] = &[
    ("一", Weekday::Monday),
    ("二", Weekday::Tuesday),
    ("三", Weekday::Wednesday),
    ("四", Weekday::Thursday),
    ("五", Weekday::Friday),
    ("六", Weekday::Saturday),
    ("日", Weekday::Sunday),
    ("天", Weekday::Sunday),
    ("mon", Weekday::Monday),
    ("monday", Weekday::Monday),
    ("tue", Weekday::Tuesday),
    ("tues", Weekday::Tuesday),
    ("tuesday", Weekday::Tuesday),
    ("wed", Weekday::Wednesday),
    ("wednesday", Weekday::Wednesday),
    ("thu", Weekday::Thursday),
    ("thur", Weekday::Thursday),
    ("thurs", Weekday::Thursday),
    ("thursday", Weekday::Thursday),
    ("fri", Weekday::Friday),
    ("friday", Weekday::Friday),
    ("sat", Weekday::Saturday),
    ("saturday", Weekday::Saturday),
    ("sun", Weekday::Sunday),
    ("sunday", Weekday::Sunday),
];

const DAY_PREFIXES: &[&str] = &["星期", "禮拜", "週", "周"];

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn from_number(value: u8) -> Option<Self> {
        match value {
            1..=7 => Some(Self::ALL[usize::from(value - 1)]),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Monday => 1,
            Self::Tuesday => 2,
            Self::Wednesday => 3,
            Self::Thursday => 4,
            Self::Friday => 5,
            Self::Saturday => 6,
            Self::Sunday => 7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Monday => "一",
            Self::Tuesday => "二",
            Self::Wednesday => "三",
            Self::Thursday => "四",
            Self::Friday => "五",
            Self::Saturday => "六",
            Self::Sunday => "日",
        }
    }

    /// Accepts the numeric code (`"3"`, `"3.0"`) or a day-name alias (`"三"`, `"週三"`, `"Wed"`).
    pub fn parse(value: &str) -> Option<Self> {
        let mut trimmed = value.trim();
        for prefix in DAY_PREFIXES {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                trimmed = rest.trim();
                break;
            }
        }
        if trimmed.is_empty() {
            return None;
        }

        if let Ok(number) = trimmed.parse::<f64>() {
            if number.is_finite() && number.fract() == 0.0 && (1.0..=7.0).contains(&number) {
                return Self::from_number(number as u8);
            }
            return None;
        }

        let lowered = trimmed.to_lowercase();
        DAY_NAMES.iter().find(|(name, _)| *name == lowered).map(|(_, day)| *day)
    }
}

impl TryFrom<u8> for Weekday {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or_else(|| format!("weekday must be in 1..=7, got {value}"))
    }
}

impl From<Weekday> for u8 {
    fn from(value: Weekday) -> Self {
        value.number()
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Inclusive period span on one weekday. Always `1 <= start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriodRange")]
pub struct PeriodRange {
    start: u8,
    end: u8,
}

#[derive(Deserialize)]
struct RawPeriodRange {
    start: u8,
    end: u8,
}

impl TryFrom<RawPeriodRange> for PeriodRange {
    type Error = String;

    fn try_from(raw: RawPeriodRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
            .ok_or_else(|| format!("invalid period range {}..={}", raw.start, raw.end))
    }
}

impl PeriodRange {
    pub fn new(start: u8, end: u8) -> Option<Self> {
        (start >= 1 && start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    pub fn contains(&self, period: u8) -> bool {
        (self.start..=self.end).contains(&period)
    }

    pub fn periods(&self) -> impl Iterator<Item = u8> {
        self.start..=self.end
    }
}

impl fmt::Display for PeriodRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Canonical course offering produced by the normalizer.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub serial: String,
    pub name: String,
    pub teacher: String,
    pub credits: Decimal,
    pub weekday: Option<Weekday>,
    pub periods: Option<PeriodRange>,
    pub location: String,
    pub college: String,
    pub department: String,
    pub grade: String,
    pub class_label: String,
    pub class_name: String,
    pub system: String,
    pub level: String,
    pub year: Option<u16>,
    pub semester: Option<u8>,
    pub enrolled: Option<u32>,
    pub capacity: Option<u32>,
    pub registered: Option<u32>,
    pub syllabus_url: String,
    pub remarks: String,
}

impl Course {
    pub fn key(&self) -> CourseKey {
        CourseKey::new(self.code.clone(), self.serial.clone())
    }

    pub fn has_key(&self, code: &str, serial: &str) -> bool {
        self.code == code && self.serial == serial
    }

    /// Weekday and period span, when the offering meets at a fixed time.
    pub fn meeting(&self) -> Option<(Weekday, PeriodRange)> {
        Some((self.weekday?, self.periods?))
    }

    pub fn time_label(&self) -> String {
        match (self.weekday, self.periods) {
            (Some(day), Some(periods)) => format!("週{} {}節", day.label(), periods),
            (Some(day), None) => format!("週{}", day.label()),
            _ => "未定".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Course, CourseKey, PeriodRange, Weekday};

    #[test]
    fn weekday_accepts_numeric_and_named_forms() {
        assert_eq!(Weekday::parse("1"), Some(Weekday::Monday));
        assert_eq!(Weekday::parse(" 3.0 "), Some(Weekday::Wednesday));
        assert_eq!(Weekday::parse("五"), Some(Weekday::Friday));
        assert_eq!(Weekday::parse("週日"), Some(Weekday::Sunday));
        assert_eq!(Weekday::parse("星期二"), Some(Weekday::Tuesday));
        assert_eq!(Weekday::parse("Thu"), Some(Weekday::Thursday));
        assert_eq!(Weekday::parse("0"), None);
        assert_eq!(Weekday::parse("8"), None);
        assert_eq!(Weekday::parse("2.5"), None);
        assert_eq!(Weekday::parse(""), None);
        assert_eq!(Weekday::parse("不定"), None);
    }

    #[test]
    fn period_range_rejects_inverted_or_zero_bounds() {
        assert!(PeriodRange::new(0, 2).is_none());
        assert!(PeriodRange::new(4, 3).is_none());
        let range = PeriodRange::new(2, 4).expect("valid range");
        assert_eq!(range.periods().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert!(range.contains(3));
        assert!(!range.contains(5));
    }

    #[test]
    fn period_range_deserialization_enforces_invariant() {
        let ok: Result<PeriodRange, _> = serde_json::from_str(r#"{"start":1,"end":2}"#);
        assert!(ok.is_ok());
        let bad: Result<PeriodRange, _> = serde_json::from_str(r#"{"start":5,"end":2}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn meeting_requires_both_weekday_and_periods() {
        let mut course = Course { code: "CS101".into(), serial: "01".into(), ..Course::default() };
        assert!(course.meeting().is_none());
        course.weekday = Some(Weekday::Monday);
        assert!(course.meeting().is_none());
        course.periods = PeriodRange::new(1, 2);
        assert!(course.meeting().is_some());
        assert_eq!(course.key(), CourseKey::new("CS101", "01"));
        assert_eq!(course.time_label(), "週一 1-2節");
    }
}
