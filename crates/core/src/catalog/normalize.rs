//! Raw record normalization.
//!
//! Upstream records arrive with localized, generic or foreign-language keys.
//! [`FIELD_RULES`] lists, per canonical field, the keys to probe in priority
//! order. The first key holding a non-null, non-blank value wins. Normalization
//! never fails: malformed values degrade to absence or zero.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::domain::course::{Course, PeriodRange, Weekday};

pub type RawRecord = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Name,
    Teacher,
    Credits,
    Location,
    Weekday,
    StartPeriod,
    EndPeriod,
    Code,
    Serial,
    College,
    Department,
    Grade,
    ClassLabel,
    ClassName,
    System,
    Level,
    Year,
    Semester,
    Enrolled,
    Capacity,
    Registered,
    Syllabus,
    Remarks,
}

const FIELD_RULES: &[(Field, &[&str])] = &[
    (Field::Name, &["中文課程名稱", "課程名稱", "英文課程名稱", "title", "name"]),
    (Field::Teacher, &["教師姓名", "教師", "教師列表", "teacher"]),
    (Field::Credits, &["學分", "credits"]),
    (Field::Location, &["上課地點", "教室", "location"]),
    (Field::Weekday, &["星期", "day", "weekday"]),
    (Field::StartPeriod, &["起始節次", "startPeriod", "start_period"]),
    (Field::EndPeriod, &["結束節次", "endPeriod", "end_period"]),
    (Field::Code, &["課程代碼", "code"]),
    (Field::Serial, &["序號", "serial"]),
    (Field::College, &["學院", "college"]),
    (Field::Department, &["科系", "系所", "department"]),
    (Field::Grade, &["年級", "grade"]),
    (Field::ClassLabel, &["開課班別(代表)", "開課班別", "班級", "class_name"]),
    (Field::ClassName, &["班級", "class_name"]),
    (Field::System, &["學制", "system"]),
    (Field::Level, &["部別", "部別(大學/碩士/博士)", "level"]),
    (Field::Year, &["學年度", "year"]),
    (Field::Semester, &["學期", "semester"]),
    (Field::Enrolled, &["選上人數", "enrolled"]),
    (Field::Capacity, &["上限人數", "人數上限", "capacity"]),
    (Field::Registered, &["登記人數", "registered"]),
    (Field::Syllabus, &["教學大綱連結", "syllabus_url"]),
    (Field::Remarks, &["備註", "remarks"]),
];

pub fn normalize(raw: &RawRecord) -> Course {
    let mut course = Course::default();
    let mut start_period = None;
    let mut end_period = None;

    for (field, keys) in FIELD_RULES {
        let Some(value) = first_present(raw, keys) else {
            continue;
        };

        match field {
            Field::Name => course.name = text(value),
            Field::Teacher => course.teacher = text(value),
            Field::Credits => course.credits = credits(value),
            Field::Location => course.location = text(value),
            Field::Weekday => course.weekday = Weekday::parse(&text(value)),
            Field::StartPeriod => start_period = whole_number(value),
            Field::EndPeriod => end_period = whole_number(value),
            Field::Code => course.code = text(value),
            Field::Serial => course.serial = text(value),
            Field::College => course.college = text(value),
            Field::Department => course.department = text(value),
            Field::Grade => course.grade = text(value),
            Field::ClassLabel => course.class_label = text(value),
            Field::ClassName => course.class_name = text(value),
            Field::System => course.system = text(value),
            Field::Level => course.level = text(value),
            Field::Year => course.year = bounded(value),
            Field::Semester => course.semester = bounded(value),
            Field::Enrolled => course.enrolled = bounded(value),
            Field::Capacity => course.capacity = bounded(value),
            Field::Registered => course.registered = bounded(value),
            Field::Syllabus => course.syllabus_url = text(value),
            Field::Remarks => course.remarks = text(value),
        }
    }

    course.periods = match (start_period, end_period) {
        (Some(start), Some(end)) => {
            match (u8::try_from(start).ok(), u8::try_from(end).ok()) {
                (Some(start), Some(end)) => PeriodRange::new(start, end),
                _ => None,
            }
        }
        _ => None,
    };

    course
}

pub fn normalize_all<'a, I>(records: I) -> Vec<Course>
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    records.into_iter().map(normalize).collect()
}

fn first_present<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| raw.get(*key)).find(|value| match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    })
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if float.is_finite() && float.fract() == 0.0 && float.abs() < 1e15 => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn as_float(value: &Value) -> Option<f64> {
    let float = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    float.is_finite().then_some(float)
}

/// Integral value of a numeric field, truncated toward zero.
fn whole_number(value: &Value) -> Option<i64> {
    as_float(value).map(|float| float.trunc() as i64)
}

fn bounded<T>(value: &Value) -> Option<T>
where
    T: TryFrom<i64>,
{
    whole_number(value).filter(|number| *number >= 0).and_then(|number| T::try_from(number).ok())
}

fn credits(value: &Value) -> Decimal {
    let parsed = match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .ok()
            .or_else(|| number.as_f64().and_then(|float| Decimal::try_from(float).ok())),
        Value::String(text) => Decimal::from_str(text.trim()).ok(),
        _ => None,
    };
    parsed.filter(|credits| !credits.is_sign_negative()).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{normalize, RawRecord};
    use crate::domain::course::{PeriodRange, Weekday};

    fn record(value: serde_json::Value) -> RawRecord {
        match value {
            serde_json::Value::Object(map) => map,
            _ => RawRecord::new(),
        }
    }

    #[test]
    fn localized_keys_win_over_generic_and_foreign_keys() {
        let course = normalize(&record(json!({
            "中文課程名稱": "資料結構",
            "課程名稱": "Data Structures (generic)",
            "title": "DS",
            "教師姓名": "王小明",
            "teacher": "Wang",
            "課程代碼": "CS201",
            "序號": "01"
        })));

        assert_eq!(course.name, "資料結構");
        assert_eq!(course.teacher, "王小明");
        assert_eq!(course.code, "CS201");
        assert_eq!(course.serial, "01");
    }

    #[test]
    fn blank_localized_value_falls_back_to_next_key() {
        let course = normalize(&record(json!({
            "中文課程名稱": "  ",
            "英文課程名稱": "Linear Algebra",
            "code": 1234,
            "serial": 7
        })));

        assert_eq!(course.name, "Linear Algebra");
        assert_eq!(course.code, "1234");
        assert_eq!(course.serial, "7");
    }

    #[test]
    fn periods_are_coerced_to_integers() {
        let course = normalize(&record(json!({
            "星期": "2",
            "起始節次": 3.0,
            "結束節次": "4.7"
        })));
        assert_eq!(course.weekday, Some(Weekday::Tuesday));
        assert_eq!(course.periods, PeriodRange::new(3, 4));
    }

    #[test]
    fn missing_or_invalid_periods_mean_no_schedule() {
        let missing = normalize(&record(json!({ "星期": "一", "起始節次": 1 })));
        assert_eq!(missing.weekday, Some(Weekday::Monday));
        assert!(missing.periods.is_none());

        let invalid = normalize(&record(json!({ "星期": "一", "起始節次": "abc", "結束節次": 2 })));
        assert!(invalid.periods.is_none());

        let zero = normalize(&record(json!({ "起始節次": 0, "結束節次": 2 })));
        assert!(zero.periods.is_none());
    }

    #[test]
    fn credits_default_to_zero_on_parse_failure() {
        assert_eq!(normalize(&record(json!({ "學分": "三" }))).credits, Decimal::ZERO);
        assert_eq!(normalize(&record(json!({ "學分": -2 }))).credits, Decimal::ZERO);
        assert_eq!(normalize(&record(json!({ "credits": 2.5 }))).credits, Decimal::new(25, 1));
        assert_eq!(normalize(&record(json!({ "學分": "3" }))).credits, Decimal::from(3));
    }

    #[test]
    fn empty_record_degrades_to_defaults() {
        let course = normalize(&RawRecord::new());
        assert!(course.name.is_empty());
        assert!(course.weekday.is_none());
        assert!(course.periods.is_none());
        assert_eq!(course.credits, Decimal::ZERO);
        assert!(course.registered.is_none());
    }

    #[test]
    fn enrollment_counts_accept_numeric_strings() {
        let course = normalize(&record(json!({
            "登記人數": "120",
            "上限人數": 60.0,
            "選上人數": 58,
            "學年度": "113",
            "學期": 1
        })));
        assert_eq!(course.registered, Some(120));
        assert_eq!(course.capacity, Some(60));
        assert_eq!(course.enrolled, Some(58));
        assert_eq!(course.year, Some(113));
        assert_eq!(course.semester, Some(1));
    }
}
