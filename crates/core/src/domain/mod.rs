pub mod course;
pub mod grade;

pub use course::{Course, CourseKey, PeriodRange, Weekday};
pub use grade::{GradeLevel, GradeRules, StudyLevel, StudySystem};
