pub mod import;
pub mod states;

pub use import::{import_courses, import_records, CourseOutcome, ImportResult, ImportSummary};
pub use states::{
    transition, ImportAction, ImportEvent, ImportState, ImportTransitionError, SkipReason,
    TransitionOutcome,
};
