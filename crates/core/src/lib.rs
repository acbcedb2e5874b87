pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod history;
pub mod schedule;
pub mod sources;
pub mod suggestions;

pub use catalog::{
    normalize, normalize_all, CatalogBrowser, ClassFilter, ClassOption, ClassSelection,
    GradeOption, LocalCatalog, RawRecord,
};
pub use domain::{
    Course, CourseKey, GradeLevel, GradeRules, PeriodRange, StudyLevel, StudySystem, Weekday,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{import_courses, import_records, CourseOutcome, ImportResult, ImportSummary, SkipReason};
pub use history::{aggregate, search_history, DifficultyTier, HistoryGroup, HistoryStats, PopularityTier};
pub use schedule::{
    AddOutcome, ConflictCheck, CreditStatus, Restored, ScheduleSnapshot, SelectionStore, Slot,
    SlotAssignment, TimeGrid,
};
pub use sources::{
    CatalogSource, ConflictResolver, Decision, FixedResolver, HistorySource, RecommendationSource,
    SourceError,
};
pub use suggestions::{Category, RecommendationCriteria, RecommendationEngine, RecommendationQuery};
