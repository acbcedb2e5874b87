use serde_json::json;

use courseplan_core::config::{AppConfig, LoadOptions};
use courseplan_core::domain::grade::StudyLevel;
use courseplan_core::suggestions::{Category, RecommendationCriteria, RecommendationEngine};

use super::session::{open_catalog, CourseRow, Session};
use super::{execute, CommandFailure, CommandResult, CommandSuccess};

#[derive(Clone, Debug, Default)]
pub struct RecommendArgs {
    pub category: String,
    pub days: Vec<String>,
    pub user_college: Option<String>,
    pub college: Option<String>,
    pub department: Option<String>,
    pub grade: Option<String>,
    pub level: Option<StudyLevel>,
    pub empty_slots_only: bool,
}

impl RecommendArgs {
    fn criteria(&self) -> RecommendationCriteria {
        let mut criteria = RecommendationCriteria::new(Category::parse(&self.category))
            .with_weekday_labels(self.days.iter().flat_map(|day| day.split(',')))
            .with_scope(self.college.clone(), self.department.clone(), self.grade.clone())
            .only_empty_slots(self.empty_slots_only);
        if let Some(college) = &self.user_college {
            criteria = criteria.with_user_college(college.clone());
        }
        if let Some(level) = self.level {
            criteria = criteria.with_level(level);
        }
        criteria
    }
}

pub fn run(options: &LoadOptions, args: RecommendArgs) -> CommandResult {
    execute("recommend", options, |config| recommend(config, args))
}

async fn recommend(config: AppConfig, args: RecommendArgs) -> Result<CommandSuccess, CommandFailure> {
    let catalog = open_catalog(&config)?;
    let default_term = config.catalog.default_term();
    let session = Session::open(config).await?;

    let mut engine = RecommendationEngine::new(&catalog);
    if let Some((year, semester)) = default_term {
        engine = engine.with_default_term(year, semester);
    }

    let criteria = args.criteria();
    let courses = engine.recommend(&session.store, &criteria).await?;
    let rows: Vec<CourseRow> = courses.iter().map(CourseRow::from).collect();

    Ok(CommandSuccess::with_data(
        format!("{} recommendation(s) for {}", rows.len(), criteria.category),
        json!({ "category": criteria.category, "courses": rows }),
    ))
}
