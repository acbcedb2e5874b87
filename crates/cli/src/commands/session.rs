use serde::Serialize;
use tracing::info;

use courseplan_core::catalog::LocalCatalog;
use courseplan_core::config::AppConfig;
use courseplan_core::domain::course::Course;
use courseplan_core::schedule::SelectionStore;
use courseplan_db::{connect_with_config, load_selection, migrations, ScheduleRepository, SqlScheduleRepository};

use super::CommandFailure;

/// The persisted selection opened for one command.
pub struct Session {
    pub config: AppConfig,
    pub store: SelectionStore,
    repo: SqlScheduleRepository,
}

impl Session {
    pub async fn open(config: AppConfig) -> Result<Self, CommandFailure> {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| CommandFailure::db_connectivity(error.to_string()))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::migration(error.to_string()))?;

        let repo = SqlScheduleRepository::new(pool);
        let restored = load_selection(&repo, config.schedule.max_period).await?;
        if restored.needs_persist() {
            info!(
                event_name = "cli.selection_cleaned",
                duplicates_removed = restored.duplicates_removed,
                "stored selection was cleaned on load"
            );
        }
        Ok(Self { config, store: restored.store, repo })
    }

    pub async fn persist(&self) -> Result<(), CommandFailure> {
        self.repo.save(&self.store.snapshot()).await?;
        Ok(())
    }

    /// Year and semester to query: the selection's term, else the configured default.
    pub fn term(&self) -> Option<(u16, u8)> {
        self.store.year_semester_hint().or_else(|| self.config.catalog.default_term())
    }

    pub fn overview(&self) -> ScheduleOverview {
        ScheduleOverview::of(&self.store, &self.config)
    }
}

pub fn open_catalog(config: &AppConfig) -> Result<LocalCatalog, CommandFailure> {
    let catalog = LocalCatalog::load(&config.catalog.path)?;
    Ok(catalog.with_rules(config.grades.clone()))
}

#[derive(Debug, Serialize)]
pub struct CourseRow {
    pub code: String,
    pub serial: String,
    pub name: String,
    pub teacher: String,
    pub credits: String,
    pub time: String,
    pub location: String,
}

impl From<&Course> for CourseRow {
    fn from(course: &Course) -> Self {
        Self {
            code: course.code.clone(),
            serial: course.serial.clone(),
            name: course.name.clone(),
            teacher: course.teacher.clone(),
            credits: course.credits.normalize().to_string(),
            time: course.time_label(),
            location: course.location.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleOverview {
    pub courses: Vec<CourseRow>,
    pub total_credits: String,
    pub credit_target: String,
    pub over_target: bool,
    pub occupied_slots: usize,
    pub empty_slots: usize,
}

impl ScheduleOverview {
    pub fn of(store: &SelectionStore, config: &AppConfig) -> Self {
        let status = store.credit_status(config.schedule.credit_target);
        Self {
            courses: store.courses().iter().map(CourseRow::from).collect(),
            total_credits: status.total.normalize().to_string(),
            credit_target: status.target.normalize().to_string(),
            over_target: status.over_target,
            occupied_slots: store.grid().occupied_count(),
            empty_slots: store.empty_slots().len(),
        }
    }
}
