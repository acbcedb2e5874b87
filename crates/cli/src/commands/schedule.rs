use serde::Serialize;
use serde_json::json;

use courseplan_core::catalog::normalize_all;
use courseplan_core::config::{AppConfig, LoadOptions};
use courseplan_core::domain::course::Weekday;
use courseplan_core::schedule::AddOutcome;
use courseplan_core::sources::CatalogSource;

use super::session::{open_catalog, CourseRow, Session};
use super::{execute, CommandFailure, CommandResult, CommandSuccess};

pub fn show(options: &LoadOptions) -> CommandResult {
    execute("show", options, show_selection)
}

async fn show_selection(config: AppConfig) -> Result<CommandSuccess, CommandFailure> {
    let session = Session::open(config).await?;
    let overview = session.overview();
    let message = format!(
        "{} course(s) selected, {} credit(s)",
        overview.courses.len(),
        overview.total_credits
    );
    Ok(CommandSuccess::with_data(message, overview))
}

pub fn add(options: &LoadOptions, code: &str, serial: &str) -> CommandResult {
    let (code, serial) = (code.trim().to_string(), serial.trim().to_string());
    execute("add", options, |config| add_course(config, code, serial))
}

async fn add_course(
    config: AppConfig,
    code: String,
    serial: String,
) -> Result<CommandSuccess, CommandFailure> {
    let catalog = open_catalog(&config)?;
    let mut session = Session::open(config).await?;
    let (year, semester) = session.term().unzip();

    let records = catalog.fetch_all_courses(year, semester).await?;
    let course = normalize_all(&records)
        .into_iter()
        .find(|course| course.has_key(&code, &serial))
        .ok_or_else(|| {
            CommandFailure::domain(
                "course_not_found",
                format!("no course `{code}-{serial}` in the catalog term"),
            )
        })?;

    let row = CourseRow::from(&course);
    match session.store.add(course) {
        AddOutcome::Added => {
            session.persist().await?;
            Ok(CommandSuccess::with_data(
                format!("added {code}-{serial}"),
                json!({ "course": row, "schedule": session.overview() }),
            ))
        }
        AddOutcome::AlreadySelected => {
            Ok(CommandSuccess::with_data(format!("{code}-{serial} is already selected"), row))
        }
        AddOutcome::Conflict { existing } => Err(CommandFailure::domain(
            "schedule_conflict",
            format!(
                "{code}-{serial} conflicts with {}-{} ({})",
                existing.code,
                existing.serial,
                existing.time_label()
            ),
        )
        .with_data(json!({ "course": row, "existing": CourseRow::from(existing.as_ref()) }))),
    }
}

pub fn remove(options: &LoadOptions, code: &str, serial: &str) -> CommandResult {
    let (code, serial) = (code.trim().to_string(), serial.trim().to_string());
    execute("remove", options, |config| remove_course(config, code, serial))
}

async fn remove_course(
    config: AppConfig,
    code: String,
    serial: String,
) -> Result<CommandSuccess, CommandFailure> {
    let mut session = Session::open(config).await?;
    let removed = session.store.remove(&code, &serial);
    if !removed {
        return Ok(CommandSuccess::with_data(
            format!("{code}-{serial} was not selected"),
            json!({ "removed": false }),
        ));
    }
    session.persist().await?;
    Ok(CommandSuccess::with_data(format!("removed {code}-{serial}"), json!({ "removed": true })))
}

pub fn clear(options: &LoadOptions) -> CommandResult {
    execute("clear", options, clear_selection)
}

async fn clear_selection(config: AppConfig) -> Result<CommandSuccess, CommandFailure> {
    let mut session = Session::open(config).await?;
    let cleared = session.store.len();
    session.store.clear();
    session.persist().await?;
    Ok(CommandSuccess::with_data(format!("cleared {cleared} course(s)"), json!({ "cleared": cleared })))
}

#[derive(Debug, Serialize)]
struct DaySlots {
    day: Weekday,
    label: &'static str,
    periods: Vec<u8>,
}

pub fn empty_slots(options: &LoadOptions) -> CommandResult {
    execute("empty-slots", options, list_empty_slots)
}

async fn list_empty_slots(config: AppConfig) -> Result<CommandSuccess, CommandFailure> {
    let session = Session::open(config).await?;
    let slots = session.store.empty_slots();

    let mut days: Vec<DaySlots> = Vec::new();
    for slot in &slots {
        match days.last_mut() {
            Some(current) if current.day == slot.day => current.periods.push(slot.period),
            _ => days.push(DaySlots { day: slot.day, label: slot.day.label(), periods: vec![slot.period] }),
        }
    }

    Ok(CommandSuccess::with_data(
        format!("{} empty slot(s)", slots.len()),
        json!({ "count": slots.len(), "days": days }),
    ))
}
