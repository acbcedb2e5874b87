use serde_json::json;

use courseplan_core::catalog::{CatalogBrowser, ClassFilter};
use courseplan_core::config::{AppConfig, LoadOptions};
use courseplan_core::domain::grade::{StudyLevel, StudySystem};
use courseplan_core::sources::CatalogSource;

use super::session::open_catalog;
use super::{execute, CommandFailure, CommandResult, CommandSuccess};

/// Narrowing choices for the option lists; each level unlocks the next.
#[derive(Clone, Debug, Default)]
pub struct CatalogArgs {
    pub year: Option<u16>,
    pub semester: Option<u8>,
    pub college: Option<String>,
    pub department: Option<String>,
    pub system: Option<StudySystem>,
    pub level: Option<StudyLevel>,
    pub grade: Option<String>,
}

pub fn run(options: &LoadOptions, args: CatalogArgs) -> CommandResult {
    execute("catalog", options, |config| list_options(config, args))
}

async fn list_options(config: AppConfig, args: CatalogArgs) -> Result<CommandSuccess, CommandFailure> {
    let catalog = open_catalog(&config)?;
    let (year, semester) = match (args.year, args.semester) {
        (Some(year), Some(semester)) => (Some(year), Some(semester)),
        _ => config.catalog.default_term().unzip(),
    };
    let term = year.zip(semester).or_else(|| catalog.latest_term());

    let courses = catalog.courses(year, semester);
    let browser = CatalogBrowser::new(&courses, &config.grades);

    let Some(college) = args.college else {
        let departments = catalog.fetch_departments(year, semester).await?;
        let colleges = browser.colleges();
        return Ok(CommandSuccess::with_data(
            format!("{} college(s), {} department(s)", colleges.len(), departments.len()),
            json!({
                "term": term,
                "colleges": colleges,
                "departments": departments,
                "systems": browser.systems(),
                "levels": browser.levels(),
            }),
        ));
    };

    let Some(department) = args.department else {
        let departments = browser.departments(&college);
        return Ok(CommandSuccess::with_data(
            format!("{} department(s) in {college}", departments.len()),
            json!({ "term": term, "college": college, "departments": departments }),
        ));
    };

    let filter = ClassFilter { college, department, system: args.system, level: args.level };
    let Some(grade) = args.grade else {
        let grades = browser.grades(&filter);
        return Ok(CommandSuccess::with_data(
            format!("{} grade(s) in {}", grades.len(), filter.department),
            json!({ "term": term, "filter": filter, "grades": grades }),
        ));
    };

    let classes = browser.classes(&filter, &grade);
    Ok(CommandSuccess::with_data(
        format!("{} class(es) in {} grade {grade}", classes.len(), filter.department),
        json!({ "term": term, "filter": filter, "grade": grade, "classes": classes }),
    ))
}
