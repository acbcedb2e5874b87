use serde::Serialize;
use serde_json::json;

use courseplan_core::config::{AppConfig, LoadOptions};
use courseplan_core::history::{fill_ratio, search_history, DifficultyTier, HistoryGroup, PopularityTier};

use super::session::open_catalog;
use super::{execute, CommandFailure, CommandResult, CommandSuccess};

#[derive(Debug, Serialize)]
struct OfferingRow {
    year: Option<u16>,
    semester: Option<u8>,
    code: String,
    serial: String,
    capacity: Option<u32>,
    registered: Option<u32>,
    enrolled: Option<u32>,
    fill_ratio: Option<f64>,
}

#[derive(Debug, Serialize)]
struct GroupRow {
    name: String,
    teacher: String,
    department: String,
    selection_rate: Option<f64>,
    saturation: Option<f64>,
    difficulty: DifficultyTier,
    popularity: PopularityTier,
    offerings: Vec<OfferingRow>,
}

impl From<&HistoryGroup> for GroupRow {
    fn from(group: &HistoryGroup) -> Self {
        let has_data = group.stats.has_data();
        Self {
            name: group.name.clone(),
            teacher: group.teacher.clone(),
            department: group.department.clone(),
            selection_rate: has_data.then_some(group.stats.selection_rate),
            saturation: has_data.then_some(group.stats.saturation),
            difficulty: group.difficulty(),
            popularity: group.popularity(),
            offerings: group
                .chronological()
                .into_iter()
                .rev()
                .map(|offering| OfferingRow {
                    year: offering.year,
                    semester: offering.semester,
                    code: offering.code.clone(),
                    serial: offering.serial.clone(),
                    capacity: offering.capacity,
                    registered: offering.registered,
                    enrolled: offering.enrolled,
                    fill_ratio: fill_ratio(offering),
                })
                .collect(),
        }
    }
}

pub fn run(options: &LoadOptions, query: &str) -> CommandResult {
    let query = query.to_string();
    execute("history", options, |config| history(config, query))
}

async fn history(config: AppConfig, query: String) -> Result<CommandSuccess, CommandFailure> {
    let catalog = open_catalog(&config)?;
    let groups = search_history(&catalog, &query).await?;
    let rows: Vec<GroupRow> = groups.iter().map(GroupRow::from).collect();

    Ok(CommandSuccess::with_data(
        format!("{} course group(s) matching `{}`", rows.len(), query.trim()),
        json!({ "query": query.trim(), "groups": rows }),
    ))
}
