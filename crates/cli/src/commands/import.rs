use clap::ValueEnum;
use serde_json::json;

use courseplan_core::catalog::{CatalogBrowser, ClassSelection};
use courseplan_core::config::{AppConfig, LoadOptions};
use courseplan_core::flows::import_courses;
use courseplan_core::sources::{ConflictResolver, Decision, FixedResolver};

use super::session::{open_catalog, Session};
use super::{execute, CommandFailure, CommandResult, CommandSuccess};
use crate::prompt::PromptResolver;

/// How slot conflicts are decided while importing a class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ConflictPolicy {
    /// Ask on the terminal for each conflict
    #[default]
    Prompt,
    /// Keep the already selected course
    Keep,
    /// Replace the already selected course
    Replace,
}

pub fn run(options: &LoadOptions, selection: ClassSelection, policy: ConflictPolicy) -> CommandResult {
    execute("import", options, |config| async move {
        match policy {
            ConflictPolicy::Prompt => import_class(config, selection, &PromptResolver::stdin()).await,
            ConflictPolicy::Keep => import_class(config, selection, &FixedResolver(Decision::Keep)).await,
            ConflictPolicy::Replace => {
                import_class(config, selection, &FixedResolver(Decision::Replace)).await
            }
        }
    })
}

async fn import_class<R>(
    config: AppConfig,
    selection: ClassSelection,
    resolver: &R,
) -> Result<CommandSuccess, CommandFailure>
where
    R: ConflictResolver + ?Sized,
{
    let catalog = open_catalog(&config)?;
    let mut session = Session::open(config).await?;
    let (year, semester) = session.term().unzip();

    let courses = catalog.courses(year, semester);
    let targets = CatalogBrowser::new(&courses, &session.config.grades).class_courses(&selection);
    if targets.is_empty() {
        return Err(CommandFailure::domain(
            "class_not_found",
            format!(
                "no courses for {} {} {} {}",
                selection.department, selection.grade, selection.system, selection.class_name
            ),
        ));
    }

    let summary = import_courses(&mut session.store, targets, resolver).await?;
    session.persist().await?;

    Ok(CommandSuccess::with_data(
        format!("imported {} course(s), skipped {}", summary.added, summary.skipped),
        json!({ "summary": summary, "schedule": session.overview() }),
    ))
}
