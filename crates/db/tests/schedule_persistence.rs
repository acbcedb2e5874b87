use courseplan_core::domain::course::{Course, PeriodRange, Weekday};
use courseplan_core::schedule::{AddOutcome, SelectionStore};
use courseplan_db::{connect, load_selection, migrations, ScheduleRepository, SqlScheduleRepository};

type PersistenceTestResult<T = ()> = Result<T, String>;

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

fn course(code: &str, day: Weekday, start: u8, end: u8) -> Course {
    Course {
        code: code.to_string(),
        serial: "01".to_string(),
        name: format!("Course {code}"),
        weekday: Some(day),
        periods: PeriodRange::new(start, end),
        ..Course::default()
    }
}

async fn open(path: &std::path::Path) -> PersistenceTestResult<SqlScheduleRepository> {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = connect(&url).await.map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    Ok(SqlScheduleRepository::new(pool))
}

#[tokio::test]
async fn selection_survives_reopening_the_database() -> PersistenceTestResult {
    let dir = tempfile::tempdir().map_err(|error| error.to_string())?;
    let path = dir.path().join("courseplan.db");

    {
        let repo = open(&path).await?;
        let mut store = SelectionStore::new(12);
        require_eq!(store.add(course("A", Weekday::Monday, 1, 2)), AddOutcome::Added);
        require_eq!(store.add(course("B", Weekday::Wednesday, 3, 4)), AddOutcome::Added);
        repo.save(&store.snapshot()).await.map_err(|error| error.to_string())?;
    }

    let repo = open(&path).await?;
    let restored = load_selection(&repo, 12).await.map_err(|error| error.to_string())?;
    require_eq!(restored.store.len(), 2);
    require_eq!(restored.needs_persist(), false);

    let mut store = restored.store;
    let conflict = store.add(course("C", Weekday::Monday, 2, 3));
    require_eq!(matches!(conflict, AddOutcome::Conflict { .. }), true);
    Ok(())
}

#[tokio::test]
async fn dirty_snapshot_is_cleaned_on_load() -> PersistenceTestResult {
    let dir = tempfile::tempdir().map_err(|error| error.to_string())?;
    let repo = open(&dir.path().join("courseplan.db")).await?;

    let mut store = SelectionStore::new(12);
    store.add(course("A", Weekday::Friday, 5, 6));
    let mut snapshot = store.snapshot();
    snapshot.selection.push(snapshot.selection[0].clone());
    repo.save(&snapshot).await.map_err(|error| error.to_string())?;

    let restored = load_selection(&repo, 12).await.map_err(|error| error.to_string())?;
    require_eq!(restored.duplicates_removed, 1);

    let persisted = repo
        .load()
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "snapshot missing after repair".to_string())?;
    require_eq!(persisted.selection.len(), 1);
    require_eq!(persisted.occupancy.len(), 2);
    Ok(())
}
