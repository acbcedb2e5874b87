pub mod commands;
pub mod logging;
pub mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use commands::catalog::CatalogArgs;
use commands::import::ConflictPolicy;
use commands::recommend::RecommendArgs;
use courseplan_core::catalog::ClassSelection;
use courseplan_core::config::{ConfigOverrides, LoadOptions};
use courseplan_core::domain::grade::{StudyLevel, StudySystem};

#[derive(Debug, Parser)]
#[command(
    name = "courseplan",
    about = "Course planning CLI",
    long_about = "Build a weekly timetable from a course catalog: select and import courses, resolve slot conflicts, get recommendations and inspect enrollment history.",
    after_help = "Examples:\n  courseplan catalog --college 管理學院\n  courseplan add 1101 01\n  courseplan recommend --category 核心通識 --days 1,3,5\n  courseplan history 微積分"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Config file path (default: courseplan.toml or config/courseplan.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override catalog.path")]
    catalog: Option<PathBuf>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override schedule.max_period")]
    max_period: Option<u8>,
}

impl GlobalArgs {
    fn load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                database_url: self.database_url,
                log_level: self.log_level,
                catalog_path: self.catalog,
                max_period: self.max_period,
            },
        }
    }
}

#[derive(Debug, Args)]
struct ClassArgs {
    #[arg(long)]
    college: String,
    #[arg(long)]
    department: String,
    #[arg(long)]
    grade: String,
    #[arg(long, value_parser = parse_system, default_value = "day", help = "day | evening")]
    system: StudySystem,
    #[arg(long, value_parser = parse_level, default_value = "undergraduate", help = "undergraduate | master | doctoral")]
    level: StudyLevel,
    #[arg(long = "class", help = "Class name, e.g. 1年級A班")]
    class_name: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Show selected courses, credit totals and grid usage")]
    Show,
    #[command(about = "Select one course from the catalog by code and serial")]
    Add { code: String, serial: String },
    #[command(about = "Drop a selected course and free its slots")]
    Remove { code: String, serial: String },
    #[command(about = "Drop every selected course")]
    Clear,
    #[command(about = "Import every course of a class, resolving slot conflicts")]
    Import {
        #[command(flatten)]
        class: ClassArgs,
        #[arg(long, value_enum, default_value_t = ConflictPolicy::Prompt)]
        on_conflict: ConflictPolicy,
    },
    #[command(about = "Recommend courses for a category and preferred weekdays")]
    Recommend {
        #[arg(long, default_value = "核心通識")]
        category: String,
        #[arg(long, required = true, num_args = 1.., help = "Weekdays as numbers or names, comma separated")]
        days: Vec<String>,
        #[arg(long, help = "Your own college, excluded for core general education")]
        user_college: Option<String>,
        #[arg(long)]
        college: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        grade: Option<String>,
        #[arg(long, value_parser = parse_level)]
        level: Option<StudyLevel>,
        #[arg(long, help = "Only courses fitting the current empty slots")]
        empty_slots_only: bool,
    },
    #[command(about = "Rank past offerings of a course name or teacher by difficulty")]
    History { query: String },
    #[command(about = "List the free (weekday, period) cells of the timetable")]
    EmptySlots,
    #[command(about = "List catalog options: colleges, departments, grades, classes")]
    Catalog {
        #[arg(long)]
        year: Option<u16>,
        #[arg(long)]
        semester: Option<u8>,
        #[arg(long)]
        college: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long, value_parser = parse_system)]
        system: Option<StudySystem>,
        #[arg(long, value_parser = parse_level)]
        level: Option<StudyLevel>,
        #[arg(long)]
        grade: Option<String>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, catalog readability and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn parse_system(value: &str) -> Result<StudySystem, String> {
    StudySystem::from_label(value).ok_or_else(|| format!("unknown study system `{value}`"))
}

fn parse_level(value: &str) -> Result<StudyLevel, String> {
    StudyLevel::from_label(value).ok_or_else(|| format!("unknown study level `{value}`"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    let result = match cli.command {
        Command::Show => commands::schedule::show(&options),
        Command::Add { code, serial } => commands::schedule::add(&options, &code, &serial),
        Command::Remove { code, serial } => commands::schedule::remove(&options, &code, &serial),
        Command::Clear => commands::schedule::clear(&options),
        Command::Import { class, on_conflict } => {
            let selection = ClassSelection {
                college: class.college,
                department: class.department,
                grade: class.grade,
                system: class.system,
                level: class.level,
                class_name: class.class_name,
            };
            commands::import::run(&options, selection, on_conflict)
        }
        Command::Recommend {
            category,
            days,
            user_college,
            college,
            department,
            grade,
            level,
            empty_slots_only,
        } => commands::recommend::run(
            &options,
            RecommendArgs {
                category,
                days,
                user_college,
                college,
                department,
                grade,
                level,
                empty_slots_only,
            },
        ),
        Command::History { query } => commands::history::run(&options, &query),
        Command::EmptySlots => commands::schedule::empty_slots(&options),
        Command::Catalog { year, semester, college, department, system, level, grade } => {
            commands::catalog::run(
                &options,
                CatalogArgs { year, semester, college, department, system, level, grade },
            )
        }
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(&options, json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
