use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::grade::GradeRules;
use crate::schedule::grid::DEFAULT_MAX_PERIOD;

pub const MAX_PERIOD_LIMIT: u8 = 16;

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub schedule: ScheduleConfig,
    pub grades: GradeRules,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct CatalogConfig {
    pub path: PathBuf,
    pub default_year: Option<u16>,
    pub default_semester: Option<u8>,
}

impl CatalogConfig {
    pub fn default_term(&self) -> Option<(u16, u8)> {
        self.default_year.zip(self.default_semester)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ScheduleConfig {
    pub max_period: u8,
    pub credit_target: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub max_period: Option<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://courseplan.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            catalog: CatalogConfig {
                path: PathBuf::from("data/courses.json"),
                default_year: None,
                default_semester: None,
            },
            schedule: ScheduleConfig {
                max_period: DEFAULT_MAX_PERIOD,
                credit_target: Decimal::from(25),
            },
            grades: GradeRules::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("courseplan.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = path;
            }
            if let Some(default_year) = catalog.default_year {
                self.catalog.default_year = Some(default_year);
            }
            if let Some(default_semester) = catalog.default_semester {
                self.catalog.default_semester = Some(default_semester);
            }
        }

        if let Some(schedule) = patch.schedule {
            if let Some(max_period) = schedule.max_period {
                self.schedule.max_period = max_period;
            }
            if let Some(credit_target) = schedule.credit_target {
                self.schedule.credit_target = credit_target;
            }
        }

        if let Some(grades) = patch.grades {
            if let Some(markers) = grades.graduate_markers {
                self.grades.graduate_markers = markers;
            }
            if let Some(markers) = grades.doctoral_markers {
                self.grades.doctoral_markers = markers;
            }
            if let Some(markers) = grades.evening_markers {
                self.grades.evening_markers = markers;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COURSEPLAN_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COURSEPLAN_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("COURSEPLAN_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COURSEPLAN_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("COURSEPLAN_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COURSEPLAN_CATALOG_PATH") {
            self.catalog.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("COURSEPLAN_CATALOG_DEFAULT_YEAR") {
            self.catalog.default_year = Some(parse_env("COURSEPLAN_CATALOG_DEFAULT_YEAR", &value)?);
        }
        if let Some(value) = read_env("COURSEPLAN_CATALOG_DEFAULT_SEMESTER") {
            self.catalog.default_semester =
                Some(parse_env("COURSEPLAN_CATALOG_DEFAULT_SEMESTER", &value)?);
        }

        if let Some(value) = read_env("COURSEPLAN_SCHEDULE_MAX_PERIOD") {
            self.schedule.max_period = parse_env("COURSEPLAN_SCHEDULE_MAX_PERIOD", &value)?;
        }
        if let Some(value) = read_env("COURSEPLAN_SCHEDULE_CREDIT_TARGET") {
            self.schedule.credit_target = parse_env("COURSEPLAN_SCHEDULE_CREDIT_TARGET", &value)?;
        }

        if let Some(value) = read_env("COURSEPLAN_GRADES_GRADUATE_MARKERS") {
            self.grades.graduate_markers = split_list(&value);
        }
        if let Some(value) = read_env("COURSEPLAN_GRADES_DOCTORAL_MARKERS") {
            self.grades.doctoral_markers = split_list(&value);
        }
        if let Some(value) = read_env("COURSEPLAN_GRADES_EVENING_MARKERS") {
            self.grades.evening_markers = split_list(&value);
        }

        let log_level =
            read_env("COURSEPLAN_LOGGING_LEVEL").or_else(|| read_env("COURSEPLAN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COURSEPLAN_LOGGING_FORMAT").or_else(|| read_env("COURSEPLAN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = catalog_path;
        }
        if let Some(max_period) = overrides.max_period {
            self.schedule.max_period = max_period;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_catalog(&self.catalog)?;
        validate_schedule(&self.schedule)?;
        validate_grades(&self.grades)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("courseplan.toml"), PathBuf::from("config/courseplan.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("catalog.path must not be empty".to_string()));
    }

    if let Some(semester) = catalog.default_semester {
        if !(1..=3).contains(&semester) {
            return Err(ConfigError::Validation(
                "catalog.default_semester must be in range 1..=3".to_string(),
            ));
        }
    }

    if catalog.default_year.is_some() != catalog.default_semester.is_some() {
        return Err(ConfigError::Validation(
            "catalog.default_year and catalog.default_semester must be set together".to_string(),
        ));
    }

    Ok(())
}

fn validate_schedule(schedule: &ScheduleConfig) -> Result<(), ConfigError> {
    if schedule.max_period == 0 || schedule.max_period > MAX_PERIOD_LIMIT {
        return Err(ConfigError::Validation(format!(
            "schedule.max_period must be in range 1..={MAX_PERIOD_LIMIT}"
        )));
    }

    if schedule.credit_target <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "schedule.credit_target must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_grades(grades: &GradeRules) -> Result<(), ConfigError> {
    let tables = [
        ("grades.graduate_markers", &grades.graduate_markers),
        ("grades.doctoral_markers", &grades.doctoral_markers),
        ("grades.evening_markers", &grades.evening_markers),
    ];
    for (name, markers) in tables {
        if markers.is_empty() {
            return Err(ConfigError::Validation(format!("{name} must list at least one marker")));
        }
        if markers.iter().any(|marker| marker.trim().is_empty()) {
            return Err(ConfigError::Validation(format!("{name} must not contain blank markers")));
        }
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|marker| !marker.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    catalog: Option<CatalogPatch>,
    schedule: Option<SchedulePatch>,
    grades: Option<GradesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
    default_year: Option<u16>,
    default_semester: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulePatch {
    max_period: Option<u8>,
    credit_target: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct GradesPatch {
    graduate_markers: Option<Vec<String>>,
    doctoral_markers: Option<Vec<String>>,
    evening_markers: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
