use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use courseplan_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use toml::Value;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
    overridden: bool,
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec![
        "effective config (source precedence: flag > env > file > default):".to_string(),
    ];
    for field in fields(&config, &options.overrides) {
        let source = field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key_path, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig, overrides: &ConfigOverrides) -> Vec<Field> {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "<unset>".to_string());
    vec![
        Field {
            key_path: "database.url",
            env_keys: &["COURSEPLAN_DATABASE_URL"],
            value: config.database.url.clone(),
            overridden: overrides.database_url.is_some(),
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["COURSEPLAN_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
            overridden: false,
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["COURSEPLAN_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
            overridden: false,
        },
        Field {
            key_path: "catalog.path",
            env_keys: &["COURSEPLAN_CATALOG_PATH"],
            value: config.catalog.path.display().to_string(),
            overridden: overrides.catalog_path.is_some(),
        },
        Field {
            key_path: "catalog.default_year",
            env_keys: &["COURSEPLAN_CATALOG_DEFAULT_YEAR"],
            value: optional(config.catalog.default_year.map(|year| year.to_string())),
            overridden: false,
        },
        Field {
            key_path: "catalog.default_semester",
            env_keys: &["COURSEPLAN_CATALOG_DEFAULT_SEMESTER"],
            value: optional(config.catalog.default_semester.map(|semester| semester.to_string())),
            overridden: false,
        },
        Field {
            key_path: "schedule.max_period",
            env_keys: &["COURSEPLAN_SCHEDULE_MAX_PERIOD"],
            value: config.schedule.max_period.to_string(),
            overridden: overrides.max_period.is_some(),
        },
        Field {
            key_path: "schedule.credit_target",
            env_keys: &["COURSEPLAN_SCHEDULE_CREDIT_TARGET"],
            value: config.schedule.credit_target.to_string(),
            overridden: false,
        },
        Field {
            key_path: "grades.graduate_markers",
            env_keys: &["COURSEPLAN_GRADES_GRADUATE_MARKERS"],
            value: config.grades.graduate_markers.join(","),
            overridden: false,
        },
        Field {
            key_path: "grades.doctoral_markers",
            env_keys: &["COURSEPLAN_GRADES_DOCTORAL_MARKERS"],
            value: config.grades.doctoral_markers.join(","),
            overridden: false,
        },
        Field {
            key_path: "grades.evening_markers",
            env_keys: &["COURSEPLAN_GRADES_EVENING_MARKERS"],
            value: config.grades.evening_markers.join(","),
            overridden: false,
        },
        Field {
            key_path: "logging.level",
            env_keys: &["COURSEPLAN_LOGGING_LEVEL", "COURSEPLAN_LOG_LEVEL"],
            value: config.logging.level.clone(),
            overridden: overrides.log_level.is_some(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["COURSEPLAN_LOGGING_FORMAT", "COURSEPLAN_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
            overridden: false,
        },
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("courseplan.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/courseplan.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.overridden {
        return "flag".to_string();
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_key_paths_resolve() {
        let doc: toml::Value = "[schedule]\nmax_period = 14\n".parse().expect("toml");
        assert!(contains_path(&doc, "schedule.max_period"));
        assert!(!contains_path(&doc, "schedule.credit_target"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
