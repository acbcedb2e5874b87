pub mod catalog;
pub mod config;
pub mod doctor;
pub mod history;
pub mod import;
pub mod migrate;
pub mod recommend;
pub mod schedule;
pub mod session;

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use courseplan_core::config::{AppConfig, LoadOptions};
use courseplan_core::errors::{ApplicationError, DomainError, InterfaceError};
use courseplan_core::sources::SourceError;
use courseplan_db::RepositoryError;

use crate::logging;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(command: &str, failure: CommandFailure) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(failure.error_class.to_string()),
            message: failure.message,
            data: failure.data,
        };
        Self { exit_code: failure.exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Successful command body: a message plus optional structured data.
#[derive(Debug)]
pub struct CommandSuccess {
    pub message: String,
    pub data: Option<Value>,
}

impl CommandSuccess {
    pub fn message(message: impl Into<String>) -> Self {
        Self { message: message.into(), data: None }
    }

    pub fn with_data(message: impl Into<String>, data: impl Serialize) -> Self {
        Self { message: message.into(), data: serde_json::to_value(data).ok() }
    }
}

#[derive(Debug)]
pub struct CommandFailure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
    pub data: Option<Value>,
}

impl CommandFailure {
    pub fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code, data: None }
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new("config_validation", message, 2)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new("runtime_init", message, 3)
    }

    pub fn db_connectivity(message: impl Into<String>) -> Self {
        Self::new("db_connectivity", message, 4)
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::new("migration", message, 5)
    }

    pub fn domain(error_class: &'static str, message: impl Into<String>) -> Self {
        Self::new(error_class, message, 7)
    }
}

impl From<RepositoryError> for CommandFailure {
    fn from(error: RepositoryError) -> Self {
        Self::new("persistence", error.to_string(), 5)
    }
}

impl From<SourceError> for CommandFailure {
    fn from(error: SourceError) -> Self {
        Self::new("source", error.to_string(), 6)
    }
}

impl From<DomainError> for CommandFailure {
    fn from(error: DomainError) -> Self {
        Self::domain("domain", error.to_string())
    }
}

impl From<ApplicationError> for CommandFailure {
    fn from(error: ApplicationError) -> Self {
        let (error_class, exit_code) = match &error {
            ApplicationError::Domain(_) => ("domain", 7),
            ApplicationError::Persistence(_) => ("persistence", 5),
            ApplicationError::Integration(_) => ("source", 6),
            ApplicationError::Configuration(_) => ("config_validation", 2),
        };
        let interface = InterfaceError::from(error);
        let detail = match &interface {
            InterfaceError::BadRequest { message, .. }
            | InterfaceError::ServiceUnavailable { message, .. }
            | InterfaceError::Internal { message, .. } => message.clone(),
        };
        Self::new(error_class, format!("{} ({detail})", interface.user_message()), exit_code)
    }
}

/// Loads configuration, initializes logging, and reports failures as a
/// `config_validation` envelope.
pub fn load_config(options: &LoadOptions) -> Result<AppConfig, CommandFailure> {
    let config = AppConfig::load(options.clone())
        .map_err(|error| CommandFailure::config(format!("configuration issue: {error}")))?;
    logging::init(&config);
    Ok(config)
}

/// Runs an async command body on a current-thread runtime and wraps the
/// result in the JSON envelope.
pub fn execute<F, Fut>(command: &str, options: &LoadOptions, body: F) -> CommandResult
where
    F: FnOnce(AppConfig) -> Fut,
    Fut: Future<Output = Result<CommandSuccess, CommandFailure>>,
{
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return CommandResult::failure(command, failure),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                CommandFailure::runtime(format!("failed to initialize async runtime: {error}")),
            );
        }
    };

    match runtime.block_on(body(config)) {
        Ok(success) => CommandResult::success(command, success.message, success.data),
        Err(failure) => {
            tracing::warn!(
                event_name = "cli.command_failed",
                command = command,
                error_class = failure.error_class,
                exit_code = failure.exit_code,
                "command failed"
            );
            CommandResult::failure(command, failure)
        }
    }
}
