use anyhow::Error;
use rostermatch_config::ConfigError;
use rostermatch_core::CoreError;
use std::process::ExitCode;
use thiserror::Error as ThisError;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_NOTHING_TO_DO: u8 = 2;
pub const EXIT_INVALID_INPUT: u8 = 3;

#[derive(Debug, ThisError)]
pub enum CliError {
    #[error("nothing to do: {0}")]
    NothingToDo(String),
}

pub fn nothing_to_do(message: impl Into<String>) -> Error {
    CliError::NothingToDo(message.into()).into()
}

pub fn report_error(err: &Error, verbose: bool) {
    if verbose {
        eprintln!("error: {:#}", err);
    } else {
        eprintln!("error: {}", err);
    }
}

pub fn exit_code_for(err: &Error) -> ExitCode {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return ExitCode::from(match cli_err {
                CliError::NothingToDo(_) => EXIT_NOTHING_TO_DO,
            });
        }
        if let Some(core_err) = cause.downcast_ref::<CoreError>() {
            return ExitCode::from(core_exit_code(core_err));
        }
        if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            return ExitCode::from(config_exit_code(config_err));
        }
    }
    ExitCode::from(EXIT_FAILURE)
}

fn core_exit_code(err: &CoreError) -> u8 {
    match err {
        CoreError::Decode(_) | CoreError::Format { .. } => EXIT_INVALID_INPUT,
        CoreError::Io(_) | CoreError::Csv(_) => EXIT_FAILURE,
    }
}

fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::MissingHomeDir => EXIT_FAILURE,
        ConfigError::InvalidConfigPath(_)
        | ConfigError::MissingConfigFile(_)
        | ConfigError::InvalidDelimiter(_)
        | ConfigError::InvalidPhoneDelimiter(_)
        | ConfigError::UnknownEncoding(_)
        | ConfigError::EmptyEncodings
        | ConfigError::EmptyColumnName(_)
        | ConfigError::EmptyUploadColumns
        | ConfigError::InvalidReportColumns(_)
        | ConfigError::InvalidMinPhoneDigits
        | ConfigError::InvalidMaxAnomalyLogs
        | ConfigError::InvalidFileMode(_)
        | ConfigError::Read { .. }
        | ConfigError::Parse { .. } => EXIT_INVALID_INPUT,
    }
}
