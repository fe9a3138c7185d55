use std::fmt;
use std::io;

use floppyio_channel::{ChannelError, ErrorCode};

pub const SUCCESS: i32 = 0;

pub type CliResult<T> = Result<T, CliError>;

/// A failure on its way to the process boundary.
///
/// `code` is the stable channel error code; the process exits with its
/// absolute value.
#[derive(Debug)]
pub struct CliError {
    pub code: ErrorCode,
    pub message: String,
}

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn exit_status(&self) -> i32 {
        self.code.exit_status()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code.as_i32())
    }
}

impl std::error::Error for CliError {}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    CliError::new(err.code(), format!("{context}: {err}"))
}

/// Local input (stdin or `--file`) could not be read.
pub fn input_error(context: &str, err: io::Error) -> CliError {
    CliError::new(ErrorCode::InputError, format!("{context}: {err}"))
}

/// Local output (stdout or `--file`) could not be written.
pub fn output_error(context: &str, err: io::Error) -> CliError {
    CliError::new(ErrorCode::IoError, format!("{context}: {err}"))
}
