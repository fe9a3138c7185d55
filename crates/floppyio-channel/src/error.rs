use std::fmt;

use floppyio_frame::FrameError;
use floppyio_store::StoreError;

use crate::sync::WaitError;

/// Stable numeric error codes shared by the library, the C ABI and the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError = 0,
    IoError = -1,
    Timeout = -2,
    CreateError = -3,
    NotReady = -4,
    InputError = -5,
    Aborted = -6,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Process exit status for this code (its absolute value).
    pub fn exit_status(self) -> i32 {
        self.as_i32().abs()
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::NoError),
            -1 => Some(Self::IoError),
            -2 => Some(Self::Timeout),
            -3 => Some(Self::CreateError),
            -4 => Some(Self::NotReady),
            -5 => Some(Self::InputError),
            -6 => Some(Self::Aborted),
            _ => None,
        }
    }

    /// Code of an operation result, `NoError` on success.
    pub fn of<T>(result: &Result<T>) -> ErrorCode {
        match result {
            Ok(_) => ErrorCode::NoError,
            Err(err) => err.code(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NoError => "no error",
            Self::IoError => "I/O error",
            Self::Timeout => "timeout",
            Self::CreateError => "create error",
            Self::NotReady => "not ready",
            Self::InputError => "input error",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i32())
    }
}

/// A channel failure: a code plus the history of messages that led to it.
///
/// Chaining keeps every earlier message and adopts the newest code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .messages.join("; "))]
pub struct ChannelError {
    code: ErrorCode,
    messages: Vec<String>,
}

impl ChannelError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            messages: vec![message.into()],
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IoError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn create(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CreateError, message)
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotReady, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InputError, message)
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Aborted, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The most recent message.
    pub fn message(&self) -> &str {
        self.messages.last().map(String::as_str).unwrap_or_default()
    }

    /// All messages, oldest first.
    pub fn history(&self) -> &[String] {
        &self.messages
    }

    /// Append a later failure to this one.
    pub fn chain(&mut self, later: ChannelError) {
        self.code = later.code;
        self.messages.extend(later.messages);
    }
}

impl From<StoreError> for ChannelError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Open { .. } => Self::create(err.to_string()),
            other => Self::io(other.to_string()),
        }
    }
}

impl From<FrameError> for ChannelError {
    fn from(err: FrameError) -> Self {
        Self::create(err.to_string())
    }
}

impl From<WaitError> for ChannelError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::TimedOut { .. } | WaitError::Cancelled => Self::timeout(err.to_string()),
            WaitError::Store(store) => store.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
