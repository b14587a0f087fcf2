//! Application error type.
//!
//! Every failure carries the process exit code it maps to:
//!
//! - `2`: input errors (missing/malformed files, shape mismatches, bad configuration)
//! - `3`: not enough data for the requested estimate
//! - `4`: numeric failures (solver non-convergence, degenerate rows)

/// Exit code for input and configuration errors.
pub const EXIT_INPUT: u8 = 2;
/// Exit code for estimates that lack enough data.
pub const EXIT_INSUFFICIENT: u8 = 3;
/// Exit code for numeric failures.
pub const EXIT_NUMERIC: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn insufficient(message: impl Into<String>) -> Self {
        Self::new(EXIT_INSUFFICIENT, message)
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        Self::new(EXIT_NUMERIC, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_input(&self) -> bool {
        self.exit_code == EXIT_INPUT
    }

    pub fn is_numeric(&self) -> bool {
        self.exit_code == EXIT_NUMERIC
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
