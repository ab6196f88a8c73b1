// SPDX-License-Identifier: MIT

//! Carries a process exit code through `?` so `main()` is the only place
//! that calls `std::process::exit`.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn decline() -> Self {
        Self::new(100, "declined")
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<strata_engine::EngineError> for ExitError {
    fn from(e: strata_engine::EngineError) -> Self {
        match e {
            strata_engine::EngineError::DetectDeclined => Self::decline(),
            other => Self::new(1, other.to_string()),
        }
    }
}

impl From<std::io::Error> for ExitError {
    fn from(e: std::io::Error) -> Self {
        Self::new(1, e.to_string())
    }
}

impl From<toml::de::Error> for ExitError {
    fn from(e: toml::de::Error) -> Self {
        Self::new(1, format!("invalid packfile: {e}"))
    }
}

impl From<toml::ser::Error> for ExitError {
    fn from(e: toml::ser::Error) -> Self {
        Self::new(1, e.to_string())
    }
}
