//! Options validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: OptionsFile → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::schema::OptionsFile;

/// One rejected option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_options(options: &OptionsFile) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let query = &options.query;

    if !query.stale_time_ms.is_valid() {
        errors.push(ValidationError::new("query.stale_time_ms", "expected milliseconds or \"never\""));
    }
    if !query.gc_time_ms.is_valid() {
        errors.push(ValidationError::new("query.gc_time_ms", "expected milliseconds or \"never\""));
    }
    if query.refetch_interval_ms == Some(0) {
        errors.push(ValidationError::new("query.refetch_interval_ms", "must be greater than 0"));
    }
    if !query.retry.is_valid() {
        errors.push(ValidationError::new(
            "query.retry",
            "expected a count, a boolean, \"never\" or \"always\"",
        ));
    }
    if query.retry_delay_ms.is_none() {
        if query.retry_base_delay_ms == 0 {
            errors.push(ValidationError::new("query.retry_base_delay_ms", "must be greater than 0"));
        }
        if query.retry_base_delay_ms > query.retry_max_delay_ms {
            errors.push(ValidationError::new(
                "query.retry_max_delay_ms",
                "must not be less than retry_base_delay_ms",
            ));
        }
    }

    let persist = &options.persist;
    if persist.max_age_ms == Some(0) {
        errors.push(ValidationError::new("persist.max_age_ms", "must be greater than 0"));
    }
    if !persist.enabled && persist.directory.is_some() {
        errors.push(ValidationError::new("persist.directory", "set while persistence is disabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
