//! Options loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::OptionsFile;
use crate::config::validation::{validate_options, ValidationError};

/// Error type for options loading.
#[derive(Debug)]
pub enum OptionsError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for OptionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionsError::Io(e) => write!(f, "IO error: {}", e),
            OptionsError::Parse(e) => write!(f, "Parse error: {}", e),
            OptionsError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for OptionsError {}

/// Parse and validate options from a TOML document.
pub fn parse_options(content: &str) -> Result<OptionsFile, OptionsError> {
    let options: OptionsFile = toml::from_str(content).map_err(OptionsError::Parse)?;
    validate_options(&options).map_err(OptionsError::Validation)?;
    Ok(options)
}

/// Load and validate options from a TOML file.
pub fn load_options(path: &Path) -> Result<OptionsFile, OptionsError> {
    let content = fs::read_to_string(path).map_err(OptionsError::Io)?;
    let options = parse_options(&content)?;
    tracing::debug!(path = %path.display(), "Loaded config store options");
    Ok(options)
}
