use serde::de::DeserializeOwned;
use std::fs;

use crate::error::{Error, Result};
use crate::loader::config::ArrangementConfig;

/// Parses a JSON file into a given type `T`.
///
/// Errors are converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path).map_err(Error::IoError)?;

    let parsed_data: T = serde_json::from_str(&data).map_err(Error::DeserializationError)?;

    Ok(parsed_data)
}

/// Reads and validates an `ArrangementConfig`.
pub fn load_config(file_path: &str) -> Result<ArrangementConfig> {
    let config: ArrangementConfig = parse_json_file(file_path)?;
    config.validate()?;

    log::info!("Loaded arrangement configuration from '{}' (portal: {}).", file_path, config.base_url());
    Ok(config)
}
