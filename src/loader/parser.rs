use serde::de::DeserializeOwned;
use std::fs;

use crate::error::Result;

/// Reads a JSON configuration file and deserializes it into `T`.
///
/// An unreadable file becomes `Error::IoError`, malformed or mistyped JSON
/// `Error::DeserializationError`.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path)?;
    log::debug!("Read {} bytes of configuration from '{}'.", data.len(), file_path);

    parse_json_str(&data)
}

/// Same as [`parse_json_file`] for configuration already held in memory.
pub fn parse_json_str<T: DeserializeOwned>(data: &str) -> Result<T> {
    Ok(serde_json::from_str(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::simulation_dto::SimulationDto;
    use crate::error::Error;

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = parse_json_file::<SimulationDto>("does/not/exist.json");
        assert!(matches!(result, Err(Error::IoError(_))));
    }

    #[test]
    fn test_malformed_json_is_a_deserialization_error() {
        let result = parse_json_str::<SimulationDto>(r#"{"datacenters": [{"name": 7}]}"#);
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }
}
