use serde::de::DeserializeOwned;
use std::fs;

use crate::error::{Error, Result};

/// Parses a JSON file into a given type `T`.
///
/// Errors are converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path).map_err(Error::IoError)?;

    parse_json_str(&data)
}

/// Parses a JSON string into `T`.
pub fn parse_json_str<T: DeserializeOwned>(data: &str) -> Result<T> {
    let parsed_data: T = serde_json::from_str(data).map_err(Error::DeserializationError)?;

    Ok(parsed_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn parses_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{{\"name\": \"sensor1\"}}").unwrap();

        let parsed: Sample = parse_json_file(path.to_str().unwrap()).unwrap();
        assert_eq!(parsed, Sample { name: "sensor1".to_string() });
    }

    #[test]
    fn missing_file_is_io_error() {
        let result: Result<Sample> = parse_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(Error::IoError(_))));
    }

    #[test]
    fn malformed_json_is_deserialization_error() {
        let result: Result<Sample> = parse_json_str("{ name: ");
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }
}
