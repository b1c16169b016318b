use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::api::orchestrator_dto::manifest_dto::ParameterDto;
use crate::error::{Error, Result};

/// A user supplied value for one execution parameter.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(text) => f.write_str(text),
            ParamValue::Integer(number) => write!(f, "{}", number),
        }
    }
}

/// Parameter name -> value, sent as multipart form fields.
pub type ExecutionParams = BTreeMap<String, ParamValue>;

impl ParamValue {
    /// Interprets `raw` according to the declared parameter. Integer parameters must parse
    /// as a 64 bit signed integer; everything else is kept as text.
    pub fn parse_for(parameter: &ParameterDto, raw: &str) -> Result<ParamValue> {
        if parameter.is_integer() {
            return raw
                .trim()
                .parse::<i64>()
                .map(ParamValue::Integer)
                .map_err(|_| Error::ValidationError(format!("Parameter '{}' expects an integer, got '{}'.", parameter.name, raw)));
        }
        Ok(ParamValue::Text(raw.to_string()))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ParamValue::Text(text) if text.trim().is_empty())
    }
}

/// Parses `name=value` pairs against the declared parameters. Names that the manifest does
/// not declare are passed through as text.
pub fn parse_params(declared: &[ParameterDto], pairs: &[(String, String)]) -> Result<ExecutionParams> {
    let mut params = ExecutionParams::new();
    for (name, raw) in pairs {
        let value = match declared.iter().find(|p| &p.name == name) {
            Some(parameter) => ParamValue::parse_for(parameter, raw)?,
            None => ParamValue::Text(raw.clone()),
        };
        params.insert(name.clone(), value);
    }
    Ok(params)
}

/// Checks that every required parameter has a non-blank value.
///
/// # Returns
/// `Error::ValidationError` naming the first missing parameter.
pub fn validate_parameters(declared: &[ParameterDto], values: &ExecutionParams) -> Result<()> {
    for parameter in declared.iter().filter(|p| p.required) {
        match values.get(&parameter.name) {
            Some(value) if !value.is_blank() => {}
            _ => return Err(Error::ValidationError(format!("Parameter '{}' is required.", parameter.name))),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::orchestrator_dto::manifest_dto::SchemaDto;

    fn param(name: &str, required: bool, typ: Option<&str>) -> ParameterDto {
        ParameterDto { name: name.to_string(), required, schema: Some(SchemaDto { typ: typ.map(str::to_string) }) }
    }

    #[test]
    fn integer_parameters_become_numbers() {
        let declared = vec![param("x", true, Some("integer")), param("label", false, Some("string"))];
        let pairs = vec![("x".to_string(), "42".to_string()), ("label".to_string(), "front door".to_string())];

        let params = parse_params(&declared, &pairs).unwrap();
        assert_eq!(params["x"], ParamValue::Integer(42));
        assert_eq!(params["label"], ParamValue::Text("front door".to_string()));
    }

    #[test]
    fn non_integer_values_are_rejected() {
        let declared = vec![param("x", true, Some("integer"))];
        for raw in ["many", "1.5", "NaN", "inf", "-inf", "1e3", "", "9223372036854775808"] {
            let result = parse_params(&declared, &[("x".to_string(), raw.to_string())]);
            assert!(matches!(result, Err(Error::ValidationError(_))), "accepted '{}'", raw);
        }
    }

    #[test]
    fn large_integers_are_sent_unchanged() {
        let declared = vec![param("id", true, Some("integer"))];
        let params = parse_params(&declared, &[("id".to_string(), " 9007199254740993 ".to_string())]).unwrap();

        assert_eq!(params["id"], ParamValue::Integer(9_007_199_254_740_993));
        assert_eq!(params["id"].to_string(), "9007199254740993");
        assert_eq!(serde_json::to_string(&params["id"]).unwrap(), "9007199254740993");
    }

    #[test]
    fn missing_required_parameter_is_named() {
        let declared = vec![param("x", false, None), param("y", true, None)];
        let mut values = ExecutionParams::new();
        values.insert("y".to_string(), ParamValue::Text("  ".to_string()));

        match validate_parameters(&declared, &values) {
            Err(Error::ValidationError(message)) => assert!(message.contains("'y'")),
            other => panic!("expected validation error, got {:?}", other),
        }

        values.insert("y".to_string(), ParamValue::Integer(0));
        assert!(validate_parameters(&declared, &values).is_ok());
    }
}
