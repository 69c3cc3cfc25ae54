//! Decoding of the host-supplied `meet_sdk` launch parameter
//!
//! The parameter is base64 of a JSON array. Index 3 holds the cloud project
//! number, as a string or a number.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use ticker_util::CloudProjectNumber;

use crate::{HostError, HostResult};

const PROJECT_NUMBER_INDEX: usize = 3;

/// Extract the cloud project number from a `meet_sdk` launch parameter
pub fn decode_cloud_project(param: &str) -> HostResult<CloudProjectNumber> {
    let bytes = STANDARD
        .decode(param.trim())
        .map_err(|e| HostError::Decode(format!("meet_sdk is not base64: {}", e)))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| HostError::Decode(format!("meet_sdk is not JSON: {}", e)))?;

    let number = match value.get(PROJECT_NUMBER_INDEX) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(HostError::Decode(
                "Could not determine cloud project number from Meet SDK".into(),
            ));
        }
    };

    Ok(CloudProjectNumber::new(number))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        STANDARD.encode(json)
    }

    #[test]
    fn string_project_number() {
        let param = encode(r#"["a","b","c","123456789012"]"#);
        assert_eq!(
            decode_cloud_project(&param).unwrap().as_str(),
            "123456789012"
        );
    }

    #[test]
    fn numeric_project_number() {
        let param = encode(r#"[null, 1, "x", 98765, "extra"]"#);
        assert_eq!(decode_cloud_project(&param).unwrap().as_str(), "98765");
    }

    #[test]
    fn short_array_is_rejected() {
        let param = encode(r#"["a","b"]"#);
        assert!(matches!(
            decode_cloud_project(&param),
            Err(HostError::Decode(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_cloud_project("!!!not-base64!!!").is_err());
        assert!(decode_cloud_project(&encode("not json")).is_err());
        assert!(decode_cloud_project(&encode(r#"{"3":"x"}"#)).is_err());
    }
}
