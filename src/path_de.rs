use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode a request document with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        anyhow!("at JSON path {path} → {}", err.into_inner())
    })
}

/// Same, for documents produced by a jq pre-filter.
pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        anyhow!("at JSON path {path} → {}", err.into_inner())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::request::ChainRequest;

    #[test]
    fn errors_name_the_failing_path() {
        let err = from_value_with_path::<ChainRequest>(json!({
            "expr": { "kind": "literal", "value": 1 },
            "config": { "max_depth": "deep" }
        })).unwrap_err();
        assert!(err.to_string().contains("config.max_depth"), "{err}");

        let ok = from_str_with_path::<ChainRequest>(r#"{ "expr": { "kind": "opaque" } }"#);
        assert!(ok.is_ok());
    }
}
