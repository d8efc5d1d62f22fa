use serde::de::DeserializeOwned;

use crate::error::{ContractError, ContractResult};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> ContractResult<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        ContractError::Document(format!("at JSON path {path} → {}", err.into_inner()))
    })
}
