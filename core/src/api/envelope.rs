use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::error::ApiResult;

/// Pulls `key` out of a JSON response body and deserializes it as `T`.
///
/// A missing key or a value of the wrong shape is a protocol error naming
/// the expected type.
pub fn extract<T: DeserializeOwned>(body: &[u8], key: &str) -> ApiResult<T> {
    let mut value: Value = serde_json::from_slice(body).map_err(|err| {
        ApiError::protocol("Unable to parse API response as JSON").with_cause(err)
    })?;
    let entry = value
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ApiError::protocol(format!("API response is missing `{key}`")))?;
    serde_json::from_value(entry).map_err(|err| {
        ApiError::protocol(format!(
            "Unexpected value for `{key}`, expected {}",
            std::any::type_name::<T>()
        ))
        .with_cause(err)
    })
}
