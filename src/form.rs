use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;
use url::form_urlencoded;

use crate::{ApiError, Result};

/// Content type of bodies produced by [`encode_form`].
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Flattens `content` into a lower-cased, single-level `key -> value` map.
///
/// `content` must serialize to a JSON object whose values are scalars.
/// Strings are lower-cased along with keys, numbers and booleans keep their
/// JSON spelling, and `null` fields are omitted. Nested objects and arrays are
/// rejected instead of being silently truncated.
pub fn flatten_form<T: Serialize + ?Sized>(content: &T) -> Result<BTreeMap<String, String>> {
    let value = serde_json::to_value(content)
        .map_err(|err| ApiError::Validation(format!("form content is not serializable: {err}")))?;
    let JsonValue::Object(object) = value else {
        return Err(ApiError::Validation(format!(
            "form content must be an object, got {}",
            json_type(&value)
        )));
    };

    let mut fields = BTreeMap::new();
    for (key, value) in object {
        let key = key.to_lowercase();
        let value = match value {
            JsonValue::Null => continue,
            JsonValue::String(text) => text.to_lowercase(),
            JsonValue::Bool(flag) => flag.to_string(),
            JsonValue::Number(number) => number.to_string(),
            nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
                return Err(ApiError::Validation(format!(
                    "form field '{key}' is a nested {}; only flat content can be form-encoded",
                    json_type(&nested)
                )));
            }
        };
        if fields.insert(key.clone(), value).is_some() {
            return Err(ApiError::Validation(format!(
                "form field '{key}' appears more than once after case folding"
            )));
        }
    }
    Ok(fields)
}

/// Encodes `content` as an `application/x-www-form-urlencoded` body.
pub fn encode_form<T: Serialize + ?Sized>(content: &T) -> Result<String> {
    let fields = flatten_form(content)?;
    Ok(form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&fields)
        .finish())
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
