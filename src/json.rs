//! Conversions to and from `serde_json` values

use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::error::{Error, Result};
use crate::infer::is_safe_integer;
use crate::value::{Object, Value};
use crate::DEFAULT_MAX_DEPTH;

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::array(items.into_iter().map(Value::from)),
            Json::Object(map) => Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v)))),
        }
    }
}

impl TryFrom<&Value> for Json {
    type Error = Error;

    /// JSON-representable values only; undefined object fields are dropped
    fn try_from(value: &Value) -> Result<Json> {
        to_json(value, 0)
    }
}

fn to_json(value: &Value, depth: usize) -> Result<Json> {
    if depth >= DEFAULT_MAX_DEPTH {
        return Err(Error::DepthLimit(DEFAULT_MAX_DEPTH));
    }
    let json = match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Number(n) if is_safe_integer(*n) => Json::Number(Number::from(*n as i64)),
        Value::Number(n) => Number::from_f64(*n)
            .map(Json::Number)
            .ok_or(Error::UnsupportedValue("non-finite number"))?,
        Value::String(s) => Json::String(s.clone()),
        Value::Array(array) => Json::Array(
            array
                .borrow()
                .items
                .iter()
                .map(|item| to_json(item, depth + 1))
                .collect::<Result<_>>()?,
        ),
        Value::Object(object) => object_to_json(&object.borrow(), depth)?,
        Value::Instance(instance) => object_to_json(&instance.borrow().fields, depth)?,
        other => return Err(Error::UnsupportedValue(other.kind_name())),
    };
    Ok(json)
}

fn object_to_json(object: &Object, depth: usize) -> Result<Json> {
    let mut map = JsonMap::with_capacity(object.len());
    for (key, value) in object.iter() {
        if matches!(value, Value::Undefined) {
            continue;
        }
        map.insert(key.to_owned(), to_json(value, depth + 1)?);
    }
    Ok(Json::Object(map))
}
