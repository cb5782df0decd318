//! Helpers to navigate EOS JSON outputs.

use crate::utils::error::{AntaError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Walks `data` following `key` split on `separator`.
///
/// Returns `None` as soon as a segment is missing or the current value is
/// not an object.
pub fn get_value<'a>(data: &'a Value, key: &str, separator: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in key.split(separator) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// First object in `list` whose `key` equals `value`.
pub fn get_item<'a>(list: &'a Value, key: &str, value: &Value) -> Option<&'a Value> {
    list.as_array()?
        .iter()
        .find(|item| item.get(key) == Some(value))
}

/// Lines describing every expected entry whose actual value differs.
pub fn get_failed_logs(expected: &[(&str, Value)], actual: &[(&str, Option<Value>)]) -> String {
    let mut failed_logs = String::new();
    for (key, expected_value) in expected {
        let actual_value = actual
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.clone());
        match actual_value {
            Some(value) if &value == expected_value => {}
            Some(value) => failed_logs.push_str(&format!(
                "\nExpected `{}` as the {}, but found `{}` instead.",
                display(expected_value),
                key,
                display(&value)
            )),
            None => failed_logs.push_str(&format!(
                "\nExpected `{}` as the {}, but found `Not Found` instead.",
                display(expected_value),
                key
            )),
        }
    }
    failed_logs
}

/// Renders a JSON value for humans: strings without quotes.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders a value the way EOS operators read lists and tables in failure
/// messages: `['Ethernet1', 'Ethernet2']`, `{'Ethernet1': {'inErrors': 42}}`.
pub fn repr<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .map(|value| repr_value(&value))
        .unwrap_or_default()
}

fn repr_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s),
        Value::Array(items) => format!("[{}]", items.iter().map(repr_value).collect::<Vec<_>>().join(", ")),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("'{}': {}", k, repr_value(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Accessors on command outputs that turn a missing key or a wrong type into
/// an `UnexpectedOutput` error, so tests can use `?`.
pub trait JsonExt {
    fn field(&self, key: &str) -> Result<&Value>;
    fn object(&self) -> Result<&Map<String, Value>>;
    fn array(&self) -> Result<&Vec<Value>>;
    fn text(&self) -> Result<&str>;
    fn int(&self) -> Result<i64>;
    fn float(&self) -> Result<f64>;
    fn flag(&self) -> Result<bool>;
}

impl JsonExt for Value {
    fn field(&self, key: &str) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| AntaError::unexpected(format!("missing key '{}'", key)))
    }

    fn object(&self) -> Result<&Map<String, Value>> {
        self.as_object()
            .ok_or_else(|| AntaError::unexpected(format!("expected an object, got {}", self)))
    }

    fn array(&self) -> Result<&Vec<Value>> {
        self.as_array()
            .ok_or_else(|| AntaError::unexpected(format!("expected a list, got {}", self)))
    }

    fn text(&self) -> Result<&str> {
        self.as_str()
            .ok_or_else(|| AntaError::unexpected(format!("expected a string, got {}", self)))
    }

    fn int(&self) -> Result<i64> {
        self.as_i64()
            .or_else(|| self.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| AntaError::unexpected(format!("expected an integer, got {}", self)))
    }

    fn float(&self) -> Result<f64> {
        self.as_f64()
            .ok_or_else(|| AntaError::unexpected(format!("expected a number, got {}", self)))
    }

    fn flag(&self) -> Result<bool> {
        self.as_bool()
            .ok_or_else(|| AntaError::unexpected(format!("expected a boolean, got {}", self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_value_nested() {
        let data = json!({"interfaces": {"Ethernet1": {"mtu": 1500}}});
        assert_eq!(get_value(&data, "interfaces.Ethernet1.mtu", "."), Some(&json!(1500)));
        assert_eq!(get_value(&data, "interfaces.Ethernet2.mtu", "."), None);
    }

    #[test]
    fn test_get_value_custom_separator() {
        let data = json!({"interfaceDescriptions": {"Ethernet1.100": {"interfaceStatus": "up"}}});
        let value = get_value(&data, "interfaceDescriptions..Ethernet1.100", "..");
        assert_eq!(value, Some(&json!({"interfaceStatus": "up"})));
    }

    #[test]
    fn test_get_item() {
        let list = json!([{"sequenceNumber": 10, "text": "permit ip any any"}, {"sequenceNumber": 20}]);
        let item = get_item(&list, "sequenceNumber", &json!(10)).unwrap();
        assert_eq!(item["text"], "permit ip any any");
        assert!(get_item(&list, "sequenceNumber", &json!(30)).is_none());
        assert!(get_item(&json!({}), "sequenceNumber", &json!(10)).is_none());
    }

    #[test]
    fn test_get_failed_logs() {
        let expected = [("subject.commonName", json!("eapi.arista.com")), ("publicKey.size", json!(256))];
        let actual = [("subject.commonName", Some(json!("default"))), ("publicKey.size", None)];
        let logs = get_failed_logs(&expected, &actual);
        assert_eq!(
            logs,
            "\nExpected `eapi.arista.com` as the subject.commonName, but found `default` instead.\
             \nExpected `256` as the publicKey.size, but found `Not Found` instead."
        );
    }

    #[test]
    fn test_repr() {
        assert_eq!(repr(&vec!["Ethernet1", "Ethernet2"]), "['Ethernet1', 'Ethernet2']");
        assert_eq!(repr(&vec![10, 20]), "[10, 20]");
        assert_eq!(
            repr(&json!({"Ethernet6": {"inErrors": 42, "up": true, "desc": null}})),
            "{'Ethernet6': {'desc': None, 'inErrors': 42, 'up': True}}"
        );
        assert_eq!(repr(&Vec::<String>::new()), "[]");
    }

    #[test]
    fn test_json_ext_errors() {
        let data = json!({"mode": "disabled", "count": 2.0});
        assert_eq!(data.field("mode").unwrap().text().unwrap(), "disabled");
        assert_eq!(data.field("count").unwrap().int().unwrap(), 2);
        assert!(matches!(data.field("missing"), Err(AntaError::UnexpectedOutput { .. })));
        assert!(data.field("mode").unwrap().int().is_err());
    }
}
