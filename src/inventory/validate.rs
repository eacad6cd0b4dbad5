//! Payload shape rules, applied before any database work.
//!
//! The IPv4 rule is syntactic only: four dot-separated groups of 1-3 digits.
//! Groups are not range-checked, so `999.999.999.999` is accepted.

use super::InventoryError;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Field name -> messages, as returned in `{"errors": ...}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const IP_FORMAT_MESSAGE: &str = "Invalid IP address format. Must be a valid IPv4 address.";
const MISSING_MESSAGE: &str = "Missing data for required field.";
const NOT_STRING_MESSAGE: &str = "Not a valid string.";
const EMPTY_MESSAGE: &str = "Shorter than minimum length 1.";
const NULL_MESSAGE: &str = "Field may not be null.";
const UNKNOWN_MESSAGE: &str = "Unknown field.";
const INVALID_INPUT_MESSAGE: &str = "Invalid input type.";

/// Key for errors about the body as a whole rather than one field.
pub const SCHEMA_KEY: &str = "_schema";

static IPV4_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").expect("valid IPv4 pattern"));

pub fn is_ipv4_syntax(ip: &str) -> bool {
    IPV4_PATTERN.is_match(ip)
}

/// Store/item name rule used by the persistence layer.
pub fn check_name(field: &str, name: &str) -> Result<(), InventoryError> {
    if name.is_empty() {
        return Err(InventoryError::InvalidArgument(format!("{field} required")));
    }
    Ok(())
}

pub fn check_ip(ip: &str) -> Result<(), InventoryError> {
    if !is_ipv4_syntax(ip) {
        return Err(InventoryError::InvalidArgument(IP_FORMAT_MESSAGE.to_string()));
    }
    Ok(())
}

/// `POST /store` body: `{"name": "<non-empty>"}`. Any other key is an error.
pub fn store_payload(body: &Value) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_shape(body, &["name"], &mut errors)?;
    let name = required_string(body, "name", &mut errors);
    match name {
        Some(name) if errors.is_empty() => Ok(name),
        _ => Err(errors),
    }
}

/// `POST /store/{name}/item` body: `{"name": "<non-empty>", "ip": "<dotted quad>"}`.
pub fn item_payload(body: &Value) -> Result<(String, String), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_shape(body, &["name", "ip"], &mut errors)?;
    let name = required_string(body, "name", &mut errors);
    let ip = required_string(body, "ip", &mut errors);
    if let Some(ref ip) = ip {
        if !is_ipv4_syntax(ip) {
            push(&mut errors, "ip", IP_FORMAT_MESSAGE);
        }
    }
    match (name, ip) {
        (Some(name), Some(ip)) if errors.is_empty() => Ok((name, ip)),
        _ => Err(errors),
    }
}

/// Rename body: only the new name matters; absent, blank or non-string is one error.
pub fn rename_payload(body: &Value) -> Option<String> {
    body.get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
}

/// Body must be an object (a bare `null` counts as empty); keys outside
/// `allowed` are recorded as unknown.
fn check_shape(body: &Value, allowed: &[&str], errors: &mut FieldErrors) -> Result<(), FieldErrors> {
    if body.is_null() {
        return Ok(());
    }
    let Some(object) = body.as_object() else {
        push(errors, SCHEMA_KEY, INVALID_INPUT_MESSAGE);
        return Err(std::mem::take(errors));
    };
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            push(errors, key, UNKNOWN_MESSAGE);
        }
    }
    Ok(())
}

fn required_string(body: &Value, field: &str, errors: &mut FieldErrors) -> Option<String> {
    match body.get(field) {
        None => {
            push(errors, field, MISSING_MESSAGE);
            None
        }
        Some(Value::Null) => {
            push(errors, field, NULL_MESSAGE);
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            push(errors, field, EMPTY_MESSAGE);
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            push(errors, field, NOT_STRING_MESSAGE);
            None
        }
    }
}

fn push(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ipv4_pattern_is_syntactic() {
        assert!(is_ipv4_syntax("192.168.10.1"));
        assert!(is_ipv4_syntax("0.0.0.0"));
        assert!(is_ipv4_syntax("999.999.999.999"));
        assert!(!is_ipv4_syntax("1234.1.1.1"));
        assert!(!is_ipv4_syntax("1.1.1"));
        assert!(!is_ipv4_syntax("1.1.1.1.1"));
        assert!(!is_ipv4_syntax("a.b.c.d"));
        assert!(!is_ipv4_syntax(" 1.1.1.1"));
        assert!(!is_ipv4_syntax("1.1.1.1\n"));
        assert!(!is_ipv4_syntax(""));
    }

    #[test]
    fn store_payload_accepts_name() {
        assert_eq!(store_payload(&json!({"name": "Switches"})).unwrap(), "Switches");
    }

    #[test]
    fn store_payload_reports_missing_empty_and_wrong_type() {
        let missing = store_payload(&json!({})).unwrap_err();
        assert_eq!(missing["name"], vec![MISSING_MESSAGE.to_string()]);

        let empty = store_payload(&json!({"name": ""})).unwrap_err();
        assert_eq!(empty["name"], vec![EMPTY_MESSAGE.to_string()]);

        let number = store_payload(&json!({"name": 7})).unwrap_err();
        assert_eq!(number["name"], vec![NOT_STRING_MESSAGE.to_string()]);

        let null = store_payload(&json!({"name": null})).unwrap_err();
        assert_eq!(null["name"], vec![NULL_MESSAGE.to_string()]);

        let not_object = store_payload(&json!(["A"])).unwrap_err();
        assert_eq!(not_object[SCHEMA_KEY], vec![INVALID_INPUT_MESSAGE.to_string()]);
        let bare_null = store_payload(&json!(null)).unwrap_err();
        assert_eq!(bare_null["name"], vec![MISSING_MESSAGE.to_string()]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let errors = store_payload(&json!({"name": "A", "extra": 1})).unwrap_err();
        assert_eq!(errors["extra"], vec![UNKNOWN_MESSAGE.to_string()]);
        assert!(!errors.contains_key("name"));

        let errors =
            item_payload(&json!({"name": "X", "ip": "1.2.3.4", "port": 22})).unwrap_err();
        assert_eq!(errors["port"], vec![UNKNOWN_MESSAGE.to_string()]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn item_payload_collects_every_field_error() {
        let errors = item_payload(&json!({"ip": "nope"})).unwrap_err();
        assert!(errors.contains_key("name"));
        assert_eq!(errors["ip"], vec![IP_FORMAT_MESSAGE.to_string()]);
    }

    #[test]
    fn item_payload_accepts_out_of_range_groups() {
        let (name, ip) = item_payload(&json!({"name": "X", "ip": "999.999.999.999"})).unwrap();
        assert_eq!(name, "X");
        assert_eq!(ip, "999.999.999.999");
    }

    #[test]
    fn rename_payload_requires_non_empty_string() {
        assert_eq!(rename_payload(&json!({"name": "B"})).as_deref(), Some("B"));
        assert!(rename_payload(&json!({"name": ""})).is_none());
        assert!(rename_payload(&json!({"name": 1})).is_none());
        assert!(rename_payload(&json!({})).is_none());
    }

    #[test]
    fn check_helpers() {
        assert!(check_name("name", "A").is_ok());
        assert!(matches!(
            check_name("name", ""),
            Err(InventoryError::InvalidArgument(_))
        ));
        assert!(check_ip("10.0.0.1").is_ok());
        assert!(check_ip("10.0.0").is_err());
    }
}
