//! Kill-event validation at the telemetry boundary
//!
//! Raw telemetry arrives as arbitrary JSON from the game-log watcher.
//! Validation is deliberately lossy: a malformed event is logged at warn
//! level and dropped, never surfaced to the caller. Malformed telemetry
//! must not block the pipeline or crash the process.

use super::types::KillEvent;
use serde_json::Value;

/// Parse and validate a raw kill-event mapping.
///
/// Returns `Some(KillEvent)` iff all required fields are present and
/// correctly typed:
/// - `guild_id` is an integer
/// - `killer`, `victim`, `weapon`, `server_id` are non-empty strings
/// - `timestamp` is a finite number
/// - `is_suicide` is a boolean
///
/// Each rejection logs the specific failure with the offending payload.
pub fn parse_kill_event(raw: &Value) -> Option<KillEvent> {
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => {
            log::warn!("Invalid kill event: not an object: {}", raw);
            return None;
        }
    };

    const REQUIRED_FIELDS: [&str; 7] = [
        "guild_id",
        "killer",
        "victim",
        "weapon",
        "timestamp",
        "server_id",
        "is_suicide",
    ];
    for field in REQUIRED_FIELDS {
        if obj.get(field).map_or(true, Value::is_null) {
            log::warn!("Invalid kill event: missing required field '{}' in {}", field, raw);
            return None;
        }
    }

    let guild_id = match obj["guild_id"].as_i64() {
        Some(id) => id,
        None => {
            log::warn!("Invalid kill event: guild_id must be an integer in {}", raw);
            return None;
        }
    };

    let mut strings = [""; 4];
    for (slot, key) in strings.iter_mut().zip(["killer", "victim", "weapon", "server_id"]) {
        match obj[key].as_str() {
            Some(s) if !s.is_empty() => *slot = s,
            _ => {
                log::warn!(
                    "Invalid kill event: {} must be a non-empty string in {}",
                    key,
                    raw
                );
                return None;
            }
        }
    }
    let [killer, victim, weapon, server_id] = strings;

    let timestamp = match obj["timestamp"].as_f64() {
        Some(ts) if ts.is_finite() => ts,
        _ => {
            log::warn!("Invalid kill event: timestamp must be a finite number in {}", raw);
            return None;
        }
    };

    let is_suicide = match obj["is_suicide"].as_bool() {
        Some(b) => b,
        None => {
            log::warn!("Invalid kill event: is_suicide must be a boolean in {}", raw);
            return None;
        }
    };

    Some(KillEvent {
        guild_id,
        killer: killer.to_string(),
        victim: victim.to_string(),
        weapon: weapon.to_string(),
        server_id: server_id.to_string(),
        timestamp,
        is_suicide,
    })
}

/// Shape-only check, without building the event.
pub fn validate(raw: &Value) -> bool {
    parse_kill_event(raw).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_raw() -> Value {
        json!({
            "guild_id": 1001,
            "killer": "RaidBoss",
            "victim": "FreshSpawn",
            "weapon": "M4A1",
            "server_id": "emerald-1",
            "timestamp": 1_700_000_000.0,
            "is_suicide": false,
        })
    }

    #[test]
    fn test_valid_event_parses() {
        let event = parse_kill_event(&valid_raw()).unwrap();
        assert_eq!(event.guild_id, 1001);
        assert_eq!(event.killer, "RaidBoss");
        assert_eq!(event.victim, "FreshSpawn");
        assert!(!event.is_suicide);
    }

    #[test]
    fn test_missing_field_rejected() {
        for field in ["guild_id", "killer", "victim", "weapon", "timestamp", "server_id", "is_suicide"] {
            let mut raw = valid_raw();
            raw.as_object_mut().unwrap().remove(field);
            assert!(!validate(&raw), "event missing '{}' should be rejected", field);
        }
    }

    #[test]
    fn test_null_field_rejected() {
        let mut raw = valid_raw();
        raw["killer"] = Value::Null;
        assert!(!validate(&raw));
    }

    #[test]
    fn test_wrong_types_rejected() {
        let mut raw = valid_raw();
        raw["guild_id"] = json!("1001");
        assert!(!validate(&raw));

        let mut raw = valid_raw();
        raw["killer"] = json!(42);
        assert!(!validate(&raw));

        let mut raw = valid_raw();
        raw["timestamp"] = json!("yesterday");
        assert!(!validate(&raw));

        let mut raw = valid_raw();
        raw["is_suicide"] = json!("no");
        assert!(!validate(&raw));
    }

    #[test]
    fn test_empty_string_rejected() {
        let mut raw = valid_raw();
        raw["weapon"] = json!("");
        assert!(!validate(&raw));
    }

    #[test]
    fn test_integer_timestamp_accepted() {
        let mut raw = valid_raw();
        raw["timestamp"] = json!(1_700_000_000);
        assert!(validate(&raw));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(!validate(&json!(["not", "an", "object"])));
        assert!(!validate(&Value::Null));
    }
}
