//! Upgrades older preference documents to the current schema.
//!
//! * v1: the flat key/value map written by the first releases
//!   (`update_interval`, `<family>_state`, `<family>_widget`,
//!   `<family>_color`).
//! * v2: widget records, with thresholds kept in one top-level list.
//! * v3: thresholds and history length live on each widget.

use serde_json::{json, Map, Value};
use tracing::info;

use super::{Preferences, SCHEMA_VERSION};
use crate::{
    core::metrics::MetricFamily,
    error::{Error, Result},
};

/// Parses `value` as any known schema version and upgrades it
pub(crate) fn migrate(value: Value) -> Result<(Preferences, u32)> {
    let Value::Object(map) = value else {
        return Err(Error::invalid_config("preferences must be a JSON object"));
    };
    let found = match map.get("schema_version") {
        None => 1,
        Some(version) => version
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| Error::invalid_config(format!("bad schema_version: {}", version)))?,
    };

    let mut map = map;
    let mut version = found;
    while version < SCHEMA_VERSION {
        map = match version {
            1 => v1_to_v2(&map),
            2 => v2_to_v3(map),
            other => return Err(Error::invalid_config(format!("unknown schema version {}", other))),
        };
        version += 1;
        info!(version, "Migrated preferences");
    }
    if version != SCHEMA_VERSION {
        return Err(Error::invalid_config(format!("unsupported schema version {}", version)));
    }

    let mut preferences: Preferences = serde_json::from_value(Value::Object(map))?;
    preferences.normalize();
    Ok((preferences, found))
}

fn v1_to_v2(legacy: &Map<String, Value>) -> Map<String, Value> {
    let refresh = legacy.get("update_interval").and_then(number).unwrap_or(1.0).round().max(1.0) as u64;
    let widgets: Vec<Value> = MetricFamily::ALL
        .into_iter()
        .map(|family| {
            let key = |suffix: &str| format!("{}_{}", family.as_str(), suffix);
            let mut widget = Map::new();
            widget.insert("family".into(), json!(family));
            if let Some(enabled) = legacy.get(&key("state")).and_then(boolean) {
                widget.insert("enabled".into(), json!(enabled));
            }
            if let Some(style) = legacy.get(&key("widget")).and_then(Value::as_str) {
                widget.insert("visualization".into(), json!(legacy_visualization(style)));
            }
            if let Some(color) = legacy.get(&key("color")).and_then(Value::as_str) {
                widget.insert("accent_color".into(), json!(color));
            }
            Value::Object(widget)
        })
        .collect();

    let mut upgraded = Map::new();
    upgraded.insert("schema_version".into(), json!(2));
    upgraded.insert("refresh_interval_secs".into(), json!(refresh));
    upgraded.insert("widgets".into(), Value::Array(widgets));
    upgraded
}

fn v2_to_v3(mut map: Map<String, Value>) -> Map<String, Value> {
    let thresholds = match map.remove("thresholds") {
        Some(Value::Array(thresholds)) => thresholds,
        _ => Vec::new(),
    };

    if let Some(Value::Array(widgets)) = map.get_mut("widgets") {
        for widget in widgets.iter_mut() {
            let Value::Object(widget) = widget else {
                continue;
            };
            let family = widget.get("family").cloned().unwrap_or(Value::Null);
            let owned: Vec<Value> = thresholds
                .iter()
                .enumerate()
                .filter(|(_, t)| t.get("family") == Some(&family))
                .map(|(index, t)| {
                    let mut t = t.clone();
                    if let Value::Object(fields) = &mut t {
                        if !fields.contains_key("id") {
                            let name = family.as_str().unwrap_or("widget");
                            fields.insert("id".into(), json!(format!("{}-{}", name, index)));
                        }
                    }
                    t
                })
                .collect();
            widget.entry("thresholds").or_insert(Value::Array(owned));
            widget.entry("history_length").or_insert(json!(super::DEFAULT_HISTORY_LENGTH));
        }
    }
    map.insert("schema_version".into(), json!(3));
    map
}

/// Maps the widget names of the first releases
fn legacy_visualization(style: &str) -> &'static str {
    match style {
        "lineChart" | "line_chart" => "line_chart",
        "barChart" | "bar_chart" => "bar_chart",
        "pieChart" | "pie" => "pie",
        "speed" | "networkChart" => "speed",
        "battery" => "battery",
        "label" | "text" => "text",
        _ => "mini",
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.as_str() {
            "true" | "1" | "YES" => Some(true),
            "false" | "0" | "NO" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
