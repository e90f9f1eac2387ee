use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::device::Device;
use crate::types::Event;

const METADATA_IGNORED: &[&str] = &["capabilities", "errorCode", "authFlag"];

pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

pub(crate) fn map_typed_event(device: &Device, path: &str, new_value: &Value) -> Option<Event> {
    let device_id = device.device_id.clone();
    match path {
        "powerSwitch" => Some(Event::PowerChanged {
            device_id,
            on: new_value.as_i64()? == 1,
        }),
        "workMode" => Some(Event::ModeChanged {
            device_id,
            mode: device.mode_map.to_mode(new_value.as_i64()?)?,
        }),
        "targetTemperature" | "targetCelsiusDegree" => Some(Event::TargetTemperatureChanged {
            device_id,
            celsius: new_value.as_f64()?,
        }),
        "currentTemperature" => Some(Event::CurrentTemperatureChanged {
            device_id,
            celsius: new_value.as_f64()?,
        }),
        _ => None,
    }
}

pub(crate) fn generic_event(device_id: &str, path: &str, value: &Value) -> Option<Event> {
    let device_id = device_id.to_string();
    let path = path.to_string();
    match value {
        Value::Number(n) => Some(Event::PropertyNumeric {
            device_id,
            path,
            value: n.as_f64()?,
        }),
        Value::String(s) => Some(Event::PropertyString {
            device_id,
            path,
            value: s.clone(),
        }),
        Value::Bool(b) => Some(Event::PropertyBool {
            device_id,
            path,
            value: *b,
        }),
        _ => None,
    }
}

/// Events for everything that changed in `state.reported` between two polls.
pub(crate) fn device_events(previous: &Value, device: &Device) -> Vec<Event> {
    let empty = Value::Object(Map::new());
    let prev = previous.pointer("/state/reported").unwrap_or(&empty);
    let curr = device.shadow.pointer("/state/reported").unwrap_or(&empty);
    let mut changes = Vec::new();
    diff_json(prev, curr, "", &mut changes);

    changes
        .iter()
        .filter_map(|(path, _old, new_val)| {
            map_typed_event(device, path, new_val)
                .or_else(|| generic_event(&device.device_id, path, new_val))
        })
        .collect()
}

pub fn changed_metadata_keys(previous: &Value, current: &Value, section: &str) -> BTreeSet<String> {
    let pointer = format!("/metadata/{section}");
    let empty = Map::new();
    let prev = previous.pointer(&pointer).and_then(Value::as_object).unwrap_or(&empty);
    let curr = current.pointer(&pointer).and_then(Value::as_object).unwrap_or(&empty);
    curr.iter()
        .filter(|(k, _)| !METADATA_IGNORED.contains(&k.as_str()))
        .filter(|(k, v)| prev.get(*k).map(timestamp) != Some(timestamp(v)))
        .map(|(k, _)| k.clone())
        .collect()
}

fn timestamp(meta: &Value) -> Option<i64> {
    meta.get("timestamp").and_then(Value::as_i64)
}

pub fn pick_state(shadow: &Value, section: &str, keys: &BTreeSet<String>) -> Map<String, Value> {
    let Some(state) = shadow.pointer(&format!("/state/{section}")).and_then(Value::as_object) else {
        return Map::new();
    };
    keys.iter()
        .filter_map(|k| state.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Mode;
    use crate::storage::DeviceStorage;
    use crate::types::Thing;
    use serde_json::json;

    fn split_device(reported: Value) -> Device {
        let thing: Thing = serde_json::from_value(json!({"deviceId": "d1", "deviceName": "Split AC"})).unwrap();
        Device::build(&thing, json!({"state": {"reported": reported}}), DeviceStorage::default())
    }

    #[test]
    fn diff_detects_leaf_change() {
        let prev = json!({"state": {"reported": {"windSpeed": 2}}});
        let curr = json!({"state": {"reported": {"windSpeed": 4}}});
        let mut changes = vec![];
        diff_json(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "state.reported.windSpeed");
        assert_eq!(changes[0].1, json!(2));
        assert_eq!(changes[0].2, json!(4));
    }

    #[test]
    fn diff_ignores_unchanged() {
        let val = json!({"workMode": 1, "ECO": 0});
        let mut changes = vec![];
        diff_json(&val, &val, "", &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn typed_events_for_known_keys() {
        let previous = json!({"state": {"reported": {"powerSwitch": 0, "workMode": 0, "targetTemperature": 24}}});
        let device = split_device(json!({"powerSwitch": 1, "workMode": 4, "targetTemperature": 26, "screen": 1}));
        let events = device_events(&previous, &device);
        assert!(events.contains(&Event::PowerChanged { device_id: "d1".into(), on: true }));
        assert!(events.contains(&Event::ModeChanged { device_id: "d1".into(), mode: Mode::Heat }));
        assert!(events.contains(&Event::TargetTemperatureChanged { device_id: "d1".into(), celsius: 26.0 }));
        assert!(events.contains(&Event::PropertyNumeric {
            device_id: "d1".into(),
            path: "screen".into(),
            value: 1.0
        }));
    }

    #[test]
    fn unknown_work_mode_falls_back_to_generic() {
        let device = split_device(json!({"workMode": 9}));
        let events = device_events(&json!({}), &device);
        assert_eq!(
            events,
            vec![Event::PropertyNumeric { device_id: "d1".into(), path: "workMode".into(), value: 9.0 }]
        );
    }

    #[test]
    fn metadata_diff_skips_noise_keys() {
        let prev = json!({"metadata": {"reported": {
            "workMode": {"timestamp": 1}, "errorCode": {"timestamp": 1}
        }}});
        let curr = json!({"metadata": {"reported": {
            "workMode": {"timestamp": 2}, "errorCode": {"timestamp": 2},
            "capabilities": {"timestamp": 2}, "sleep": {"timestamp": 1}
        }}});
        let keys = changed_metadata_keys(&prev, &curr, "reported");
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["sleep", "workMode"]);
    }

    #[test]
    fn pick_state_restricts_keys() {
        let shadow = json!({"state": {"desired": {"a": 1, "b": 2}}});
        let keys = BTreeSet::from(["a".to_string(), "z".to_string()]);
        assert_eq!(Value::Object(pick_state(&shadow, "desired", &keys)), json!({"a": 1}));
    }
}
