use serde::Serialize;
use serde_json::{Map, Value, json};

use super::enums::{FanLevel, Mode};
use super::shadow::{ShadowView, number};
use crate::storage::{DEFAULT_MAX_CELSIUS, DEFAULT_MIN_CELSIUS, DeviceStorage};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowData {
    pub power_switch: i64,
    pub beep_switch: i64,
    pub work_mode: i64,
    pub target_temperature: f64,
    pub current_temperature: Option<f64>,
    pub wind_speed: i64,
    pub eco: i64,
    pub sleep: i64,
    pub screen: i64,
    pub temperature_type: i64,
    pub lower_temperature_limit: f64,
    pub upper_temperature_limit: f64,
}

pub fn parse(v: &ShadowView<'_>) -> WindowData {
    WindowData {
        power_switch: v.int("powerSwitch"),
        beep_switch: v.int("beepSwitch"),
        work_mode: v.int("workMode"),
        target_temperature: v.float_or("targetTemperature", 24.0),
        current_temperature: v.float("currentTemperature"),
        wind_speed: v.int("windSpeed"),
        eco: v.int("ECO"),
        sleep: v.int("sleep"),
        screen: v.int("screen"),
        temperature_type: v.int("temperatureType"),
        lower_temperature_limit: v.float_or("lowerTemperatureLimit", DEFAULT_MIN_CELSIUS),
        upper_temperature_limit: v.float_or("upperTemperatureLimit", DEFAULT_MAX_CELSIUS),
    }
}

impl WindowData {
    pub fn fan_level(&self) -> Option<FanLevel> {
        FanLevel::from_value(self.wind_speed)
    }
}

pub fn mode_change(
    mut desired: Map<String, Value>,
    mode: Mode,
    work_mode: i64,
    storage: &DeviceStorage,
) -> Map<String, Value> {
    desired.insert("workMode".into(), json!(work_mode));
    if mode != Mode::Cool {
        desired.insert("ECO".into(), json!(0));
    }

    let behavior = &storage.user_config.behavior;
    if behavior.memorize_temp_by_mode
        && matches!(mode, Mode::Cool | Mode::Auto)
        && let Some(t) = storage.remembered_temperature(mode)
    {
        desired.insert("targetTemperature".into(), number(t));
    }
    if behavior.memorize_fan_speed_by_mode
        && let Some(level) = storage.remembered_fan_speed(mode).and_then(FanLevel::from_name)
    {
        desired.insert("windSpeed".into(), json!(level.value()));
    }
    desired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_mode_drops_eco() {
        let out = mode_change(Map::new(), Mode::Fan, 3, &DeviceStorage::default());
        assert_eq!(Value::Object(out), json!({"workMode": 3, "ECO": 0}));
    }

    #[test]
    fn remembered_values_restored() {
        let mut storage = DeviceStorage::default();
        storage.user_config.behavior.memorize_temp_by_mode = true;
        storage.user_config.behavior.memorize_fan_speed_by_mode = true;
        storage.remember_temperature(Mode::Cool, 19.0);
        storage.remember_fan_speed(Mode::Cool, "low");
        let out = mode_change(Map::new(), Mode::Cool, 1, &storage);
        assert_eq!(Value::Object(out), json!({"workMode": 1, "targetTemperature": 19, "windSpeed": 1}));
    }
}
