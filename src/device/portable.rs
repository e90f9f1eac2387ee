use serde::Serialize;
use serde_json::{Map, Value, json};

use super::enums::{FanLevel, Mode, TemperatureUnit, celsius_to_fahrenheit};
use super::shadow::{ShadowView, number};
use crate::storage::DeviceStorage;

const COOL_DEFAULT_CELSIUS: f64 = 24.0;
const COOL_FAN: FanLevel = FanLevel::Medium;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortableData {
    pub power_switch: i64,
    pub beep_switch: i64,
    pub work_mode: i64,
    pub temperature_type: i64,
    pub target_celsius_degree: f64,
    pub target_fahrenheit_degree: i64,
    pub current_temperature: Option<f64>,
    pub wind_speed: i64,
    pub swing_wind: i64,
    pub sleep: i64,
    pub lower_temperature_limit: f64,
    pub upper_temperature_limit: f64,
}

pub fn parse(v: &ShadowView<'_>) -> PortableData {
    PortableData {
        power_switch: v.int("powerSwitch"),
        beep_switch: v.int("beepSwitch"),
        work_mode: v.int("workMode"),
        temperature_type: v.int("temperatureType"),
        target_celsius_degree: v.float_or("targetCelsiusDegree", COOL_DEFAULT_CELSIUS),
        target_fahrenheit_degree: v.int("targetFahrenheitDegree"),
        current_temperature: v.float("currentTemperature"),
        wind_speed: v.int("windSpeed"),
        swing_wind: v.int("swingWind"),
        sleep: v.int("sleep"),
        lower_temperature_limit: v.float_or("lowerTemperatureLimit", 16.0),
        upper_temperature_limit: v.float_or("upperTemperatureLimit", 31.0),
    }
}

impl PortableData {
    pub fn fan_level(&self) -> Option<FanLevel> {
        FanLevel::from_value(self.wind_speed)
    }

    pub fn unit(&self) -> TemperatureUnit {
        TemperatureUnit::from_value(self.temperature_type)
    }
}

/// Both degree fields are always written together.
pub fn target_desired(celsius: f64) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("targetCelsiusDegree".into(), number(celsius));
    out.insert("targetFahrenheitDegree".into(), json!(celsius_to_fahrenheit(celsius)));
    out
}

pub fn mode_change(
    mut desired: Map<String, Value>,
    mode: Mode,
    work_mode: i64,
    storage: &DeviceStorage,
) -> Map<String, Value> {
    desired.insert("workMode".into(), json!(work_mode));
    let behavior = &storage.user_config.behavior;

    if mode == Mode::Cool {
        let celsius = storage
            .remembered_temperature(Mode::Cool)
            .unwrap_or(COOL_DEFAULT_CELSIUS);
        desired.extend(target_desired(celsius));
        desired.insert("windSpeed".into(), json!(COOL_FAN.value()));
        desired.insert("sleep".into(), json!(0));
    } else if mode != Mode::Auto {
        desired.insert("sleep".into(), json!(0));
    }

    if behavior.memorize_fan_speed_by_mode
        && let Some(level) = storage.remembered_fan_speed(mode).and_then(FanLevel::from_name)
    {
        desired.insert("windSpeed".into(), json!(level.value()));
    }
    desired
}
