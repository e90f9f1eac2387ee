use serde::Serialize;
use serde_json::{Map, Value, json};

use super::enums::{FanSpeed, HorizontalSwing, Mode, SleepMode, VerticalSwing, WindSpeed7Gear};
use super::shadow::{ShadowView, number};
use crate::features::{DeviceFeature, FeatureSet};
use crate::storage::{DEFAULT_MAX_CELSIUS, DEFAULT_MIN_CELSIUS, DeviceStorage};

const COOL_DEFAULT_CELSIUS: f64 = 24.0;
const HEAT_DEFAULT_CELSIUS: f64 = 26.0;

/// Split (and ducted) air conditioner state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitData {
    pub power_switch: i64,
    pub beep_switch: i64,
    pub work_mode: i64,
    pub target_temperature: f64,
    pub target_fahrenheit_temp: i64,
    pub current_temperature: Option<f64>,
    pub wind_speed: i64,
    pub wind_speed_7_gear: i64,
    pub wind_speed_auto_switch: i64,
    pub vertical_switch: i64,
    pub vertical_direction: i64,
    pub horizontal_switch: i64,
    pub horizontal_direction: i64,
    pub turbo: i64,
    pub silence_switch: i64,
    pub high_temperature_wind: i64,
    pub eco: i64,
    pub ai_eco: i64,
    pub sleep: i64,
    pub healthy: i64,
    pub anti_moldew: i64,
    pub self_clean: i64,
    pub screen: i64,
    pub light_sense: i64,
    pub soft_wind: i64,
    pub eight_add_hot: i64,
    pub generator_mode: i64,
    pub temperature_type: i64,
    pub lower_temperature_limit: f64,
    pub upper_temperature_limit: f64,
    pub external_unit_temperature: Option<f64>,
    pub internal_unit_coil_temperature: Option<f64>,
    pub external_unit_coil_temperature: Option<f64>,
    pub external_unit_exhaust_temperature: Option<f64>,
}

pub fn parse(v: &ShadowView<'_>) -> SplitData {
    SplitData {
        power_switch: v.int("powerSwitch"),
        beep_switch: v.int("beepSwitch"),
        work_mode: v.int("workMode"),
        target_temperature: v.float_or("targetTemperature", COOL_DEFAULT_CELSIUS),
        target_fahrenheit_temp: v.int("targetFahrenheitTemp"),
        current_temperature: v.float("currentTemperature"),
        wind_speed: v.int("windSpeed"),
        wind_speed_7_gear: v.int("windSpeed7Gear"),
        wind_speed_auto_switch: v.int("windSpeedAutoSwitch"),
        vertical_switch: v.int("verticalSwitch"),
        vertical_direction: v.int("verticalDirection"),
        horizontal_switch: v.int("horizontalSwitch"),
        horizontal_direction: v.int("horizontalDirection"),
        turbo: v.int("turbo"),
        silence_switch: v.int("silenceSwitch"),
        high_temperature_wind: v.int("highTemperatureWind"),
        eco: v.int("ECO"),
        ai_eco: v.int("AIECOSwitch"),
        sleep: v.int("sleep"),
        healthy: v.int("healthy"),
        anti_moldew: v.int("antiMoldew"),
        self_clean: v.int("selfClean"),
        screen: v.int("screen"),
        light_sense: v.int("lightSense"),
        soft_wind: v.int("softWind"),
        eight_add_hot: v.int("eightAddHot"),
        generator_mode: v.int("generatorMode"),
        temperature_type: v.int("temperatureType"),
        lower_temperature_limit: v.float_or("lowerTemperatureLimit", DEFAULT_MIN_CELSIUS),
        upper_temperature_limit: v.float_or("upperTemperatureLimit", DEFAULT_MAX_CELSIUS),
        external_unit_temperature: v.float("externalUnitTemperature"),
        internal_unit_coil_temperature: v.float("internalUnitCoilTemperature"),
        external_unit_coil_temperature: v.float("externalUnitCoilTemperature"),
        external_unit_exhaust_temperature: v.float("externalUnitExhaustTemperature"),
    }
}

impl SplitData {
    pub fn fan_speed(&self) -> Option<FanSpeed> {
        FanSpeed::decode(self.wind_speed, self.turbo, self.silence_switch)
    }

    pub fn fan_speed_7_gear(&self) -> WindSpeed7Gear {
        WindSpeed7Gear::decode(self.wind_speed_auto_switch, self.wind_speed_7_gear)
    }

    pub fn vertical_swing(&self) -> VerticalSwing {
        VerticalSwing::decode(self.vertical_direction)
    }

    pub fn horizontal_swing(&self) -> HorizontalSwing {
        HorizontalSwing::decode(self.horizontal_direction)
    }

    pub fn sleep_mode(&self) -> SleepMode {
        SleepMode::from_value(self.sleep)
    }
}

/// Legacy mode switch: every comfort option is reset along with the mode.
pub fn mode_change(
    mut desired: Map<String, Value>,
    mode: Mode,
    work_mode: i64,
    features: &FeatureSet,
    storage: &DeviceStorage,
) -> Map<String, Value> {
    let seven_gear = features.contains(&DeviceFeature::SelectWindSpeed7Gear);
    for key in [
        "ECO",
        "sleep",
        "eightAddHot",
        "highTemperatureWind",
        "horizontalSwitch",
        "healthy",
        "turbo",
        "antiMoldew",
        "verticalSwitch",
        "silenceSwitch",
    ] {
        desired.insert(key.into(), json!(0));
    }
    if seven_gear {
        desired.extend(WindSpeed7Gear::Auto.to_desired());
    } else {
        desired.insert("windSpeed".into(), json!(0));
    }
    desired.insert("workMode".into(), json!(work_mode));

    let behavior = &storage.user_config.behavior;
    let remembered = behavior
        .memorize_temp_by_mode
        .then(|| storage.remembered_temperature(mode))
        .flatten();
    let target = match mode {
        Mode::Cool => Some(remembered.unwrap_or(COOL_DEFAULT_CELSIUS)),
        Mode::Heat => Some(remembered.unwrap_or(HEAT_DEFAULT_CELSIUS)),
        Mode::Fan => None,
        _ => remembered,
    };
    if let Some(t) = target {
        desired.insert("targetTemperature".into(), number(t));
    }

    if behavior.memorize_fan_speed_by_mode
        && let Some(name) = storage.remembered_fan_speed(mode)
    {
        if seven_gear {
            if let Some(speed) = WindSpeed7Gear::from_name(name) {
                desired.extend(speed.to_desired());
            }
        } else if let Some(speed) = FanSpeed::from_name(name) {
            desired.extend(speed.to_desired());
        }
    }
    desired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Family;
    use crate::features::resolve_features;

    fn features(keys: &[&str]) -> FeatureSet {
        resolve_features(Family::SplitAc, keys, &[], None)
    }

    #[test]
    fn parse_reads_reported_fields() {
        let shadow = json!({"state": {"reported": {
            "powerSwitch": 1, "workMode": 1, "targetTemperature": 24,
            "currentTemperature": 25.5, "windSpeed": 6, "turbo": 1, "silenceSwitch": 0
        }}});
        let data = parse(&ShadowView::new(&shadow));
        assert_eq!(data.power_switch, 1);
        assert_eq!(data.target_temperature, 24.0);
        assert_eq!(data.current_temperature, Some(25.5));
        assert_eq!(data.fan_speed(), Some(FanSpeed::Strong));
        assert_eq!(data.eco, -1);
        assert_eq!(data.upper_temperature_limit, 31.0);
    }

    #[test]
    fn cool_resets_and_defaults_to_24() {
        let out = mode_change(Map::new(), Mode::Cool, 1, &features(&["windSpeed"]), &DeviceStorage::default());
        assert_eq!(out["workMode"], 1);
        assert_eq!(out["targetTemperature"], json!(24));
        assert_eq!(out["ECO"], 0);
        assert_eq!(out["windSpeed"], 0);
        assert_eq!(out["verticalSwitch"], 0);
    }

    #[test]
    fn heat_defaults_to_26_unless_remembered() {
        let f = features(&[]);
        let mut storage = DeviceStorage::default();
        let out = mode_change(Map::new(), Mode::Heat, 4, &f, &storage);
        assert_eq!(out["targetTemperature"], json!(26));

        storage.user_config.behavior.memorize_temp_by_mode = true;
        storage.remember_temperature(Mode::Heat, 22.5);
        let out = mode_change(Map::new(), Mode::Heat, 4, &f, &storage);
        assert_eq!(out["targetTemperature"], json!(22.5));
    }

    #[test]
    fn seven_gear_variant_resets_gear_fields() {
        let out = mode_change(Map::new(), Mode::Fan, 3, &features(&["windSpeed7Gear"]), &DeviceStorage::default());
        assert_eq!(out["windSpeedAutoSwitch"], 1);
        assert_eq!(out["windSpeed7Gear"], 0);
        assert!(out.get("windSpeed").is_none());
        assert!(out.get("targetTemperature").is_none());
    }

    #[test]
    fn mode_change_is_idempotent() {
        let f = features(&["windSpeed"]);
        let storage = DeviceStorage::default();
        let start: Map<String, Value> = [("beepSwitch".to_string(), json!(0))].into_iter().collect();
        let a = mode_change(start.clone(), Mode::Dehumidification, 2, &f, &storage);
        let b = mode_change(start, Mode::Dehumidification, 2, &f, &storage);
        assert_eq!(a, b);
    }

    #[test]
    fn remembered_fan_speed_is_restored() {
        let mut storage = DeviceStorage::default();
        storage.user_config.behavior.memorize_fan_speed_by_mode = true;
        storage.remember_fan_speed(Mode::Cool, "mute");
        let out = mode_change(Map::new(), Mode::Cool, 1, &features(&["windSpeed"]), &storage);
        assert_eq!(out["silenceSwitch"], 1);
        assert_eq!(out["windSpeed"], 2);
    }
}
