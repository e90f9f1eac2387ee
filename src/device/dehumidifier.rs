use serde::Serialize;
use serde_json::{Map, Value, json};

use super::enums::{FanLevel, Mode};
use super::shadow::{ShadowView, number};
use crate::storage::DeviceStorage;

pub const MIN_HUMIDITY: i64 = 30;
pub const MAX_HUMIDITY: i64 = 80;
pub const HUMIDITY_STEP: i64 = 5;

/// DEM and DF dehumidifiers share one schema; only DF reports a fan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DehumidifierData {
    pub power_switch: i64,
    pub work_mode: i64,
    pub humidity: i64,
    pub env_humidity: Option<f64>,
    pub wind_speed: i64,
    pub water_pump_switch: i64,
    pub screen: i64,
}

pub fn parse(v: &ShadowView<'_>) -> DehumidifierData {
    DehumidifierData {
        power_switch: v.int("powerSwitch"),
        work_mode: v.int("workMode"),
        humidity: v.int("Humidity"),
        env_humidity: v.float("envHumidity"),
        wind_speed: v.int("windSpeed"),
        water_pump_switch: v.int("waterPumpSwitch"),
        screen: v.int("screen"),
    }
}

impl DehumidifierData {
    pub fn fan_level(&self) -> Option<FanLevel> {
        FanLevel::from_value(self.wind_speed).filter(|l| *l != FanLevel::Auto)
    }
}

pub fn valid_humidity(value: i64) -> bool {
    (MIN_HUMIDITY..=MAX_HUMIDITY).contains(&value) && value % HUMIDITY_STEP == 0
}

pub fn mode_change(
    mut desired: Map<String, Value>,
    mode: Mode,
    work_mode: i64,
    storage: &DeviceStorage,
) -> Map<String, Value> {
    desired.insert("workMode".into(), json!(work_mode));
    let behavior = &storage.user_config.behavior;
    if behavior.memorize_humidity_by_mode
        && matches!(mode, Mode::Dry | Mode::Turbo)
        && let Some(h) = storage.remembered_humidity(mode)
    {
        desired.insert("Humidity".into(), number(h));
    }
    if behavior.memorize_fan_speed_by_mode
        && let Some(level) = storage.remembered_fan_speed(mode).and_then(FanLevel::from_name)
    {
        desired.insert("windSpeed".into(), json!(level.value()));
    }
    desired
}
