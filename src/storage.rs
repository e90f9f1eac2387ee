use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::Mode;

pub const DEFAULT_MIN_CELSIUS: f64 = 16.0;
pub const DEFAULT_MAX_CELSIUS: f64 = 31.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    #[serde(default)]
    pub memorize_temp_by_mode: bool,
    #[serde(default)]
    pub memorize_fan_speed_by_mode: bool,
    #[serde(default)]
    pub memorize_humidity_by_mode: bool,
    #[serde(default)]
    pub silent_beep_when_turn_on: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub behavior: Behavior,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsProbe {
    #[serde(default)]
    pub init_done: bool,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeData {
    #[serde(default)]
    pub fan_speed_mapping: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RnProbeData {
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub data: ProbeData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NonUserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_celsius_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_celsius_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_temp_step: Option<f64>,
    #[serde(default)]
    pub power_consumption: StatsProbe,
    #[serde(default)]
    pub work_time: StatsProbe,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rn_probe_data: Option<RnProbeData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remembered {
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStorage {
    #[serde(default)]
    pub user_config: UserConfig,
    #[serde(default)]
    pub non_user_config: NonUserConfig,
    #[serde(default)]
    pub target_temperature: BTreeMap<String, Remembered>,
    #[serde(default)]
    pub fan_speed: BTreeMap<String, Remembered>,
    #[serde(default)]
    pub humidity: BTreeMap<String, Remembered>,
}

impl DeviceStorage {
    pub fn min_celsius(&self) -> f64 {
        self.non_user_config.min_celsius_temp.unwrap_or(DEFAULT_MIN_CELSIUS)
    }

    pub fn max_celsius(&self) -> f64 {
        self.non_user_config.max_celsius_temp.unwrap_or(DEFAULT_MAX_CELSIUS)
    }

    pub fn temp_step(&self) -> f64 {
        self.non_user_config.native_temp_step.unwrap_or(1.0)
    }

    /// Fan-speed tokens from a successful bundle probe.
    pub fn probed_fan_speeds(&self) -> Option<&[String]> {
        self.non_user_config
            .rn_probe_data
            .as_ref()
            .filter(|p| p.is_success)
            .map(|p| p.data.fan_speed_mapping.as_slice())
    }

    pub fn remembered_temperature(&self, mode: Mode) -> Option<f64> {
        self.target_temperature.get(mode.as_str())?.value.as_f64()
    }

    pub fn remembered_fan_speed(&self, mode: Mode) -> Option<&str> {
        self.fan_speed.get(mode.as_str())?.value.as_str()
    }

    pub fn remembered_humidity(&self, mode: Mode) -> Option<f64> {
        self.humidity.get(mode.as_str())?.value.as_f64()
    }

    pub fn remember_temperature(&mut self, mode: Mode, celsius: f64) {
        self.target_temperature.insert(
            mode.as_str().to_string(),
            Remembered { value: crate::device::shadow::number(celsius) },
        );
    }

    pub fn remember_fan_speed(&mut self, mode: Mode, speed: &str) {
        self.fan_speed.insert(
            mode.as_str().to_string(),
            Remembered { value: Value::from(speed) },
        );
    }

    pub fn remember_humidity(&mut self, mode: Mode, humidity: f64) {
        self.humidity.insert(
            mode.as_str().to_string(),
            Remembered { value: crate::device::shadow::number(humidity) },
        );
    }
}
