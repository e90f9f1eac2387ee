use serde::Serialize;
use serde_json::{Map, Value, json};

use super::enums::{FreshAir, Mode, WindFeeling, WindSpeed7Gear};
use super::shadow::{ShadowView, number};
use super::split::{self, SplitData};
use crate::storage::DeviceStorage;

/// Split unit with a fresh-air intake and a 7-gear fan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreshAirData {
    #[serde(flatten)]
    pub ac: SplitData,
    pub new_wind_switch: i64,
    pub new_wind_auto_switch: i64,
    pub new_wind_strength: i64,
    pub env_humidity: Option<f64>,
}

pub fn parse(v: &ShadowView<'_>) -> FreshAirData {
    FreshAirData {
        ac: split::parse(v),
        new_wind_switch: v.int("newWindSwitch"),
        new_wind_auto_switch: v.int("newWindAutoSwitch"),
        new_wind_strength: v.int("newWindStrength"),
        env_humidity: v.float("envHumidity"),
    }
}

impl FreshAirData {
    pub fn fresh_air(&self) -> FreshAir {
        FreshAir::decode(self.new_wind_switch, self.new_wind_auto_switch, self.new_wind_strength)
    }

    pub fn wind_feeling(&self) -> WindFeeling {
        WindFeeling::from_value(self.ac.soft_wind)
    }

    pub fn fan_speed(&self) -> WindSpeed7Gear {
        self.ac.fan_speed_7_gear()
    }
}

/// Cool and dehumidify pin the fan to a fixed gear; the other modes hand it
/// back to the unit.
pub fn mode_change(
    mut desired: Map<String, Value>,
    mode: Mode,
    work_mode: i64,
    storage: &DeviceStorage,
) -> Map<String, Value> {
    let fan = match mode {
        Mode::Cool => WindSpeed7Gear::Gear(6),
        Mode::Dehumidification => WindSpeed7Gear::Gear(2),
        _ => WindSpeed7Gear::Auto,
    };
    let behavior = &storage.user_config.behavior;
    let fan = behavior
        .memorize_fan_speed_by_mode
        .then(|| storage.remembered_fan_speed(mode))
        .flatten()
        .and_then(WindSpeed7Gear::from_name)
        .unwrap_or(fan);

    desired.extend(fan.to_desired());
    desired.insert("workMode".into(), json!(work_mode));

    if behavior.memorize_temp_by_mode
        && mode != Mode::Fan
        && let Some(t) = storage.remembered_temperature(mode)
    {
        desired.insert("targetTemperature".into(), number(t));
    }
    desired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cool_payload() {
        let out = mode_change(Map::new(), Mode::Cool, 1, &DeviceStorage::default());
        assert_eq!(
            Value::Object(out),
            json!({"windSpeedAutoSwitch": 0, "workMode": 1, "windSpeed7Gear": 6})
        );
    }

    #[test]
    fn dehumidify_payload() {
        let out = mode_change(Map::new(), Mode::Dehumidification, 2, &DeviceStorage::default());
        assert_eq!(
            Value::Object(out),
            json!({"windSpeedAutoSwitch": 0, "workMode": 2, "windSpeed7Gear": 2})
        );
    }

    #[test]
    fn fan_heat_auto_release_the_fan() {
        for (mode, wm) in [(Mode::Fan, 3), (Mode::Heat, 4), (Mode::Auto, 0)] {
            let out = mode_change(Map::new(), mode, wm, &DeviceStorage::default());
            assert_eq!(
                Value::Object(out),
                json!({"windSpeedAutoSwitch": 1, "workMode": wm, "windSpeed7Gear": 0})
            );
        }
    }

    #[test]
    fn fresh_air_and_feeling_decode() {
        let shadow = json!({"state": {"reported": {
            "newWindSwitch": 1, "newWindAutoSwitch": 0, "newWindStrength": 2, "softWind": 3
        }}});
        let data = parse(&ShadowView::new(&shadow));
        assert_eq!(data.fresh_air(), FreshAir::Strength(2));
        assert_eq!(data.wind_feeling(), WindFeeling::Carpet);
    }
}
