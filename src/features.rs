use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{Family, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceFeature {
    Climate,

    ModeAcAuto,
    ModeAcCool,
    ModeAcDehumidification,
    ModeAcFan,
    ModeAcHeat,
    ModeDehumidifierDry,
    ModeDehumidifierTurbo,
    ModeDehumidifierComfort,
    ModeDehumidifierContinue,

    SwitchPower,
    SwitchBeep,
    SwitchEco,
    SwitchAiEco,
    SwitchHealthy,
    SwitchDrying,
    SwitchScreen,
    SwitchLightSense,
    SwitchSwingWind,
    SwitchSleep,
    Switch8CHeating,
    SwitchSoftWind,
    SwitchFreshAir,

    ButtonSelfClean,

    SelectMode,
    SelectWindSpeed,
    SelectWindSpeed7Gear,
    SelectVerticalDirection,
    SelectHorizontalDirection,
    SelectSleepMode,
    SelectFreshAir,
    SelectGeneratorMode,
    SelectWindFeeling,
    SelectPortableWindSpeed,
    SelectPortableWind4ValueSpeed,
    SelectWindowAsWindSpeed,
    SelectDehumidifierWindSpeedLowMediumHeigh,
    SelectTemperatureUnit,

    NumberTargetTemperature,
    NumberTargetDegree,
    NumberTargetHumidity,

    SensorCurrentTemperature,
    SensorExternalUnitTemperature,
    SensorInternalUnitCoilTemperature,
    SensorExternalUnitCoilTemperature,
    SensorExternalUnitExhaustTemperature,
    SensorEnvHumidity,
    SensorPowerConsumption,
    SensorWorkTime,

    InternalHasSwingSwitch,
    InternalHasTurboProperty,
    InternalSetTftWithTt,
}

impl DeviceFeature {
    pub fn as_str(&self) -> &'static str {
        use DeviceFeature::*;
        match self {
            Climate => "CLIMATE",
            ModeAcAuto => "MODE_AC_AUTO",
            ModeAcCool => "MODE_AC_COOL",
            ModeAcDehumidification => "MODE_AC_DEHUMIDIFICATION",
            ModeAcFan => "MODE_AC_FAN",
            ModeAcHeat => "MODE_AC_HEAT",
            ModeDehumidifierDry => "MODE_DEHUMIDIFIER_DRY",
            ModeDehumidifierTurbo => "MODE_DEHUMIDIFIER_TURBO",
            ModeDehumidifierComfort => "MODE_DEHUMIDIFIER_COMFORT",
            ModeDehumidifierContinue => "MODE_DEHUMIDIFIER_CONTINUE",
            SwitchPower => "SWITCH_POWER",
            SwitchBeep => "SWITCH_BEEP",
            SwitchEco => "SWITCH_ECO",
            SwitchAiEco => "SWITCH_AI_ECO",
            SwitchHealthy => "SWITCH_HEALTHY",
            SwitchDrying => "SWITCH_DRYING",
            SwitchScreen => "SWITCH_SCREEN",
            SwitchLightSense => "SWITCH_LIGHT_SENSE",
            SwitchSwingWind => "SWITCH_SWING_WIND",
            SwitchSleep => "SWITCH_SLEEP",
            Switch8CHeating => "SWITCH_8_C_HEATING",
            SwitchSoftWind => "SWITCH_SOFT_WIND",
            SwitchFreshAir => "SWITCH_FRESH_AIR",
            ButtonSelfClean => "BUTTON_SELF_CLEAN",
            SelectMode => "SELECT_MODE",
            SelectWindSpeed => "SELECT_WIND_SPEED",
            SelectWindSpeed7Gear => "SELECT_WIND_SPEED_7_GEAR",
            SelectVerticalDirection => "SELECT_VERTICAL_DIRECTION",
            SelectHorizontalDirection => "SELECT_HORIZONTAL_DIRECTION",
            SelectSleepMode => "SELECT_SLEEP_MODE",
            SelectFreshAir => "SELECT_FRESH_AIR",
            SelectGeneratorMode => "SELECT_GENERATOR_MODE",
            SelectWindFeeling => "SELECT_WIND_FEELING",
            SelectPortableWindSpeed => "SELECT_PORTABLE_WIND_SPEED",
            SelectPortableWind4ValueSpeed => "SELECT_PORTABLE_WIND_4VALUE_SPEED",
            SelectWindowAsWindSpeed => "SELECT_WINDOW_AS_WIND_SPEED",
            SelectDehumidifierWindSpeedLowMediumHeigh => "SELECT_DEHUMIDIFIER_WIND_SPEED_LOW_MEDIUM_HEIGH",
            SelectTemperatureUnit => "SELECT_TEMPERATURE_UNIT",
            NumberTargetTemperature => "NUMBER_TARGET_TEMPERATURE",
            NumberTargetDegree => "NUMBER_TARGET_DEGREE",
            NumberTargetHumidity => "NUMBER_TARGET_HUMIDITY",
            SensorCurrentTemperature => "SENSOR_CURRENT_TEMPERATURE",
            SensorExternalUnitTemperature => "SENSOR_EXTERNAL_UNIT_TEMPERATURE",
            SensorInternalUnitCoilTemperature => "SENSOR_INTERNAL_UNIT_COIL_TEMPERATURE",
            SensorExternalUnitCoilTemperature => "SENSOR_EXTERNAL_UNIT_COIL_TEMPERATURE",
            SensorExternalUnitExhaustTemperature => "SENSOR_EXTERNAL_UNIT_EXHAUST_TEMPERATURE",
            SensorEnvHumidity => "SENSOR_ENV_HUMIDITY",
            SensorPowerConsumption => "SENSOR_POWER_CONSUMPTION",
            SensorWorkTime => "SENSOR_WORK_TIME",
            InternalHasSwingSwitch => "INTERNAL_HAS_SWING_SWITCH",
            InternalHasTurboProperty => "INTERNAL_HAS_TURBO_PROPERTY",
            InternalSetTftWithTt => "INTERNAL_SET_TFT_WITH_TT",
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Auto => DeviceFeature::ModeAcAuto,
            Mode::Cool => DeviceFeature::ModeAcCool,
            Mode::Dehumidification => DeviceFeature::ModeAcDehumidification,
            Mode::Fan => DeviceFeature::ModeAcFan,
            Mode::Heat => DeviceFeature::ModeAcHeat,
            Mode::Dry => DeviceFeature::ModeDehumidifierDry,
            Mode::Turbo => DeviceFeature::ModeDehumidifierTurbo,
            Mode::Comfort => DeviceFeature::ModeDehumidifierComfort,
            Mode::Continue => DeviceFeature::ModeDehumidifierContinue,
        }
    }
}

impl fmt::Display for DeviceFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type FeatureSet = BTreeSet<DeviceFeature>;

const CAP_SOFT_WIND: i64 = 5;
const CAP_8_C_HEATING: i64 = 21;
const CAP_GENERATOR_MODE: i64 = 23;

/// Sensors added whenever their key shows up in the reported state.
const SENSOR_KEYS: &[(&str, DeviceFeature)] = &[
    ("externalUnitTemperature", DeviceFeature::SensorExternalUnitTemperature),
    ("internalUnitCoilTemperature", DeviceFeature::SensorInternalUnitCoilTemperature),
    ("externalUnitCoilTemperature", DeviceFeature::SensorExternalUnitCoilTemperature),
    ("externalUnitExhaustTemperature", DeviceFeature::SensorExternalUnitExhaustTemperature),
];

/// Fan-speed tokens extracted from the app bundle, without the `FAN_SPEED_`
/// prefix.
pub fn is_four_value_fan(tokens: &[String]) -> bool {
    let set: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
    let medium = set.contains("MED") ^ set.contains("MEDIUM");
    set.len() == 4 && medium && set.contains("AUTO") && set.contains("LOW") && set.contains("HIGH")
}

pub fn resolve_features(
    family: Family,
    reported_keys: &[&str],
    capabilities: &[i64],
    probe: Option<&[String]>,
) -> FeatureSet {
    use DeviceFeature::*;

    let has = |k: &str| reported_keys.contains(&k);
    let cap = |c: i64| capabilities.contains(&c);
    let mut f = FeatureSet::new();

    match family {
        Family::SplitAc | Family::DuctAc => {
            f.extend([
                Climate,
                ModeAcAuto,
                ModeAcCool,
                ModeAcDehumidification,
                ModeAcFan,
                ModeAcHeat,
                SwitchPower,
                SwitchBeep,
                SwitchHealthy,
                SwitchDrying,
                SwitchScreen,
                SwitchLightSense,
                SwitchSleep,
                ButtonSelfClean,
                SelectMode,
                SelectVerticalDirection,
                SelectHorizontalDirection,
                SelectSleepMode,
                NumberTargetTemperature,
                SensorCurrentTemperature,
            ]);
            if cap(CAP_SOFT_WIND) {
                f.insert(SwitchSoftWind);
            }
            if cap(CAP_8_C_HEATING) {
                f.insert(Switch8CHeating);
            }
            if cap(CAP_GENERATOR_MODE) {
                f.insert(SelectGeneratorMode);
            }
            if has("ECO") {
                f.insert(SwitchEco);
            }
            if has("windSpeed") {
                f.insert(SelectWindSpeed);
            }
            if has("verticalSwitch") && has("horizontalSwitch") {
                f.insert(InternalHasSwingSwitch);
            }
            if has("turbo") {
                f.insert(InternalHasTurboProperty);
            }
            if has("windSpeed7Gear") {
                f.insert(SelectWindSpeed7Gear);
            }
            if has("AIECOSwitch") {
                f.insert(SwitchAiEco);
            }
            if has("targetFahrenheitTemp") {
                f.insert(InternalSetTftWithTt);
            }
        }
        Family::SplitAcFreshAir => {
            f.extend([
                Climate,
                ModeAcAuto,
                ModeAcCool,
                ModeAcDehumidification,
                ModeAcFan,
                ModeAcHeat,
                SwitchPower,
                SwitchBeep,
                SwitchEco,
                SwitchHealthy,
                SwitchDrying,
                SwitchScreen,
                SwitchLightSense,
                SwitchSleep,
                Switch8CHeating,
                SwitchFreshAir,
                ButtonSelfClean,
                SelectMode,
                SelectWindSpeed7Gear,
                SelectVerticalDirection,
                SelectHorizontalDirection,
                SelectSleepMode,
                SelectFreshAir,
                SelectGeneratorMode,
                SelectWindFeeling,
                NumberTargetTemperature,
                SensorCurrentTemperature,
            ]);
            if has("envHumidity") {
                f.insert(SensorEnvHumidity);
            }
        }
        Family::WindowAc => {
            f.extend([
                Climate,
                ModeAcAuto,
                ModeAcCool,
                ModeAcDehumidification,
                ModeAcFan,
                SwitchPower,
                SwitchBeep,
                SwitchSleep,
                SwitchScreen,
                SelectMode,
                SelectWindowAsWindSpeed,
                NumberTargetTemperature,
                SensorCurrentTemperature,
            ]);
            if has("ECO") {
                f.insert(SwitchEco);
            }
        }
        Family::PortableAc => {
            f.extend([
                ModeAcCool,
                ModeAcDehumidification,
                ModeAcFan,
                SwitchPower,
                SwitchSleep,
                SelectMode,
                NumberTargetDegree,
            ]);
            let four_value = probe.is_some_and(is_four_value_fan);
            f.insert(if four_value {
                SelectPortableWind4ValueSpeed
            } else {
                SelectPortableWindSpeed
            });
            if has("swingWind") {
                f.insert(SwitchSwingWind);
                f.insert(ModeAcAuto);
            }
            if has("currentTemperature") {
                f.insert(SensorCurrentTemperature);
                f.insert(Climate);
            }
            if has("beepSwitch") {
                f.insert(SwitchBeep);
            }
        }
        Family::DehumidifierDem => {
            f.extend([
                ModeDehumidifierDry,
                ModeDehumidifierComfort,
                ModeDehumidifierContinue,
                SwitchPower,
                SelectMode,
                NumberTargetHumidity,
                SensorEnvHumidity,
            ]);
        }
        Family::DehumidifierDf => {
            f.extend([
                ModeDehumidifierDry,
                ModeDehumidifierTurbo,
                ModeDehumidifierComfort,
                ModeDehumidifierContinue,
                SwitchPower,
                SelectMode,
                SelectDehumidifierWindSpeedLowMediumHeigh,
                NumberTargetHumidity,
                SensorEnvHumidity,
            ]);
        }
        Family::Unknown => {}
    }

    if family.is_air_conditioner() {
        for (key, sensor) in SENSOR_KEYS {
            if has(key) {
                f.insert(*sensor);
            }
        }
        if has("temperatureType") {
            f.insert(SelectTemperatureUnit);
        }
    }
    f
}

/// Bijection between the supported modes and the `workMode` integers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeMap {
    to_int: BTreeMap<Mode, i64>,
    to_mode: BTreeMap<i64, Mode>,
}

impl ModeMap {
    pub fn build(family: Family, features: &FeatureSet) -> Self {
        let order: &[Mode] = if family.is_dehumidifier() {
            &Mode::DEHUMIDIFIER_ORDER
        } else {
            &Mode::AC_ORDER
        };
        let mut map = ModeMap::default();
        let supported = order
            .iter()
            .filter(|m| features.contains(&DeviceFeature::for_mode(**m)));
        for (i, mode) in supported.enumerate() {
            map.to_int.insert(*mode, i as i64);
            map.to_mode.insert(i as i64, *mode);
        }
        map
    }

    pub fn to_int(&self, mode: Mode) -> Option<i64> {
        self.to_int.get(&mode).copied()
    }

    pub fn to_mode(&self, value: i64) -> Option<Mode> {
        self.to_mode.get(&value).copied()
    }

    pub fn supported_modes(&self) -> Vec<Mode> {
        self.to_mode.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_key_driven_features() {
        let f = resolve_features(
            Family::SplitAc,
            &["ECO", "windSpeed", "verticalSwitch", "horizontalSwitch", "turbo"],
            &[5, 23],
            None,
        );
        assert!(f.contains(&DeviceFeature::SwitchEco));
        assert!(f.contains(&DeviceFeature::SelectWindSpeed));
        assert!(f.contains(&DeviceFeature::InternalHasSwingSwitch));
        assert!(f.contains(&DeviceFeature::InternalHasTurboProperty));
        assert!(f.contains(&DeviceFeature::SwitchSoftWind));
        assert!(f.contains(&DeviceFeature::SelectGeneratorMode));
        assert!(!f.contains(&DeviceFeature::Switch8CHeating));
        assert!(!f.contains(&DeviceFeature::SelectWindSpeed7Gear));
    }

    #[test]
    fn split_without_eco_key() {
        let f = resolve_features(Family::SplitAc, &["verticalSwitch"], &[], None);
        assert!(!f.contains(&DeviceFeature::SwitchEco));
        assert!(!f.contains(&DeviceFeature::InternalHasSwingSwitch));
        assert!(f.contains(&DeviceFeature::Climate));
    }

    #[test]
    fn window_has_no_heat_or_swing() {
        let f = resolve_features(Family::WindowAc, &["verticalSwitch", "horizontalSwitch"], &[], None);
        assert!(!f.contains(&DeviceFeature::ModeAcHeat));
        assert!(!f.contains(&DeviceFeature::SelectVerticalDirection));
        assert!(f.contains(&DeviceFeature::SelectWindowAsWindSpeed));
    }

    #[test]
    fn portable_fan_selector_follows_probe() {
        let four = tokens(&["AUTO", "LOW", "MED", "HIGH"]);
        let f = resolve_features(Family::PortableAc, &[], &[], Some(&four));
        assert!(f.contains(&DeviceFeature::SelectPortableWind4ValueSpeed));
        assert!(!f.contains(&DeviceFeature::SelectPortableWindSpeed));

        let three = tokens(&["LOW", "MEDIUM", "HIGH"]);
        let f = resolve_features(Family::PortableAc, &[], &[], Some(&three));
        assert!(f.contains(&DeviceFeature::SelectPortableWindSpeed));

        let f = resolve_features(Family::PortableAc, &[], &[], None);
        assert!(f.contains(&DeviceFeature::SelectPortableWindSpeed));
        assert!(!f.contains(&DeviceFeature::Climate));
    }

    #[test]
    fn portable_swing_and_climate_keys() {
        let f = resolve_features(Family::PortableAc, &["swingWind", "currentTemperature"], &[], None);
        assert!(f.contains(&DeviceFeature::SwitchSwingWind));
        assert!(f.contains(&DeviceFeature::ModeAcAuto));
        assert!(f.contains(&DeviceFeature::Climate));
        assert!(f.contains(&DeviceFeature::SensorCurrentTemperature));
    }

    #[test]
    fn four_value_requires_exact_set() {
        assert!(is_four_value_fan(&tokens(&["AUTO", "LOW", "MEDIUM", "HIGH"])));
        assert!(!is_four_value_fan(&tokens(&["AUTO", "LOW", "MED", "MEDIUM", "HIGH"])));
        assert!(!is_four_value_fan(&tokens(&["AUTO", "LOW", "HIGH", "TURBO"])));
    }

    #[test]
    fn mode_map_is_a_bijection_for_every_family() {
        for family in Family::ALL {
            let features = resolve_features(family, &["swingWind"], &[], None);
            let map = ModeMap::build(family, &features);
            for mode in map.supported_modes() {
                let i = map.to_int(mode).unwrap();
                assert_eq!(map.to_mode(i), Some(mode), "{family:?} {mode:?}");
            }
        }
    }

    #[test]
    fn mode_map_skips_unsupported_modes() {
        let features = resolve_features(Family::PortableAc, &[], &[], None);
        let map = ModeMap::build(Family::PortableAc, &features);
        assert_eq!(map.to_int(Mode::Cool), Some(0));
        assert_eq!(map.to_int(Mode::Fan), Some(2));
        assert_eq!(map.to_int(Mode::Heat), None);
        assert_eq!(map.to_mode(7), None);

        let features = resolve_features(Family::DehumidifierDem, &[], &[], None);
        let map = ModeMap::build(Family::DehumidifierDem, &features);
        assert_eq!(map.supported_modes(), vec![Mode::Dry, Mode::Comfort, Mode::Continue]);
    }

    #[test]
    fn split_work_modes_follow_ac_order() {
        let features = resolve_features(Family::SplitAcFreshAir, &[], &[], None);
        let map = ModeMap::build(Family::SplitAcFreshAir, &features);
        assert_eq!(map.to_int(Mode::Auto), Some(0));
        assert_eq!(map.to_int(Mode::Cool), Some(1));
        assert_eq!(map.to_int(Mode::Heat), Some(4));
    }
}
