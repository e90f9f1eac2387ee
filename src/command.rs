use serde_json::{Map, Value, json};

use crate::device::dehumidifier::{self, MAX_HUMIDITY, MIN_HUMIDITY};
use crate::device::portable;
use crate::device::shadow::number;
use crate::device::{
    Device, FanLevel, FanSpeed, Family, FreshAir, GeneratorMode, HorizontalSwing, Mode, SleepMode,
    TemperatureUnit, VerticalSwing, WindFeeling, WindSpeed7Gear, mode_change,
};
use crate::features::DeviceFeature;
use crate::storage::DeviceStorage;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Power(bool),
    Beep(bool),
    Eco(bool),
    AiEco(bool),
    Healthy(bool),
    Drying(bool),
    Screen(bool),
    LightSense(bool),
    SwingWind(bool),
    Sleep(bool),
    EightDegreeHeating(bool),
    SoftWind(bool),
    FreshAirSwitch(bool),
    SelfClean(bool),
    Mode(Mode),
    TargetTemperature(f64),
    TargetHumidity(i64),
    FanSpeed(FanSpeed),
    FanSpeed7Gear(WindSpeed7Gear),
    FanLevel(FanLevel),
    VerticalSwing(VerticalSwing),
    HorizontalSwing(HorizontalSwing),
    SleepMode(SleepMode),
    FreshAir(FreshAir),
    GeneratorMode(GeneratorMode),
    WindFeeling(WindFeeling),
    TemperatureUnit(TemperatureUnit),
}

/// Result of composing a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Composed {
    pub desired: Map<String, Value>,
    /// Updated storage when the command changes a remembered value.
    pub storage: Option<DeviceStorage>,
}

impl Composed {
    fn patch(desired: Map<String, Value>) -> Self {
        Self { desired, storage: None }
    }
}

fn flag(on: bool) -> Value {
    json!(i64::from(on))
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert(key.to_string(), value);
    m
}

fn require(device: &Device, feature: DeviceFeature) -> Result<()> {
    if device.has(feature) {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "{} does not support {feature}",
            device.device_id
        )))
    }
}

pub fn compose(device: &Device, command: Command) -> Result<Composed> {
    use DeviceFeature as F;

    if !device.family.is_supported() {
        return Err(Error::UnsupportedDevice(device.device_id.clone()));
    }

    let switch = |feature: F, key: &str, on: bool| -> Result<Composed> {
        require(device, feature)?;
        Ok(Composed::patch(single(key, flag(on))))
    };

    match command {
        Command::Power(on) => {
            require(device, F::SwitchPower)?;
            let mut desired = single("powerSwitch", flag(on));
            if on
                && device.storage.user_config.behavior.silent_beep_when_turn_on
                && device.has(F::SwitchBeep)
            {
                desired.insert("beepSwitch".into(), json!(0));
            }
            Ok(Composed::patch(desired))
        }
        Command::Beep(on) => switch(F::SwitchBeep, "beepSwitch", on),
        Command::Eco(on) => {
            require(device, F::SwitchEco)?;
            let mut desired = single("ECO", flag(on));
            if on && matches!(device.family, Family::SplitAc | Family::DuctAc) {
                for key in ["highTemperatureWind", "turbo", "silenceSwitch", "windSpeed"] {
                    desired.insert(key.into(), json!(0));
                }
            }
            Ok(Composed::patch(desired))
        }
        Command::AiEco(on) => switch(F::SwitchAiEco, "AIECOSwitch", on),
        Command::Healthy(on) => switch(F::SwitchHealthy, "healthy", on),
        Command::Drying(on) => switch(F::SwitchDrying, "antiMoldew", on),
        Command::Screen(on) => switch(F::SwitchScreen, "screen", on),
        Command::LightSense(on) => switch(F::SwitchLightSense, "lightSense", on),
        Command::SwingWind(on) => switch(F::SwitchSwingWind, "swingWind", on),
        Command::Sleep(on) => switch(F::SwitchSleep, "sleep", on),
        Command::EightDegreeHeating(on) => switch(F::Switch8CHeating, "eightAddHot", on),
        Command::SoftWind(on) => switch(F::SwitchSoftWind, "softWind", on),
        Command::FreshAirSwitch(on) => switch(F::SwitchFreshAir, "newWindSwitch", on),
        Command::SelfClean(on) => {
            require(device, F::ButtonSelfClean)?;
            let mut desired = single("selfClean", flag(on));
            if on {
                desired.insert("powerSwitch".into(), json!(0));
            }
            Ok(Composed::patch(desired))
        }
        Command::Mode(mode) => {
            require(device, F::SelectMode)?;
            Ok(Composed::patch(mode_change(device, Map::new(), mode)?))
        }
        Command::TargetTemperature(celsius) => target_temperature(device, celsius),
        Command::TargetHumidity(value) => {
            require(device, F::NumberTargetHumidity)?;
            if !dehumidifier::valid_humidity(value) {
                return Err(Error::invalid(format!(
                    "humidity {value} outside {MIN_HUMIDITY}..={MAX_HUMIDITY} in steps of 5"
                )));
            }
            let mut composed = Composed::patch(single("Humidity", json!(value)));
            if device.storage.user_config.behavior.memorize_humidity_by_mode
                && let Some(mode) = device.mode()
            {
                let mut storage = device.storage.clone();
                storage.remember_humidity(mode, value as f64);
                composed.storage = Some(storage);
            }
            Ok(composed)
        }
        Command::FanSpeed(speed) => {
            require(device, F::SelectWindSpeed)?;
            let mut desired = speed.to_desired();
            if !device.has(F::InternalHasTurboProperty) {
                if speed == FanSpeed::Strong {
                    return Err(Error::invalid("this unit has no turbo fan speed"));
                }
                desired.remove("turbo");
            }
            Ok(remember_fan(device, desired, speed.as_str()))
        }
        Command::FanSpeed7Gear(speed) => {
            require(device, F::SelectWindSpeed7Gear)?;
            Ok(remember_fan(device, speed.to_desired(), &speed.as_str()))
        }
        Command::FanLevel(level) => {
            let allowed = if device.has(F::SelectPortableWind4ValueSpeed) || device.has(F::SelectWindowAsWindSpeed) {
                true
            } else if device.has(F::SelectPortableWindSpeed)
                || device.has(F::SelectDehumidifierWindSpeedLowMediumHeigh)
            {
                level != FanLevel::Auto
            } else {
                false
            };
            if !allowed {
                return Err(Error::invalid(format!(
                    "{} does not support fan level {}",
                    device.device_id,
                    level.as_str()
                )));
            }
            Ok(remember_fan(device, single("windSpeed", json!(level.value())), level.as_str()))
        }
        Command::VerticalSwing(swing) => {
            require(device, F::SelectVerticalDirection)?;
            let (switch, direction) = swing.encode();
            let mut desired = single("verticalDirection", json!(direction));
            if device.has(F::InternalHasSwingSwitch) {
                desired.insert("verticalSwitch".into(), json!(switch));
            }
            Ok(Composed::patch(desired))
        }
        Command::HorizontalSwing(swing) => {
            require(device, F::SelectHorizontalDirection)?;
            let (switch, direction) = swing.encode();
            let mut desired = single("horizontalDirection", json!(direction));
            if device.has(F::InternalHasSwingSwitch) {
                desired.insert("horizontalSwitch".into(), json!(switch));
            }
            Ok(Composed::patch(desired))
        }
        Command::SleepMode(mode) => {
            require(device, F::SelectSleepMode)?;
            Ok(Composed::patch(single("sleep", json!(mode.value()))))
        }
        Command::FreshAir(setting) => {
            require(device, F::SelectFreshAir)?;
            if let FreshAir::Strength(s) = setting
                && !(1..=FreshAir::MAX_STRENGTH).contains(&s)
            {
                return Err(Error::invalid(format!("fresh air strength {s} out of range")));
            }
            Ok(Composed::patch(setting.to_desired()))
        }
        Command::GeneratorMode(mode) => {
            require(device, F::SelectGeneratorMode)?;
            Ok(Composed::patch(single("generatorMode", json!(mode.value()))))
        }
        Command::WindFeeling(feeling) => {
            require(device, F::SelectWindFeeling)?;
            Ok(Composed::patch(single("softWind", json!(feeling.value()))))
        }
        Command::TemperatureUnit(unit) => {
            require(device, F::SelectTemperatureUnit)?;
            Ok(Composed::patch(single("temperatureType", json!(unit.value()))))
        }
    }
}

fn target_temperature(device: &Device, celsius: f64) -> Result<Composed> {
    use DeviceFeature as F;

    let portable = device.has(F::NumberTargetDegree);
    if !portable {
        require(device, F::NumberTargetTemperature)?;
    }
    let step = device.storage.temp_step();
    let celsius = if step > 0.0 { (celsius / step).round() * step } else { celsius };
    let (min, max) = (device.storage.min_celsius(), device.storage.max_celsius());
    if !celsius.is_finite() || celsius < min || celsius > max {
        return Err(Error::invalid(format!(
            "target temperature {celsius} outside {min}..={max}"
        )));
    }

    let desired = if portable {
        portable::target_desired(celsius)
    } else {
        let mut desired = single("targetTemperature", number(celsius));
        if device.has(F::InternalSetTftWithTt) {
            desired.insert(
                "targetFahrenheitTemp".into(),
                json!(crate::device::celsius_to_fahrenheit(celsius)),
            );
        }
        desired
    };

    let mut composed = Composed::patch(desired);
    let behavior = &device.storage.user_config.behavior;
    if let Some(mode) = device.mode()
        && (behavior.memorize_temp_by_mode || (portable && mode == Mode::Cool))
    {
        let mut storage = device.storage.clone();
        storage.remember_temperature(mode, celsius);
        composed.storage = Some(storage);
    }
    Ok(composed)
}

fn remember_fan(device: &Device, desired: Map<String, Value>, name: &str) -> Composed {
    let mut composed = Composed::patch(desired);
    if device.storage.user_config.behavior.memorize_fan_speed_by_mode
        && let Some(mode) = device.mode()
    {
        let mut storage = device.storage.clone();
        storage.remember_fan_speed(mode, name);
        composed.storage = Some(storage);
    }
    composed
}
