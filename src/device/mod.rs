pub mod dehumidifier;
pub mod enums;
pub mod fresh_air;
pub mod portable;
pub mod shadow;
pub mod split;
pub mod window;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use dehumidifier::DehumidifierData;
pub use enums::*;
pub use fresh_air::FreshAirData;
pub use portable::PortableData;
pub use shadow::ShadowView;
pub use split::SplitData;
pub use window::WindowData;

use crate::features::{DeviceFeature, FeatureSet, ModeMap, resolve_features};
use crate::storage::DeviceStorage;
use crate::types::Thing;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    SplitAc,
    SplitAcFreshAir,
    PortableAc,
    WindowAc,
    DehumidifierDem,
    DehumidifierDf,
    DuctAc,
    Unknown,
}

impl Family {
    pub const ALL: [Family; 8] = [
        Family::SplitAc,
        Family::SplitAcFreshAir,
        Family::PortableAc,
        Family::WindowAc,
        Family::DehumidifierDem,
        Family::DehumidifierDf,
        Family::DuctAc,
        Family::Unknown,
    ];

    /// Maps the `deviceName` tag of the thing list.
    pub fn from_device_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        if name.starts_with("split ac fresh air") {
            Family::SplitAcFreshAir
        } else if name.starts_with("split ac") {
            Family::SplitAc
        } else if name.starts_with("portable ac") {
            Family::PortableAc
        } else if name.starts_with("window ac") {
            Family::WindowAc
        } else if name.starts_with("duct ac") {
            Family::DuctAc
        } else if name.ends_with("dem") {
            Family::DehumidifierDem
        } else if name.ends_with("df") {
            Family::DehumidifierDf
        } else {
            Family::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::SplitAc => "SPLIT_AC",
            Family::SplitAcFreshAir => "SPLIT_AC_FRESH_AIR",
            Family::PortableAc => "PORTABLE_AC",
            Family::WindowAc => "WINDOW_AC",
            Family::DehumidifierDem => "DEHUMIDIFIER_DEM",
            Family::DehumidifierDf => "DEHUMIDIFIER_DF",
            Family::DuctAc => "DUCT_AC",
            Family::Unknown => "UNKNOWN",
        }
    }

    pub fn is_dehumidifier(&self) -> bool {
        matches!(self, Family::DehumidifierDem | Family::DehumidifierDf)
    }

    pub fn is_air_conditioner(&self) -> bool {
        !self.is_dehumidifier() && *self != Family::Unknown
    }

    pub fn is_supported(&self) -> bool {
        *self != Family::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", content = "state")]
pub enum DeviceData {
    Split(SplitData),
    FreshAir(FreshAirData),
    Portable(PortableData),
    Window(WindowData),
    Dehumidifier(DehumidifierData),
    Unknown,
}

impl DeviceData {
    pub fn parse(family: Family, shadow: &Value) -> Self {
        let view = ShadowView::new(shadow);
        match family {
            Family::SplitAc | Family::DuctAc => DeviceData::Split(split::parse(&view)),
            Family::SplitAcFreshAir => DeviceData::FreshAir(fresh_air::parse(&view)),
            Family::PortableAc => DeviceData::Portable(portable::parse(&view)),
            Family::WindowAc => DeviceData::Window(window::parse(&view)),
            Family::DehumidifierDem | Family::DehumidifierDf => {
                DeviceData::Dehumidifier(dehumidifier::parse(&view))
            }
            Family::Unknown => DeviceData::Unknown,
        }
    }

    pub fn power_switch(&self) -> i64 {
        match self {
            DeviceData::Split(d) => d.power_switch,
            DeviceData::FreshAir(d) => d.ac.power_switch,
            DeviceData::Portable(d) => d.power_switch,
            DeviceData::Window(d) => d.power_switch,
            DeviceData::Dehumidifier(d) => d.power_switch,
            DeviceData::Unknown => shadow::NOT_SET,
        }
    }

    pub fn work_mode(&self) -> i64 {
        match self {
            DeviceData::Split(d) => d.work_mode,
            DeviceData::FreshAir(d) => d.ac.work_mode,
            DeviceData::Portable(d) => d.work_mode,
            DeviceData::Window(d) => d.work_mode,
            DeviceData::Dehumidifier(d) => d.work_mode,
            DeviceData::Unknown => shadow::NOT_SET,
        }
    }

    pub fn target_celsius(&self) -> Option<f64> {
        match self {
            DeviceData::Split(d) => Some(d.target_temperature),
            DeviceData::FreshAir(d) => Some(d.ac.target_temperature),
            DeviceData::Portable(d) => Some(d.target_celsius_degree),
            DeviceData::Window(d) => Some(d.target_temperature),
            DeviceData::Dehumidifier(_) | DeviceData::Unknown => None,
        }
    }

    pub fn current_celsius(&self) -> Option<f64> {
        match self {
            DeviceData::Split(d) => d.current_temperature,
            DeviceData::FreshAir(d) => d.ac.current_temperature,
            DeviceData::Portable(d) => d.current_temperature,
            DeviceData::Window(d) => d.current_temperature,
            DeviceData::Dehumidifier(_) | DeviceData::Unknown => None,
        }
    }

    /// Temperature bounds reported by the unit, if the family has any.
    pub fn temperature_limits(&self) -> Option<(f64, f64)> {
        match self {
            DeviceData::Split(d) => Some((d.lower_temperature_limit, d.upper_temperature_limit)),
            DeviceData::FreshAir(d) => Some((d.ac.lower_temperature_limit, d.ac.upper_temperature_limit)),
            DeviceData::Portable(d) => Some((d.lower_temperature_limit, d.upper_temperature_limit)),
            DeviceData::Window(d) => Some((d.lower_temperature_limit, d.upper_temperature_limit)),
            DeviceData::Dehumidifier(_) | DeviceData::Unknown => None,
        }
    }
}

/// One appliance as seen at a single poll.
#[derive(Debug, Clone)]
pub struct Device {
    pub device_id: String,
    pub name: String,
    pub family: Family,
    pub product_key: String,
    pub firmware_version: String,
    pub is_online: bool,
    pub capabilities: Vec<i64>,
    pub features: FeatureSet,
    pub mode_map: ModeMap,
    pub data: DeviceData,
    pub storage: DeviceStorage,
    pub shadow: Value,
}

impl Device {
    pub fn build(thing: &Thing, shadow: Value, storage: DeviceStorage) -> Self {
        let family = thing.family();
        let view = ShadowView::new(&shadow);
        let capabilities = view.capabilities();
        let mut features = resolve_features(
            family,
            &view.reported_keys(),
            &capabilities,
            storage.probed_fan_speeds(),
        );
        if family.is_supported() {
            if storage.non_user_config.work_time.enabled {
                features.insert(DeviceFeature::SensorWorkTime);
            }
            if storage.non_user_config.power_consumption.enabled {
                features.insert(DeviceFeature::SensorPowerConsumption);
            }
        }
        let mode_map = ModeMap::build(family, &features);
        let data = DeviceData::parse(family, &shadow);
        Self {
            device_id: thing.device_id.clone(),
            name: thing.display_name().to_string(),
            family,
            product_key: thing.product_key.clone(),
            firmware_version: thing.firmware_version.clone(),
            is_online: thing.is_online,
            capabilities,
            features,
            mode_map,
            data,
            storage,
            shadow,
        }
    }

    pub fn has(&self, feature: DeviceFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_on(&self) -> bool {
        self.data.power_switch() == 1
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode_map.to_mode(self.data.work_mode())
    }

    pub fn supported_modes(&self) -> Vec<Mode> {
        self.mode_map.supported_modes()
    }
}

/// Desired patch for switching `device` to `mode`.
pub fn mode_change(device: &Device, desired: Map<String, Value>, mode: Mode) -> Result<Map<String, Value>> {
    if !device.family.is_supported() {
        return Err(Error::UnsupportedDevice(device.device_id.clone()));
    }
    let work_mode = device
        .mode_map
        .to_int(mode)
        .ok_or_else(|| Error::invalid(format!("mode {} is not supported by this device", mode.as_str())))?;
    let storage = &device.storage;
    Ok(match device.family {
        Family::SplitAc | Family::DuctAc => split::mode_change(desired, mode, work_mode, &device.features, storage),
        Family::SplitAcFreshAir => fresh_air::mode_change(desired, mode, work_mode, storage),
        Family::PortableAc => portable::mode_change(desired, mode, work_mode, storage),
        Family::WindowAc => window::mode_change(desired, mode, work_mode, storage),
        Family::DehumidifierDem | Family::DehumidifierDf => {
            dehumidifier::mode_change(desired, mode, work_mode, storage)
        }
        Family::Unknown => desired,
    })
}

/// Fills storage fields derived from the shadow. Returns whether anything
/// changed.
pub fn seed_storage(family: Family, data: &DeviceData, mode: Option<Mode>, storage: &mut DeviceStorage) -> bool {
    let before = storage.clone();
    if let Some((min, max)) = data.temperature_limits() {
        let nuc = &mut storage.non_user_config;
        nuc.min_celsius_temp = Some(min);
        nuc.max_celsius_temp = Some(max);
        nuc.native_temp_step.get_or_insert(1.0);
    }
    if let Some(mode) = mode {
        if family.is_air_conditioner()
            && let Some(t) = data.target_celsius()
            && storage.remembered_temperature(mode).is_none()
        {
            storage.remember_temperature(mode, t);
        }
        if let DeviceData::Dehumidifier(d) = data
            && d.humidity >= 0
            && storage.remembered_humidity(mode).is_none()
        {
            storage.remember_humidity(mode, d.humidity as f64);
        }
    }
    *storage != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thing(name: &str) -> Thing {
        serde_json::from_value(json!({"deviceId": "d1", "deviceName": name, "isOnline": 1})).unwrap()
    }

    #[test]
    fn family_from_device_name() {
        assert_eq!(Family::from_device_name("Split AC"), Family::SplitAc);
        assert_eq!(Family::from_device_name("split ac fresh air"), Family::SplitAcFreshAir);
        assert_eq!(Family::from_device_name("Portable AC"), Family::PortableAc);
        assert_eq!(Family::from_device_name("Window AC"), Family::WindowAc);
        assert_eq!(Family::from_device_name("Dehumidifier DEM"), Family::DehumidifierDem);
        assert_eq!(Family::from_device_name("Dehumidifier DF"), Family::DehumidifierDf);
        assert_eq!(Family::from_device_name("Duct AC"), Family::DuctAc);
        assert_eq!(Family::from_device_name("Fridge"), Family::Unknown);
    }

    #[test]
    fn split_device_build() {
        let shadow = json!({"state": {"reported": {
            "powerSwitch": 0, "workMode": 1, "targetTemperature": 24,
            "currentTemperature": 25, "windSpeed": 0
        }}});
        let device = Device::build(&thing("Split AC"), shadow, DeviceStorage::default());
        assert_eq!(device.family, Family::SplitAc);
        assert!(device.has(DeviceFeature::Climate));
        assert!(device.has(DeviceFeature::ModeAcCool));
        assert_eq!(device.mode(), Some(Mode::Cool));
        assert!(!device.is_on());
    }

    #[test]
    fn unknown_family_rejects_mode_change() {
        let device = Device::build(&thing("Fridge"), json!({}), DeviceStorage::default());
        assert!(device.features.is_empty());
        let err = mode_change(&device, Map::new(), Mode::Cool).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDevice(_)));
    }

    #[test]
    fn unsupported_mode_is_invalid_input() {
        let device = Device::build(&thing("Window AC"), json!({}), DeviceStorage::default());
        let err = mode_change(&device, Map::new(), Mode::Heat).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn seed_storage_records_limits_and_current_target() {
        let shadow = json!({"state": {"reported": {"workMode": 1, "targetTemperature": 22, "upperTemperatureLimit": 30}}});
        let data = DeviceData::parse(Family::SplitAc, &shadow);
        let mut storage = DeviceStorage::default();
        assert!(seed_storage(Family::SplitAc, &data, Some(Mode::Cool), &mut storage));
        assert_eq!(storage.max_celsius(), 30.0);
        assert_eq!(storage.remembered_temperature(Mode::Cool), Some(22.0));
        assert!(!seed_storage(Family::SplitAc, &data, Some(Mode::Cool), &mut storage));
    }

    #[test]
    fn stats_flags_add_sensor_features() {
        let mut storage = DeviceStorage::default();
        storage.non_user_config.work_time.enabled = true;
        let device = Device::build(&thing("Split AC"), json!({}), storage);
        assert!(device.has(DeviceFeature::SensorWorkTime));
        assert!(!device.has(DeviceFeature::SensorPowerConsumption));
    }
}
