use serde_json::{Map, Value};

pub(crate) const NOT_SET: i64 = -1;

/// Every key the cloud is known to report across families.
pub const KNOWN_KEYS: &[&str] = &[
    "powerSwitch",
    "beepSwitch",
    "workMode",
    "targetTemperature",
    "targetFahrenheitTemp",
    "currentTemperature",
    "windSpeed",
    "windSpeed7Gear",
    "windSpeedAutoSwitch",
    "verticalSwitch",
    "verticalDirection",
    "horizontalSwitch",
    "horizontalDirection",
    "turbo",
    "silenceSwitch",
    "highTemperatureWind",
    "ECO",
    "AIECOSwitch",
    "sleep",
    "healthy",
    "antiMoldew",
    "selfClean",
    "screen",
    "lightSense",
    "softWind",
    "newWindSwitch",
    "newWindAutoSwitch",
    "newWindStrength",
    "generatorMode",
    "eightAddHot",
    "swingWind",
    "temperatureType",
    "targetCelsiusDegree",
    "targetFahrenheitDegree",
    "Humidity",
    "envHumidity",
    "waterPumpSwitch",
    "errorCode",
    "capabilities",
    "lowerTemperatureLimit",
    "upperTemperatureLimit",
    "externalUnitTemperature",
    "internalUnitCoilTemperature",
    "externalUnitCoilTemperature",
    "externalUnitExhaustTemperature",
];

#[derive(Debug, Clone, Copy)]
pub struct ShadowView<'a> {
    reported: Option<&'a Map<String, Value>>,
    delta: Option<&'a Map<String, Value>>,
}

impl<'a> ShadowView<'a> {
    pub fn new(shadow: &'a Value) -> Self {
        Self {
            reported: shadow.pointer("/state/reported").and_then(Value::as_object),
            delta: shadow.pointer("/state/delta").and_then(Value::as_object),
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.delta
            .and_then(|d| d.get(key))
            .or_else(|| self.reported.and_then(|r| r.get(key)))
    }

    /// Integer value, or `-1` when absent or not an integer.
    pub fn int(&self, key: &str) -> i64 {
        self.get(key).and_then(strict_int).unwrap_or(NOT_SET)
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        self.float(key).unwrap_or(default)
    }

    pub fn reported_keys(&self) -> Vec<&'a str> {
        self.reported
            .map(|r| r.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.reported.is_some_and(|r| r.contains_key(key))
    }

    pub fn capabilities(&self) -> Vec<i64> {
        match self.get("capabilities") {
            Some(Value::Array(items)) => items.iter().filter_map(strict_int).collect(),
            _ => Vec::new(),
        }
    }
}

fn strict_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Whole numbers become JSON integers, anything else stays a float.
pub(crate) fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Value::from(v as i64)
    } else {
        Value::from(v)
    }
}
