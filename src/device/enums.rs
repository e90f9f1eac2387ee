use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mode {
    Auto,
    Cool,
    Dehumidification,
    Fan,
    Heat,
    Dry,
    Turbo,
    Comfort,
    Continue,
}

impl Mode {
    pub const AC_ORDER: [Mode; 5] = [
        Mode::Auto,
        Mode::Cool,
        Mode::Dehumidification,
        Mode::Fan,
        Mode::Heat,
    ];

    pub const DEHUMIDIFIER_ORDER: [Mode; 4] = [Mode::Dry, Mode::Turbo, Mode::Comfort, Mode::Continue];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "Auto",
            Mode::Cool => "Cool",
            Mode::Dehumidification => "Dehumidification",
            Mode::Fan => "Fan",
            Mode::Heat => "Heat",
            Mode::Dry => "Dry",
            Mode::Turbo => "Turbo",
            Mode::Comfort => "Comfort",
            Mode::Continue => "Continue",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let all = Self::AC_ORDER.iter().chain(Self::DEHUMIDIFIER_ORDER.iter());
        all.copied().find(|m| m.as_str().eq_ignore_ascii_case(s))
    }
}

/// Fan speed of the legacy split unit, encoded across four shadow fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanSpeed {
    Strong,
    High,
    MidHigh,
    Med,
    MidLow,
    Low,
    Mute,
    Auto,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 8] = [
        FanSpeed::Strong,
        FanSpeed::High,
        FanSpeed::MidHigh,
        FanSpeed::Med,
        FanSpeed::MidLow,
        FanSpeed::Low,
        FanSpeed::Mute,
        FanSpeed::Auto,
    ];

    /// `(windSpeed, turbo, silenceSwitch, highTemperatureWind)`.
    pub fn encode(&self) -> (i64, i64, i64, i64) {
        match self {
            FanSpeed::Strong => (6, 1, 0, 0),
            FanSpeed::High => (6, 0, 0, 0),
            FanSpeed::MidHigh => (5, 0, 0, 0),
            FanSpeed::Med => (4, 0, 0, 0),
            FanSpeed::MidLow => (3, 0, 0, 0),
            FanSpeed::Low => (2, 0, 0, 0),
            FanSpeed::Mute => (2, 0, 1, 0),
            FanSpeed::Auto => (0, 0, 0, 0),
        }
    }

    pub fn to_desired(&self) -> Map<String, Value> {
        let (wind, turbo, silence, htw) = self.encode();
        let mut out = Map::new();
        out.insert("windSpeed".into(), json!(wind));
        out.insert("turbo".into(), json!(turbo));
        out.insert("silenceSwitch".into(), json!(silence));
        out.insert("highTemperatureWind".into(), json!(htw));
        out
    }

    pub fn decode(wind_speed: i64, turbo: i64, silence: i64) -> Option<Self> {
        if turbo == 1 {
            return Some(FanSpeed::Strong);
        }
        if silence == 1 {
            return Some(FanSpeed::Mute);
        }
        match wind_speed {
            0 => Some(FanSpeed::Auto),
            2 => Some(FanSpeed::Low),
            3 => Some(FanSpeed::MidLow),
            4 => Some(FanSpeed::Med),
            5 => Some(FanSpeed::MidHigh),
            6 => Some(FanSpeed::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FanSpeed::Strong => "strong",
            FanSpeed::High => "high",
            FanSpeed::MidHigh => "mid_high",
            FanSpeed::Med => "medium",
            FanSpeed::MidLow => "mid_low",
            FanSpeed::Low => "low",
            FanSpeed::Mute => "mute",
            FanSpeed::Auto => "auto",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindSpeed7Gear {
    Auto,
    Gear(u8),
}

impl WindSpeed7Gear {
    pub fn new_gear(gear: u8) -> Option<Self> {
        (1..=7).contains(&gear).then_some(WindSpeed7Gear::Gear(gear))
    }

    pub fn to_desired(&self) -> Map<String, Value> {
        let mut out = Map::new();
        match self {
            WindSpeed7Gear::Auto => {
                out.insert("windSpeedAutoSwitch".into(), json!(1));
                out.insert("windSpeed7Gear".into(), json!(0));
            }
            WindSpeed7Gear::Gear(g) => {
                out.insert("windSpeedAutoSwitch".into(), json!(0));
                out.insert("windSpeed7Gear".into(), json!(*g));
            }
        }
        out
    }

    pub fn decode(auto_switch: i64, gear: i64) -> Self {
        if auto_switch == 1 || !(1..=7).contains(&gear) {
            WindSpeed7Gear::Auto
        } else {
            WindSpeed7Gear::Gear(gear as u8)
        }
    }

    pub fn as_str(&self) -> String {
        match self {
            WindSpeed7Gear::Auto => "auto".to_string(),
            WindSpeed7Gear::Gear(g) => format!("{g}"),
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        if s == "auto" {
            return Some(WindSpeed7Gear::Auto);
        }
        s.parse().ok().and_then(Self::new_gear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanLevel {
    Auto,
    Low,
    Medium,
    High,
}

impl FanLevel {
    pub fn value(&self) -> i64 {
        match self {
            FanLevel::Auto => 0,
            FanLevel::Low => 1,
            FanLevel::Medium => 2,
            FanLevel::High => 3,
        }
    }

    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            0 => Some(FanLevel::Auto),
            1 => Some(FanLevel::Low),
            2 => Some(FanLevel::Medium),
            3 => Some(FanLevel::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FanLevel::Auto => "auto",
            FanLevel::Low => "low",
            FanLevel::Medium => "medium",
            FanLevel::High => "high",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(FanLevel::Auto),
            "low" => Some(FanLevel::Low),
            "medium" | "med" => Some(FanLevel::Medium),
            "high" => Some(FanLevel::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerticalSwing {
    NotSet,
    UpAndDownSwing,
    UpwardsSwing,
    DownwardsSwing,
    Top,
    Upper,
    Middle,
    Lower,
    Bottom,
}

impl VerticalSwing {
    /// `(verticalSwitch, verticalDirection)`.
    pub fn encode(&self) -> (i64, i64) {
        match self {
            VerticalSwing::NotSet => (0, 8),
            VerticalSwing::UpAndDownSwing => (1, 1),
            VerticalSwing::UpwardsSwing => (1, 2),
            VerticalSwing::DownwardsSwing => (1, 3),
            VerticalSwing::Top => (0, 9),
            VerticalSwing::Upper => (0, 10),
            VerticalSwing::Middle => (0, 11),
            VerticalSwing::Lower => (0, 12),
            VerticalSwing::Bottom => (0, 13),
        }
    }

    pub fn decode(direction: i64) -> Self {
        match direction {
            1 => VerticalSwing::UpAndDownSwing,
            2 => VerticalSwing::UpwardsSwing,
            3 => VerticalSwing::DownwardsSwing,
            9 => VerticalSwing::Top,
            10 => VerticalSwing::Upper,
            11 => VerticalSwing::Middle,
            12 => VerticalSwing::Lower,
            13 => VerticalSwing::Bottom,
            _ => VerticalSwing::NotSet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HorizontalSwing {
    NotSet,
    LeftAndRightSwing,
    LeftwardsSwing,
    RightwardsSwing,
    Left,
    CenterLeft,
    Center,
    CenterRight,
    Right,
}

impl HorizontalSwing {
    /// `(horizontalSwitch, horizontalDirection)`.
    pub fn encode(&self) -> (i64, i64) {
        match self {
            HorizontalSwing::NotSet => (0, 8),
            HorizontalSwing::LeftAndRightSwing => (1, 1),
            HorizontalSwing::LeftwardsSwing => (1, 2),
            HorizontalSwing::RightwardsSwing => (1, 3),
            HorizontalSwing::Left => (0, 9),
            HorizontalSwing::CenterLeft => (0, 10),
            HorizontalSwing::Center => (0, 11),
            HorizontalSwing::CenterRight => (0, 12),
            HorizontalSwing::Right => (0, 13),
        }
    }

    pub fn decode(direction: i64) -> Self {
        match direction {
            1 => HorizontalSwing::LeftAndRightSwing,
            2 => HorizontalSwing::LeftwardsSwing,
            3 => HorizontalSwing::RightwardsSwing,
            9 => HorizontalSwing::Left,
            10 => HorizontalSwing::CenterLeft,
            11 => HorizontalSwing::Center,
            12 => HorizontalSwing::CenterRight,
            13 => HorizontalSwing::Right,
            _ => HorizontalSwing::NotSet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SleepMode {
    Off,
    Standard,
    Elderly,
    Child,
}

impl SleepMode {
    pub fn value(&self) -> i64 {
        match self {
            SleepMode::Off => 0,
            SleepMode::Standard => 1,
            SleepMode::Elderly => 2,
            SleepMode::Child => 3,
        }
    }

    pub fn from_value(v: i64) -> Self {
        match v {
            1 => SleepMode::Standard,
            2 => SleepMode::Elderly,
            3 => SleepMode::Child,
            _ => SleepMode::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneratorMode {
    None,
    L1,
    L2,
    L3,
}

impl GeneratorMode {
    pub fn value(&self) -> i64 {
        match self {
            GeneratorMode::None => 0,
            GeneratorMode::L1 => 1,
            GeneratorMode::L2 => 2,
            GeneratorMode::L3 => 3,
        }
    }

    pub fn from_value(v: i64) -> Self {
        match v {
            1 => GeneratorMode::L1,
            2 => GeneratorMode::L2,
            3 => GeneratorMode::L3,
            _ => GeneratorMode::None,
        }
    }
}

/// Airflow pattern of the fresh-air unit, carried in `softWind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindFeeling {
    None,
    Soft,
    Breeze,
    Carpet,
    Surround,
}

impl WindFeeling {
    pub fn value(&self) -> i64 {
        match self {
            WindFeeling::None => 0,
            WindFeeling::Soft => 1,
            WindFeeling::Breeze => 2,
            WindFeeling::Carpet => 3,
            WindFeeling::Surround => 4,
        }
    }

    pub fn from_value(v: i64) -> Self {
        match v {
            1 => WindFeeling::Soft,
            2 => WindFeeling::Breeze,
            3 => WindFeeling::Carpet,
            4 => WindFeeling::Surround,
            _ => WindFeeling::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreshAir {
    Off,
    Auto,
    Strength(u8),
}

impl FreshAir {
    pub const MAX_STRENGTH: u8 = 3;

    pub fn to_desired(&self) -> Map<String, Value> {
        let mut out = Map::new();
        match self {
            FreshAir::Off => {
                out.insert("newWindSwitch".into(), json!(0));
            }
            FreshAir::Auto => {
                out.insert("newWindSwitch".into(), json!(1));
                out.insert("newWindAutoSwitch".into(), json!(1));
            }
            FreshAir::Strength(s) => {
                out.insert("newWindSwitch".into(), json!(1));
                out.insert("newWindAutoSwitch".into(), json!(0));
                out.insert("newWindStrength".into(), json!(*s));
            }
        }
        out
    }

    pub fn decode(switch: i64, auto: i64, strength: i64) -> Self {
        if switch != 1 {
            FreshAir::Off
        } else if auto == 1 || !(1..=i64::from(Self::MAX_STRENGTH)).contains(&strength) {
            FreshAir::Auto
        } else {
            FreshAir::Strength(strength as u8)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn value(&self) -> i64 {
        match self {
            TemperatureUnit::Celsius => 0,
            TemperatureUnit::Fahrenheit => 1,
        }
    }

    pub fn from_value(v: i64) -> Self {
        if v == 1 {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }
}

pub fn celsius_to_fahrenheit(c: f64) -> i64 {
    (c * 9.0 / 5.0 + 32.0).round() as i64
}
