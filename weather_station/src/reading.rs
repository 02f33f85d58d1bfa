use serde::Deserialize;

/// One poll cycle's worth of weather data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: i8,
    /// Hectopascals.
    pub pressure: i16,
    /// Metres per second.
    pub wind_speed: f32,
    /// Meteorological degrees.
    pub wind_direction: i16,
}

/// How an API integer is fitted into the narrower reading field.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Narrowing {
    /// Keep the low bits (two's-complement truncation).
    #[default]
    Wrap,
    /// Clamp to the target type's range.
    Saturate,
}

impl Narrowing {
    pub fn to_i8(self, value: i64) -> i8 {
        match self {
            Narrowing::Wrap => value as i8,
            Narrowing::Saturate => value.clamp(i64::from(i8::MIN), i64::from(i8::MAX)) as i8,
        }
    }

    pub fn to_i16(self, value: i64) -> i16 {
        match self {
            Narrowing::Wrap => value as i16,
            Narrowing::Saturate => value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16,
        }
    }
}
