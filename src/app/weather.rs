// Weather - The report the phone publishes and the watch displays

use super::paths::keys;
use super::AppError;
use crate::payload::{FieldValue, Payload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// WEATHER CONDITION
// ============================================================================

/// Display condition derived from an OpenWeatherMap-style condition id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherCondition {
    Storm,
    LightRain,
    Rain,
    Snow,
    Fog,
    Clear,
    LightClouds,
    Clouds,
    Unknown,
}

impl WeatherCondition {
    pub fn from_id(weather_id: i32) -> Self {
        match weather_id {
            200..=232 => Self::Storm,
            300..=321 => Self::LightRain,
            500..=504 => Self::Rain,
            511 => Self::Snow,
            520..=531 => Self::Rain,
            600..=622 => Self::Snow,
            701..=761 => Self::Fog,
            781 => Self::Storm,
            800 => Self::Clear,
            801 => Self::LightClouds,
            802..=804 => Self::Clouds,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Storm => "storm",
            Self::LightRain => "light rain",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Fog => "fog",
            Self::Clear => "clear",
            Self::LightClouds => "light clouds",
            Self::Clouds => "clouds",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// WEATHER REPORT
// ============================================================================

/// Today's weather as carried on the weather-data path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub weather_id: i32,
    /// Formatted high temperature, e.g. "25°"
    pub high: String,
    pub low: String,
    /// Milliseconds since the epoch when the watch received the report
    pub update_time: Option<i64>,
}

impl WeatherReport {
    pub fn new(weather_id: i32, high: impl Into<String>, low: impl Into<String>) -> Self {
        Self {
            weather_id,
            high: high.into(),
            low: low.into(),
            update_time: None,
        }
    }

    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_id(self.weather_id)
    }

    /// Set the receive time unless the report already carries one
    pub fn stamped(mut self, now_ms: i64) -> Self {
        self.update_time.get_or_insert(now_ms);
        self
    }

    pub fn to_payload(&self) -> Payload {
        let payload = Payload::new()
            .with_int(keys::WEATHER_ID, self.weather_id)
            .with_string(keys::WEATHER_TEMP_MAX, self.high.as_str())
            .with_string(keys::WEATHER_TEMP_MIN, self.low.as_str());

        match self.update_time {
            Some(time) => payload.with_long(keys::WEATHER_UPDATE_TIME, time),
            None => payload,
        }
    }

    pub fn from_payload(payload: &Payload) -> Result<Self, AppError> {
        let weather_id = match required(payload, keys::WEATHER_ID)? {
            FieldValue::Int(id) => *id,
            _ => return Err(wrong_type(keys::WEATHER_ID, "int")),
        };
        let high = required_string(payload, keys::WEATHER_TEMP_MAX)?;
        let low = required_string(payload, keys::WEATHER_TEMP_MIN)?;

        let update_time = match payload.get(keys::WEATHER_UPDATE_TIME) {
            None => None,
            Some(FieldValue::Long(time)) => Some(*time),
            Some(_) => return Err(wrong_type(keys::WEATHER_UPDATE_TIME, "long")),
        };

        Ok(Self {
            weather_id,
            high,
            low,
            update_time,
        })
    }
}

fn required<'a>(payload: &'a Payload, key: &str) -> Result<&'a FieldValue, AppError> {
    payload
        .get(key)
        .ok_or_else(|| AppError::MissingField(key.to_string()))
}

fn required_string(payload: &Payload, key: &str) -> Result<String, AppError> {
    required(payload, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(key, "str"))
}

fn wrong_type(key: &str, expected: &'static str) -> AppError {
    AppError::WrongFieldType {
        key: key.to_string(),
        expected,
    }
}

// ============================================================================
// WEATHER SOURCE TRAIT
// ============================================================================

/// Where the phone gets today's weather from
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self) -> Result<WeatherReport, AppError>;
}

// ============================================================================
// STATIC WEATHER SOURCE
// ============================================================================

/// Weather source serving a fixed (replaceable) report
pub struct StaticWeatherSource {
    report: Mutex<WeatherReport>,
    failure_message: Option<String>,
    call_count: AtomicUsize,
}

impl StaticWeatherSource {
    pub fn new(report: WeatherReport) -> Self {
        Self {
            report: Mutex::new(report),
            failure_message: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Configure to always fail with a message
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure_message = Some(message.into());
        self
    }

    /// Replace the report served from now on
    pub fn set_report(&self, report: WeatherReport) {
        *self.report.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = report;
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for StaticWeatherSource {
    async fn current(&self) -> Result<WeatherReport, AppError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.failure_message {
            return Err(AppError::WeatherSource(message.clone()));
        }
        Ok(self
            .report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}
