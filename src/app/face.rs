// Watch Face - What the watch shows, as text and colours
//
// Holds the configured colours and the last weather received. Ambient mode
// falls back to the default colours and hides seconds.

use super::{Colour, WatchFaceConfig, WeatherCondition, WeatherReport};
use chrono::NaiveDateTime;
use serde::Serialize;

pub const DEFAULT_BACKGROUND: Colour = Colour::BLACK;
pub const DEFAULT_DATE_TIME: Colour = Colour::WHITE;

/// One rendered frame of the face
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FaceFrame {
    /// "HH.MM" or "HH.MM.SS"
    pub time: String,
    /// e.g. "18.10.2026"
    pub date: String,
    pub high: Option<String>,
    pub low: Option<String>,
    pub condition: Option<WeatherCondition>,
    pub background: String,
    pub date_time_colour: String,
    pub ambient: bool,
}

#[derive(Clone, Debug)]
pub struct WatchFace {
    background: Colour,
    date_time: Colour,
    weather: Option<WeatherReport>,
    ambient: bool,
    show_seconds: bool,
}

impl Default for WatchFace {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND,
            date_time: DEFAULT_DATE_TIME,
            weather: None,
            ambient: false,
            show_seconds: true,
        }
    }
}

impl WatchFace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the colours present in a config update
    pub fn apply_config(&mut self, config: &WatchFaceConfig) {
        if let Some(colour) = config.background {
            self.background = colour;
        }
        if let Some(colour) = config.date_time {
            self.date_time = colour;
        }
    }

    pub fn apply_weather(&mut self, report: WeatherReport) {
        self.weather = Some(report);
    }

    pub fn set_ambient(&mut self, ambient: bool) {
        self.ambient = ambient;
    }

    pub fn set_show_seconds(&mut self, show: bool) {
        self.show_seconds = show;
    }

    pub fn weather(&self) -> Option<&WeatherReport> {
        self.weather.as_ref()
    }

    pub fn is_ambient(&self) -> bool {
        self.ambient
    }

    /// Background currently in effect
    pub fn background(&self) -> Colour {
        if self.ambient {
            DEFAULT_BACKGROUND
        } else {
            self.background
        }
    }

    /// Date and time colour currently in effect
    pub fn date_time_colour(&self) -> Colour {
        if self.ambient {
            DEFAULT_DATE_TIME
        } else {
            self.date_time
        }
    }

    pub fn frame(&self, now: &NaiveDateTime) -> FaceFrame {
        let time_format = if self.show_seconds && !self.ambient {
            "%H.%M.%S"
        } else {
            "%H.%M"
        };

        FaceFrame {
            time: now.format(time_format).to_string(),
            date: now.format("%d.%m.%Y").to_string(),
            high: self.weather.as_ref().map(|w| w.high.clone()),
            low: self.weather.as_ref().map(|w| w.low.clone()),
            condition: self.weather.as_ref().map(WeatherReport::condition),
            background: self.background().to_string(),
            date_time_colour: self.date_time_colour().to_string(),
            ambient: self.ambient,
        }
    }
}
