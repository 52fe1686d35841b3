//! Paths and payload keys shared by both companions.

/// Watch asks the phone for fresh weather
pub const WEATHER_REQUEST_PATH: &str = "weather-data-request";

/// Current weather, written by the phone only
pub const WEATHER_DATA_PATH: &str = "weather-data";

/// Watch face colours, written by the phone only
pub const WATCH_FACE_CONFIG_PATH: &str = "watch-face-config";

pub mod keys {
    pub const WEATHER_ID: &str = "weather_id";
    pub const WEATHER_TEMP_MAX: &str = "weather_temp_max";
    pub const WEATHER_TEMP_MIN: &str = "weather_temp_min";
    /// Stamped by the receiving watch, not the phone
    pub const WEATHER_UPDATE_TIME: &str = "weather_update_time";

    pub const BACKGROUND_COLOUR: &str = "background_colour";
    pub const DATE_TIME_COLOUR: &str = "date_time_colour";

    /// Random per-request value so repeated requests still register as changes
    pub const REQUEST_ID: &str = "request_id";
}
