// App module - WHAT THE PHONE AND WATCH DO WITH THE SYNC LAYER
// Weather and watch face settings flow phone -> watch; weather requests flow back

mod colour;
mod error;
mod face;
mod face_config;
mod phone;
pub mod paths;
mod watch;
mod weather;

pub use colour::{Colour, ColourError};
pub use error::AppError;
pub use face::{FaceFrame, WatchFace};
pub use face_config::WatchFaceConfig;
pub use phone::PhoneCompanion;
pub use watch::WatchCompanion;
pub use weather::{StaticWeatherSource, WeatherCondition, WeatherReport, WeatherSource};
