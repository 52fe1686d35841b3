use super::paths::keys;
use super::{AppError, Colour};
use crate::payload::{FieldValue, Payload};

/// Colour settings chosen on the phone. Unset fields leave the watch's
/// current colour alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchFaceConfig {
    pub background: Option<Colour>,
    pub date_time: Option<Colour>,
}

impl WatchFaceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_background(mut self, colour: Colour) -> Self {
        self.background = Some(colour);
        self
    }

    pub fn with_date_time_colour(mut self, colour: Colour) -> Self {
        self.date_time = Some(colour);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.background.is_none() && self.date_time.is_none()
    }

    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        if let Some(colour) = self.background {
            payload.insert(keys::BACKGROUND_COLOUR, FieldValue::Str(colour.to_string()));
        }
        if let Some(colour) = self.date_time {
            payload.insert(keys::DATE_TIME_COLOUR, FieldValue::Str(colour.to_string()));
        }
        payload
    }

    pub fn from_payload(payload: &Payload) -> Result<Self, AppError> {
        Ok(Self {
            background: colour_field(payload, keys::BACKGROUND_COLOUR)?,
            date_time: colour_field(payload, keys::DATE_TIME_COLOUR)?,
        })
    }
}

fn colour_field(payload: &Payload, key: &str) -> Result<Option<Colour>, AppError> {
    match payload.get(key) {
        None => Ok(None),
        Some(FieldValue::Str(text)) => Ok(Some(text.parse()?)),
        Some(_) => Err(AppError::WrongFieldType {
            key: key.to_string(),
            expected: "str",
        }),
    }
}
