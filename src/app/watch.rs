// Watch Companion - Keeps the watch face fed from the phone
//
// The watch only learns the phone's peer id from an inbound message, so the
// first request always travels as a replicated item. Once the phone has been
// heard from, requests also go out as direct messages.

use super::paths::keys;
use super::paths::{WATCH_FACE_CONFIG_PATH, WEATHER_DATA_PATH, WEATHER_REQUEST_PATH};
use super::{AppError, FaceFrame, WatchFace, WatchFaceConfig, WeatherReport};
use crate::messaging::SendOutcome;
use crate::payload::Payload;
use crate::replication::DataEventKind;
use crate::session::{DataChange, SessionEvent, SessionEvents, SessionState, SyncSession};
use chrono::{NaiveDateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// The watch side. Writes weather-data-request only.
#[derive(Clone)]
pub struct WatchCompanion {
    session: SyncSession,
    face: Arc<Mutex<WatchFace>>,
}

impl WatchCompanion {
    pub fn new(session: SyncSession) -> Self {
        Self {
            session,
            face: Arc::new(Mutex::new(WatchFace::new())),
        }
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    fn lock_face(&self) -> MutexGuard<'_, WatchFace> {
        self.face.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current face state
    pub fn face(&self) -> WatchFace {
        self.lock_face().clone()
    }

    pub fn frame(&self, now: &NaiveDateTime) -> FaceFrame {
        self.lock_face().frame(now)
    }

    pub fn set_ambient(&self, ambient: bool) {
        self.lock_face().set_ambient(ambient);
    }

    /// Ask the phone for fresh weather
    pub async fn request_weather(&self) -> Result<(), AppError> {
        let request_id = hex::encode(rand::random::<[u8; 8]>());
        let request = Payload::new().with_string(keys::REQUEST_ID, request_id);
        self.session.put(WEATHER_REQUEST_PATH, &request).await?;

        if let Some(phone) = self.session.last_peer() {
            let receipt = self
                .session
                .send(&phone, WEATHER_REQUEST_PATH, &Payload::new());
            if let SendOutcome::Failed(err) = receipt.outcome().await {
                debug!(peer = %phone, error = %err, "weather request message not delivered");
            }
        }
        Ok(())
    }

    fn apply_weather(&self, payload: &Payload) -> Result<(), AppError> {
        let report =
            WeatherReport::from_payload(payload)?.stamped(Utc::now().timestamp_millis());
        debug!(weather_id = report.weather_id, high = %report.high, low = %report.low, "weather applied");
        self.lock_face().apply_weather(report);
        Ok(())
    }

    fn apply_change(&self, change: &DataChange) -> Result<(), AppError> {
        if change.kind != DataEventKind::Updated {
            return Ok(());
        }
        match change.path.as_str() {
            WEATHER_DATA_PATH => self.apply_weather(&change.payload),
            WATCH_FACE_CONFIG_PATH => {
                let config = WatchFaceConfig::from_payload(&change.payload)?;
                self.lock_face().apply_config(&config);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// React to one session event
    pub async fn handle_event(&self, event: &SessionEvent) -> Result<(), AppError> {
        match event {
            SessionEvent::StateChanged {
                to: SessionState::Connected,
                ..
            } => self.request_weather().await,
            SessionEvent::DataChanged { changes, .. } => {
                for change in changes {
                    if let Err(err) = self.apply_change(change) {
                        warn!(path = %change.path, version = change.version, error = %err, "ignoring bad update");
                    }
                }
                Ok(())
            }
            SessionEvent::MessageReceived(message) if message.path == WEATHER_DATA_PATH => {
                self.apply_weather(&message.payload)
            }
            _ => Ok(()),
        }
    }

    /// Handle events until the event stream closes
    pub async fn run(&self, mut events: SessionEvents) {
        while let Some(event) = events.recv().await {
            if let Err(err) = self.handle_event(&event).await {
                warn!(node = %self.session.node_id(), error = %err, "watch event handling failed");
            }
        }
    }
}
