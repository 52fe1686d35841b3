// Phone Companion - Publishes weather and face settings, answers requests

use super::paths::{WATCH_FACE_CONFIG_PATH, WEATHER_DATA_PATH, WEATHER_REQUEST_PATH};
use super::{AppError, WatchFaceConfig, WeatherReport, WeatherSource};
use crate::messaging::SendOutcome;
use crate::replication::{DataEventKind, DataItem};
use crate::session::{ReceivedMessage, SessionEvent, SessionEvents, SyncSession};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The phone side. Sole writer of weather-data and watch-face-config.
pub struct PhoneCompanion<S: WeatherSource> {
    session: SyncSession,
    source: Arc<S>,
}

impl<S: WeatherSource> Clone for PhoneCompanion<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            source: self.source.clone(),
        }
    }
}

impl<S: WeatherSource> PhoneCompanion<S> {
    pub fn new(session: SyncSession, source: Arc<S>) -> Self {
        Self { session, source }
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Fetch current weather and publish it as the replicated item
    pub async fn publish_weather(&self) -> Result<WeatherReport, AppError> {
        let report = self.source.current().await?;
        let item = self
            .session
            .put(WEATHER_DATA_PATH, &report.to_payload())
            .await?;

        info!(
            node = %self.session.node_id(),
            version = item.version(),
            weather_id = report.weather_id,
            "weather published"
        );
        Ok(report)
    }

    pub async fn publish_watch_face_config(
        &self,
        config: &WatchFaceConfig,
    ) -> Result<DataItem, AppError> {
        let item = self
            .session
            .put(WATCH_FACE_CONFIG_PATH, &config.to_payload())
            .await?;

        info!(node = %self.session.node_id(), version = item.version(), "watch face config published");
        Ok(item)
    }

    /// React to one session event
    pub async fn handle_event(&self, event: &SessionEvent) -> Result<(), AppError> {
        match event {
            SessionEvent::DataChanged { changes, .. } => {
                let requested = changes
                    .iter()
                    .any(|c| c.path == WEATHER_REQUEST_PATH && c.kind == DataEventKind::Updated);
                if requested {
                    self.publish_weather().await?;
                }
                Ok(())
            }
            SessionEvent::MessageReceived(message) if message.path == WEATHER_REQUEST_PATH => {
                self.reply_with_weather(message).await
            }
            _ => Ok(()),
        }
    }

    async fn reply_with_weather(&self, request: &ReceivedMessage) -> Result<(), AppError> {
        let report = self.source.current().await?;
        let receipt = self
            .session
            .reply(request, WEATHER_DATA_PATH, &report.to_payload());

        match receipt.outcome().await {
            SendOutcome::Delivered => {
                debug!(peer = %request.source, "weather reply delivered");
            }
            SendOutcome::Failed(err) => {
                warn!(peer = %request.source, error = %err, "weather reply failed");
            }
        }
        Ok(())
    }

    /// Handle events until the event stream closes
    pub async fn run(&self, mut events: SessionEvents) {
        while let Some(event) = events.recv().await {
            if let Err(err) = self.handle_event(&event).await {
                warn!(node = %self.session.node_id(), error = %err, "phone event handling failed");
            }
        }
    }
}
