use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use facet_core::{AnalysisOutcome, AnalysisReport, ChatContext, ConsultantBot, LandmarkSet};
use zbus::interface;

use crate::engine::EngineHandle;
use crate::history::AnalysisStore;

pub const BUS_NAME: &str = "org.facet.Consultant1";
pub const OBJECT_PATH: &str = "/org/facet/Consultant1";

/// D-Bus interface for the facet analysis daemon.
///
/// Bus name: org.facet.Consultant1
/// Object path: /org/facet/Consultant1
pub struct ConsultantService {
    engine: EngineHandle,
    store: Arc<dyn AnalysisStore>,
    bot: ConsultantBot,
    started: Instant,
}

impl ConsultantService {
    pub fn new(engine: EngineHandle, store: Arc<dyn AnalysisStore>) -> Self {
        let bot = ConsultantBot::new(engine.analyzer().menu().clone());
        Self { engine, store, bot, started: Instant::now() }
    }
}

/// Accepts one landmark set (a JSON array of points) or several (an array
/// of arrays). An empty string means "detect".
fn parse_landmarks(json: &str) -> Result<Option<Vec<LandmarkSet>>, serde_json::Error> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(None);
    }
    LandmarkSet::parse_json(json).map(Some)
}

/// A previous analysis report or a bare `ChatContext`; empty means none.
fn parse_context(json: &str) -> Result<Option<ChatContext>, serde_json::Error> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(None);
    }
    if let Ok(report) = serde_json::from_str::<AnalysisReport>(json) {
        return Ok(Some(ChatContext::from(&report)));
    }
    serde_json::from_str(json).map(Some)
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(format!("serialisation failed: {e}")))
}

#[interface(name = "org.facet.Consultant1")]
impl ConsultantService {
    /// Analyse the image at `image_path`. `landmarks_json` may carry the
    /// landmark sets; when empty the daemon's detector is used.
    async fn analyze(&self, image_path: &str, landmarks_json: &str) -> zbus::fdo::Result<String> {
        tracing::info!(image_path, "analyze requested");
        let faces = parse_landmarks(landmarks_json)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("landmarks: {e}")))?;

        let outcome = self
            .engine
            .analyze(PathBuf::from(image_path), faces)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        if let AnalysisOutcome::Report(report) = &outcome {
            let record = self.store.record(image_path, report);
            tracing::info!(id = %record.id, face_shape = %report.face_shape, "analysis stored");
        }
        to_json(&outcome)
    }

    /// Answer a chat message, optionally personalised by a previous
    /// analysis.
    async fn chat(&self, message: &str, context_json: &str) -> zbus::fdo::Result<String> {
        tracing::debug!(len = message.len(), "chat requested");
        let context =
            parse_context(context_json).map_err(|e| zbus::fdo::Error::InvalidArgs(format!("context: {e}")))?;
        Ok(self.bot.respond(message, context.as_ref()))
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let analyzer = self.engine.analyzer();
        to_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": self.started.elapsed().as_secs(),
            "oracles": analyzer.registry().loaded(),
            "detector": analyzer.has_detector(),
            "free_slots": self.engine.free_slots(),
            "landmark_convention": facet_core::landmarks::CONVENTION,
            "analyses_stored": self.store.len(),
        }))
    }

    /// Most recent analyses, newest first.
    async fn history(&self, limit: u32) -> zbus::fdo::Result<String> {
        to_json(&self.store.recent(limit as usize))
    }
}
