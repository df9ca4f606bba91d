//! Bounded in-memory record of completed analyses.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use facet_core::AnalysisReport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Image path the analysis was requested for.
    pub source: String,
    pub report: AnalysisReport,
}

/// Sink for completed analyses.
pub trait AnalysisStore: Send + Sync {
    fn record(&self, source: &str, report: &AnalysisReport) -> AnalysisRecord;
    /// Most recent first.
    fn recent(&self, limit: usize) -> Vec<AnalysisRecord>;
    fn len(&self) -> usize;
}

/// Keeps the newest `capacity` records; older ones are dropped.
pub struct MemoryStore {
    records: Mutex<VecDeque<AnalysisRecord>>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self { records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))), capacity }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AnalysisRecord>> {
        // A panic while holding the lock leaves the queue consistent.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AnalysisStore for MemoryStore {
    fn record(&self, source: &str, report: &AnalysisReport) -> AnalysisRecord {
        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: source.to_string(),
            report: report.clone(),
        };
        if self.capacity > 0 {
            let mut records = self.lock();
            if records.len() == self.capacity {
                records.pop_front();
            }
            records.push_back(record.clone());
        }
        tracing::debug!(id = %record.id, source, "analysis recorded");
        record
    }

    fn recent(&self, limit: usize) -> Vec<AnalysisRecord> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_core::color::{ColorProfile, EyeColor, HairColor, Season, SkinTone, Undertone};
    use facet_core::{FaceShape, Gender, SkinScores};

    fn report(confidence: f32) -> AnalysisReport {
        AnalysisReport {
            face_shape: FaceShape::Oval,
            confidence,
            gender: Gender::Female,
            skin_analysis: SkinScores { acne: 0.1, oiliness: 0.35, texture: 0.5 },
            color_analysis: ColorProfile {
                skin_tone: SkinTone::Medium,
                undertone: Undertone::Warm,
                skin_hex: "#cda082".into(),
                eye_color: EyeColor::Brown,
                eye_hex: "#8b4513".into(),
                hair_color: HairColor::Black,
                hair_hex: "#201810".into(),
                season: Season::Autumn,
            },
            foundation: None,
            recommendations: vec!["**Diagnosis (Female)**: Balanced Skin".into()],
        }
    }

    #[test]
    fn test_recent_is_newest_first() {
        let store = MemoryStore::new(10);
        store.record("a.jpg", &report(0.1));
        store.record("b.jpg", &report(0.2));
        let recent = store.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].source, "b.jpg");
        assert_eq!(recent[1].source, "a.jpg");
        assert_ne!(recent[0].id, recent[1].id);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let store = MemoryStore::new(2);
        for name in ["1", "2", "3"] {
            store.record(name, &report(0.5));
        }
        assert_eq!(store.len(), 2);
        let sources: Vec<_> = store.recent(5).into_iter().map(|r| r.source).collect();
        assert_eq!(sources, ["3", "2"]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let store = MemoryStore::new(0);
        let rec = store.record("x", &report(0.5));
        assert_eq!(rec.source, "x");
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_record_serialises_with_timestamp() {
        let store = MemoryStore::new(1);
        let rec = store.record("face.png", &report(0.7));
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json["created_at"].is_string());
        assert_eq!(json["report"]["face_shape"], "Oval");
    }
}
