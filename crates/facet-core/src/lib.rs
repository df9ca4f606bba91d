//! facet-core: face shape, gender, skin and colour analysis.
//!
//! Works on a dense face-mesh landmark set (see [`landmarks`]) plus the
//! frame's pixels. Learned models are optional oracles loaded through
//! ONNX Runtime; every classifier has a heuristic path that runs without them.

pub mod chat;
pub mod cluster;
pub mod color;
pub mod config;
pub mod face_shape;
pub mod gender;
pub mod geometry;
pub mod imaging;
pub mod landmarks;
pub mod menu;
pub mod mesh;
pub mod oracle;
pub mod pipeline;
pub mod recommend;
pub mod shades;
pub mod skin;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod fixtures;

pub use chat::{ChatContext, ConsultantBot};
pub use color::{ColorProfile, EyeColor, HairColor, Season, SkinTone, Undertone};
pub use config::{AnalyzerConfig, ConfigError};
pub use face_shape::{FaceShape, ShapeResult};
pub use gender::Gender;
pub use mesh::{FaceMeshDetector, LandmarkDetector};
pub use oracle::{ModelRegistry, OracleError};
pub use pipeline::{AnalysisError, AnalysisOutcome, AnalysisReport, Analyzer};
pub use shades::FoundationMatch;
pub use skin::SkinScores;
pub use types::{Landmark, LandmarkSet};
