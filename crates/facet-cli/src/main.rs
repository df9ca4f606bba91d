use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facet_core::{
    AnalysisReport, Analyzer, AnalyzerConfig, ChatContext, ConsultantBot, FaceMeshDetector, LandmarkSet,
    ModelRegistry,
};

#[derive(Parser)]
#[command(name = "facet", about = "Facial analysis and beauty consultation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a face image in-process and print the JSON report
    Analyze {
        image: PathBuf,
        /// JSON file with one landmark set or a list of sets
        #[arg(short, long)]
        landmarks: Option<PathBuf>,
        /// Directory holding the ONNX models
        #[arg(short, long)]
        models: Option<PathBuf>,
        /// TOML file overriding analyzer thresholds
        #[arg(short, long)]
        tuning: Option<PathBuf>,
        /// Skip the learned oracles and use the heuristics only
        #[arg(long)]
        no_oracles: bool,
    },
    /// Match a foundation shade to the skin in an image
    Shade {
        image: PathBuf,
        #[arg(short, long)]
        landmarks: PathBuf,
    },
    /// Ask the consultant a question
    Chat {
        message: String,
        /// A previous analysis report (or bare chat context) as JSON
        #[arg(short, long)]
        context: Option<PathBuf>,
    },
    /// Show daemon status
    Status,
    /// Analyse an image through the running daemon
    Remote {
        image: PathBuf,
        #[arg(short, long)]
        landmarks: Option<PathBuf>,
    },
}

// `#[zbus::proxy]` generates `ConsultantProxy` for the daemon's interface.
#[zbus::proxy(
    interface = "org.facet.Consultant1",
    default_service = "org.facet.Consultant1",
    default_path = "/org/facet/Consultant1"
)]
trait Consultant {
    async fn analyze(&self, image_path: &str, landmarks_json: &str) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { image, landmarks, models, tuning, no_oracles } => {
            let config = match tuning {
                Some(path) => AnalyzerConfig::load(&path)
                    .with_context(|| format!("loading tuning file {}", path.display()))?,
                None => AnalyzerConfig::default(),
            };
            let faces = landmarks.as_deref().map(read_landmarks).transpose()?;

            let mut registry = ModelRegistry::empty();
            let mut detector = None;
            if let Some(dir) = models.as_deref() {
                if !no_oracles {
                    registry = ModelRegistry::load(dir);
                }
                if faces.is_none() {
                    detector = Some(FaceMeshDetector::load(dir.join(facet_core::oracle::FACE_MESH_MODEL))?);
                }
            }
            let mut analyzer = Analyzer::new(config, registry);
            if let Some(detector) = detector {
                analyzer = analyzer.with_detector(std::sync::Arc::new(detector));
            }
            tracing::debug!(oracles = ?analyzer.registry().loaded(), detector = analyzer.has_detector(), "analyzer ready");

            let bytes = std::fs::read(&image).with_context(|| format!("reading {}", image.display()))?;
            let outcome = tokio::task::spawn_blocking(move || analyzer.analyze_upload(&bytes, faces)).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Shade { image, landmarks } => {
            let faces = read_landmarks(&landmarks)?;
            let Some(face) = faces.first() else {
                bail!("{}", facet_core::pipeline::NO_FACE_MESSAGE);
            };
            let frame = image::open(&image)
                .with_context(|| format!("opening {}", image.display()))?
                .to_rgb8();
            let color = facet_core::config::ColorConfig::default();
            let matched = facet_core::shades::match_foundation_in(&frame, face, &color);
            println!("{}", serde_json::to_string_pretty(&matched)?);
        }
        Commands::Chat { message, context } => {
            let context = context.as_deref().map(read_context).transpose()?;
            println!("{}", ConsultantBot::default().respond(&message, context.as_ref()));
        }
        Commands::Status => {
            let proxy = connect().await?;
            let status = proxy.status().await.context("calling facetd Status()")?;
            println!("{status}");
        }
        Commands::Remote { image, landmarks } => {
            // The daemon resolves the path itself, so hand it an absolute one.
            let image = std::fs::canonicalize(&image).with_context(|| format!("resolving {}", image.display()))?;
            let landmarks_json = match landmarks {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => String::new(),
            };
            let proxy = connect().await?;
            let json = proxy
                .analyze(&image.to_string_lossy(), &landmarks_json)
                .await
                .context("calling facetd Analyze()")?;
            println!("{json}");
        }
    }

    Ok(())
}

async fn connect() -> Result<ConsultantProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("connecting to the session bus")?;
    Ok(ConsultantProxy::new(&conn).await?)
}

fn read_landmarks(path: &Path) -> Result<Vec<LandmarkSet>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    LandmarkSet::parse_json(&text).with_context(|| format!("parsing landmarks in {}", path.display()))
}

/// A saved analysis report, or a bare chat context.
fn read_context(path: &Path) -> Result<ChatContext> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if let Ok(report) = serde_json::from_str::<AnalysisReport>(&text) {
        return Ok(ChatContext::from(&report));
    }
    serde_json::from_str(&text).with_context(|| format!("parsing chat context in {}", path.display()))
}
