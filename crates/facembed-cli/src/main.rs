use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use facembed_core::{
    analyze_bytes, embed_bytes, AnalyzerFactory, DetSize, Embedding, EmbeddingResponse,
    ModelPaths, OnnxAnalyzerFactory, UPLOAD_MESSAGES,
};

#[derive(Parser)]
#[command(name = "facembed", about = "Face embedding CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the first face's normalized embedding as JSON, shaped like the
    /// upload endpoint's response
    Embed {
        /// Image file (JPEG, PNG, ...)
        image: PathBuf,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Compare the first faces of two images
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
}

#[derive(Args)]
struct AnalysisArgs {
    /// Detection width
    #[arg(long, default_value_t = 640)]
    width: u32,
    /// Detection height
    #[arg(long, default_value_t = 640)]
    height: u32,
    /// Directory holding det_10g.onnx and w600k_r50.onnx
    #[arg(long, env = "FACEMBED_MODEL_DIR")]
    model_dir: Option<PathBuf>,
    /// ONNX Runtime intra-op threads
    #[arg(long, default_value_t = 2)]
    threads: usize,
}

impl AnalysisArgs {
    fn factory(&self) -> OnnxAnalyzerFactory {
        let dir = self
            .model_dir
            .clone()
            .unwrap_or_else(facembed_core::default_model_dir);
        OnnxAnalyzerFactory::new(ModelPaths::in_dir(&dir), self.threads)
    }

    fn det_size(&self) -> DetSize {
        DetSize::new(self.width, self.height)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Embed { image, analysis } => {
            let response = embed_file(&analysis.factory(), &image, analysis.det_size())?;
            println!("{}", serde_json::to_string(&response)?);
        }
        Commands::Compare { a, b, analysis } => {
            let factory = analysis.factory();
            let det_size = analysis.det_size();
            let Some(ea) = first_face_embedding(&factory, &a, det_size)? else {
                bail!("no face detected in {}", a.display());
            };
            let Some(eb) = first_face_embedding(&factory, &b, det_size)? else {
                bail!("no face detected in {}", b.display());
            };
            println!(
                "{}",
                serde_json::json!({
                    "similarity": ea.similarity(&eb),
                    "euclidean_distance": ea.euclidean_distance(&eb),
                })
            );
        }
    }

    Ok(())
}

fn read_image_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

/// Embed one file exactly as `POST /faceEmbeddingImg` would, soft errors included.
fn embed_file(factory: &dyn AnalyzerFactory, path: &Path, det_size: DetSize) -> Result<EmbeddingResponse> {
    let bytes = read_image_file(path)?;
    embed_bytes(factory, &bytes, det_size, &UPLOAD_MESSAGES)
        .with_context(|| format!("embedding {}", path.display()))
}

/// Run a fresh analyzer over one file and return its first face's embedding.
fn first_face_embedding(
    factory: &dyn AnalyzerFactory,
    path: &Path,
    det_size: DetSize,
) -> Result<Option<Embedding>> {
    let bytes = read_image_file(path)?;
    let faces = analyze_bytes(factory, &bytes, det_size)
        .with_context(|| format!("analyzing {}", path.display()))?;
    tracing::info!(path = %path.display(), faces = faces.len(), "analyzed image");

    Ok(faces.into_iter().next().map(|face| face.embedding))
}
