use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facebank_core::{
    infer_image, list_labeled_images, BankBuilder, BuildError, FaceAnalyzer, InferOutcome,
    LiveLoop, LiveSummary, OnnxFaceAnalyzer, PrototypeBank, PrototypeMatcher,
};
use facebank_hw::Camera;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod live_io;

use config::Config;
use live_io::{CameraSource, PreviewSink, QuitSignal};

#[derive(Parser)]
#[command(name = "facebank", about = "Enroll faces into a prototype bank and recognize them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a face bank from a directory of per-person image folders
    Build {
        /// Root directory; each subdirectory name is a label
        #[arg(long)]
        data_dir: PathBuf,
        /// Output bank file
        #[arg(long)]
        out: Option<PathBuf>,
        /// Minimum detector confidence for an enrollment face
        #[arg(long)]
        gate: Option<f32>,
    },
    /// Classify the most confident face in one image
    Infer {
        /// Image to classify
        #[arg(long)]
        img: PathBuf,
        /// Bank file
        #[arg(long)]
        bank: Option<PathBuf>,
        /// Cosine similarity threshold for a known identity
        #[arg(long)]
        thr: Option<f32>,
        /// Minimum detector confidence for the face
        #[arg(long)]
        gate: Option<f32>,
    },
    /// Live recognition from a camera; type `q` + Enter or press Ctrl-C to stop
    Cam {
        /// Bank file
        #[arg(long)]
        bank: Option<PathBuf>,
        /// Cosine similarity threshold for a known identity
        #[arg(long)]
        thr: Option<f32>,
        /// Camera index, opened as /dev/video<N>
        #[arg(long, default_value_t = 0)]
        cam_index: u32,
        /// Minimum detector confidence for a face to be classified
        #[arg(long)]
        gate: Option<f32>,
        /// Write each annotated frame to this JPEG
        #[arg(long)]
        preview: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Build { data_dir, out, gate } => {
            let out = out.unwrap_or_else(|| config.bank_path.clone());
            let gate = gate.unwrap_or(config.enroll_gate);
            build(&config, &data_dir, &out, gate)
        }
        Commands::Infer { img, bank, thr, gate } => {
            let bank = bank.unwrap_or_else(|| config.bank_path.clone());
            let thr = thr.unwrap_or(config.match_threshold);
            let gate = gate.unwrap_or(config.infer_gate);
            infer(&config, &img, &bank, thr, gate)
        }
        Commands::Cam {
            bank,
            thr,
            cam_index,
            gate,
            preview,
        } => {
            let bank = bank.unwrap_or_else(|| config.bank_path.clone());
            let thr = thr.unwrap_or(config.match_threshold);
            let gate = gate.unwrap_or(config.live_gate);
            let preview = preview.or_else(|| config.preview_path.clone());
            let summary = cam(&config, &bank, thr, cam_index, gate, preview).await?;
            println!(
                "Processed {} frames: {} faces ({} matched, {} unknown, {} low confidence, {} failed)",
                summary.frames,
                summary.faces,
                summary.matched,
                summary.unknown,
                summary.low_confidence,
                summary.failed
            );
            Ok(())
        }
    }
}

fn load_analyzer(config: &Config) -> Result<OnnxFaceAnalyzer> {
    OnnxFaceAnalyzer::load(
        &config.detector_model_path(),
        &config.recognizer_model_path(),
        config.intra_threads,
    )
    .with_context(|| format!("loading face models from {}", config.model_dir.display()))
}

fn load_bank(path: &Path) -> Result<PrototypeBank> {
    let bank = PrototypeBank::load(path)
        .with_context(|| format!("loading face bank {}", path.display()))?;
    tracing::info!(labels = bank.len(), dim = bank.dim(), "loaded face bank");
    Ok(bank)
}

fn build(config: &Config, data_dir: &Path, out: &Path, gate: f32) -> Result<()> {
    let mut analyzer = load_analyzer(config)?;
    build_bank(&mut analyzer, data_dir, out, gate)
}

/// List, enroll and save. The bank file is only written once a non-empty
/// bank exists.
fn build_bank<A: FaceAnalyzer + ?Sized>(
    analyzer: &mut A,
    data_dir: &Path,
    out: &Path,
    gate: f32,
) -> Result<()> {
    let images = list_labeled_images(data_dir)?;
    tracing::info!(images = images.len(), dir = %data_dir.display(), "enrolling");

    let report = match BankBuilder::new(gate).build_with_report(analyzer, &images) {
        Ok(report) => report,
        Err(BuildError::EmptyBank) => anyhow::bail!(
            "no image in {} produced a face with confidence >= {gate}; nothing to save",
            data_dir.display()
        ),
        Err(e) => return Err(e.into()),
    };

    for (label, examples) in report.bank.examples().iter() {
        println!("[bank] {label}: {} embeddings", examples.len());
    }
    if !report.skipped.is_empty() {
        println!("[bank] skipped {} of {} images", report.skipped.len(), images.len());
    }

    report
        .bank
        .save(out)
        .with_context(|| format!("saving face bank {}", out.display()))?;
    println!("[ok] Saved embedding bank -> {}", out.display());
    Ok(())
}

fn infer(config: &Config, img: &Path, bank_path: &Path, threshold: f32, gate: f32) -> Result<()> {
    let bank = load_bank(bank_path)?;
    let image = image::open(img)
        .with_context(|| format!("reading image {}", img.display()))?
        .to_rgb8();

    let mut analyzer = load_analyzer(config)?;
    let matcher = PrototypeMatcher::new(threshold);

    match infer_image(&mut analyzer, &matcher, &bank, &image, gate)? {
        InferOutcome::Classified {
            classification,
            confidence,
        } => println!(
            "Prediction: {}  (cosine={:.3}, det_prob={:.2})",
            classification.identity, classification.similarity, confidence
        ),
        InferOutcome::NoConfidentFace => println!("No confident face detected."),
    }
    Ok(())
}

async fn cam(
    config: &Config,
    bank_path: &Path,
    threshold: f32,
    cam_index: u32,
    gate: f32,
    preview: Option<PathBuf>,
) -> Result<LiveSummary> {
    let bank = load_bank(bank_path)?;
    let mut analyzer = load_analyzer(config)?;

    let quit = QuitSignal::new();
    quit.watch_stdin();
    let ctrl_c = {
        let quit = quit.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("quit requested by Ctrl-C");
                quit.trigger();
            }
        })
    };

    // Capture and inference are blocking; keep them off the async workers.
    let live = tokio::task::spawn_blocking(move || -> Result<LiveSummary> {
        let camera = Camera::open_index(cam_index)
            .with_context(|| format!("could not open camera {cam_index}; try another --cam-index"))?;
        let session = camera.stream()?;
        let mut source = CameraSource::new(session);
        let mut sink = PreviewSink::new(preview, quit);
        let matcher = PrototypeMatcher::new(threshold);

        println!("Press q then Enter (or Ctrl-C) to quit.");
        let summary = LiveLoop {
            analyzer: &mut analyzer,
            matcher: &matcher,
            bank: &bank,
            face_gate: gate,
        }
        .run(&mut source, &mut sink);
        Ok(summary)
    })
    .await;

    ctrl_c.abort();
    live.context("live loop thread panicked")?
}
