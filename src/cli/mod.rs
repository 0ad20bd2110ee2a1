// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands each command to its
// use case in Layer 2. Only this layer prints.
//
//   1. `init`    — write a config and initial weights
//   2. `inspect` — parameter counts + a random forward pass
//   3. `predict` — tag utterance feature files
//
// The backend is chosen here: Wgpu by default, NdArray with
// --cpu. Everything below is generic over the backend.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu};
use clap::Parser;
use commands::{Commands, InitArgs, InspectArgs, PredictArgs};

use crate::application::{
    init_use_case::InitUseCase,
    inspect_use_case::InspectUseCase,
    predict_use_case::PredictUseCase,
};
use crate::data::loader::FeatureLoader;
use crate::domain::traits::{FeatureSource, ProsodyPredictor};

#[derive(Parser, Debug)]
#[command(
    name = "prosody-tagger",
    version,
    about = "Predict per-token prosody tags from speech features and text."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Init(args)    => run_init(args),
            Commands::Inspect(args) => run_inspect(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let dir = args.checkpoint_dir.clone();
    let cfg = args.into_config()?;

    let params = InitUseCase::new(&dir, cfg).execute::<NdArray>(&NdArrayDevice::default())?;
    println!("Initialised model ({params} parameters) in '{}'", dir.display());
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let report = if args.cpu {
        InspectUseCase::execute::<NdArray>(&args.checkpoint_dir, args.frames, args.tokens, NdArrayDevice::default())?
    } else {
        InspectUseCase::execute::<Wgpu>(&args.checkpoint_dir, args.frames, args.tokens, WgpuDevice::default())?
    };

    for (name, count) in &report.params {
        println!("{name:<14} {count:>12}");
    }
    println!("logits    {:?}", report.logits_shape);
    println!("attention {:?}", report.attn_shape);
    if !report.loaded {
        println!("(no saved weights, model was randomly initialised)");
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let utterances = FeatureLoader::new(&args.features).load_all()?;
    if utterances.is_empty() {
        println!("No utterances found in '{}'.", args.features.display());
        return Ok(());
    }

    let tagged = if args.cpu {
        PredictUseCase::<NdArray>::new(&args.checkpoint_dir, args.batch_size, NdArrayDevice::default())?
            .predict_all(&utterances)?
    } else {
        PredictUseCase::<Wgpu>::new(&args.checkpoint_dir, args.batch_size, WgpuDevice::default())?
            .predict_all(&utterances)?
    };

    for utt in &tagged {
        let line: Vec<String> = utt.tokens.iter().map(|t| format!("{}/{}", t.token, t.tag)).collect();
        println!("{}\t{}", utt.id, line.join(" "));
    }
    if tagged.len() < utterances.len() {
        println!("({} of {} utterances skipped)", utterances.len() - tagged.len(), utterances.len());
    }
    Ok(())
}
