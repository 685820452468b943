//! EmoStress - Batch speech emotion and stress estimation

use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use anyhow::{bail, Context};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use emostress::{init_logging, Args, Config, InferencePipeline, PredictionResult};

#[derive(Serialize)]
struct FileReport<'a> {
    filename: String,
    #[serde(flatten)]
    result: &'a PredictionResult,
}

#[derive(Serialize)]
struct FileFailure {
    filename: String,
    error: String,
    category: &'static str,
}

fn main() {
    let args = Args::parse();

    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Returns `false` when at least one file failed.
fn run(args: Args) -> anyhow::Result<bool> {
    if args.print_default_config {
        print!("{}", Config::default().to_toml()?);
        return Ok(true);
    }

    let inputs = args.inputs.clone();
    let config = Config::from_args_and_config(args).context("Invalid configuration")?;
    init_logging(config.verbose());
    log::debug!("{}", emostress::get_library_info());
    if inputs.is_empty() {
        bail!("No input files given");
    }

    let pipeline = InferencePipeline::from_config(&config);
    if let Some(reason) = pipeline.unavailable_reason() {
        bail!("Refusing to start: {}", reason);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers())
        .build()
        .context("Failed to start worker pool")?;

    let start = Instant::now();
    let outcomes: Vec<(&PathBuf, emostress::Result<PredictionResult>)> = pool.install(|| {
        inputs.par_iter()
            .map(|path| (path, pipeline.infer_file(path)))
            .collect()
    });

    let mut failures = 0;
    for (path, outcome) in &outcomes {
        let line = match outcome {
            Ok(result) => serde_json::to_string(&FileReport { filename: display_name(path), result })?,
            Err(e) => {
                failures += 1;
                log::warn!("{}: {}", path.display(), e);
                serde_json::to_string(&FileFailure {
                    filename: display_name(path),
                    error: e.to_string(),
                    category: e.category(),
                })?
            }
        };
        println!("{}", line);
    }

    log::info!(
        "Processed {} files ({} failed) on {} workers in {:.2}s",
        outcomes.len(), failures, config.workers(), start.elapsed().as_secs_f64()
    );
    Ok(failures == 0)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
