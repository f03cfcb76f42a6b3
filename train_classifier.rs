// Train a classifier on synthetic Gaussian blobs, optionally across several
// worker threads.
//
// ## Usage
//
// ```bash
// # Built-in two-layer network, one worker
// cargo run --release --bin train_classifier
//
// # Custom architecture and training configuration on four workers
// cargo run --release --bin train_classifier -- \
//     --architecture config/architectures/mlp_blobs.json \
//     --config config/training.json --workers 4
// ```
//
// Set `RUST_LOG=debug` to see per-batch progress.

use clap::Parser;
use seqnet::architecture::{build_network, load_architecture, NetworkSpec};
use seqnet::config::{load_config, TrainingConfig};
use seqnet::dataset::InMemoryDataset;
use seqnet::distributed::{run_workers, Communicator};
use seqnet::error::{DatasetError, TrainError};
use seqnet::trainer::{Classifier, EpochReport};
use seqnet::utils::SeededRng;
use std::error::Error;
use std::process;

#[derive(Parser)]
#[command(
    name = "train_classifier",
    about = "Train a sequential network on synthetic Gaussian blobs"
)]
struct Args {
    /// Network architecture JSON (default: built-in 2-16-3 MLP)
    #[arg(long)]
    architecture: Option<String>,

    /// Training configuration JSON (default: built-in settings)
    #[arg(long)]
    config: Option<String>,

    /// Number of worker threads (overrides the configuration)
    #[arg(long)]
    workers: Option<usize>,

    /// Number of epochs (overrides the configuration)
    #[arg(long)]
    epochs: Option<usize>,

    /// Training samples to generate
    #[arg(long, default_value = "1200")]
    train_samples: usize,

    /// Test samples to generate
    #[arg(long, default_value = "300")]
    test_samples: usize,

    /// Spread of each blob around its centre
    #[arg(long, default_value = "0.6")]
    noise: f64,
}

fn default_architecture() -> Result<NetworkSpec, Box<dyn Error>> {
    let spec = NetworkSpec::from_descriptors(
        2,
        3,
        0.5,
        &[vec![101, 2, 16], vec![202], vec![101, 16, 3], vec![203]],
    )?;
    Ok(spec)
}

// One centre per class, drawn uniformly from [-3, 3) in every dimension.
fn blob_centres(classes: usize, width: usize, rng: &mut SeededRng) -> Vec<Vec<f64>> {
    (0..classes)
        .map(|_| (0..width).map(|_| rng.gen_range_f64(-3.0, 3.0)).collect())
        .collect()
}

// Samples cycle through the classes; each is its centre plus Normal(0, noise).
fn blobs(
    centres: &[Vec<f64>],
    samples: usize,
    noise: f64,
    rng: &mut SeededRng,
) -> Result<InMemoryDataset, DatasetError> {
    let classes = centres.len();
    let mut features = Vec::with_capacity(samples);
    let mut labels = Vec::with_capacity(samples);
    for i in 0..samples {
        let label = i % classes;
        features.push(
            centres[label]
                .iter()
                .map(|&c| c + rng.gen_normal(noise))
                .collect(),
        );
        labels.push(label);
    }
    InMemoryDataset::new(features, labels, classes)
}

fn log_report(report: &EpochReport) {
    log::info!(
        "epoch {:<4} loss {:<14.6} train acc {:<8.4} test acc {:<8.4} eval {:>8.3}s  train {:>8.3}s",
        report.epoch,
        report.loss,
        report.train_accuracy,
        report.test_accuracy.unwrap_or(f64::NAN),
        report.evaluation_time.as_secs_f64(),
        report.training_time.as_secs_f64()
    );
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let spec = match &args.architecture {
        Some(path) => load_architecture(path)?,
        None => default_architecture()?,
    };
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    config.validate()?;

    let mut data_rng = SeededRng::new(config.seed ^ 0x5eed);
    let centres = blob_centres(spec.outputs, spec.inputs, &mut data_rng);
    let train = blobs(&centres, args.train_samples, args.noise, &mut data_rng)?;
    let test = blobs(&centres, args.test_samples, args.noise, &mut data_rng)?;
    log::info!(
        "{} training / {} test samples, {} features, {} classes, {} workers",
        args.train_samples,
        args.test_samples,
        spec.inputs,
        spec.outputs,
        config.workers
    );

    let results = run_workers(config.workers, |comm| -> Result<(), TrainError> {
        let rank = comm.rank();
        let mut rng = SeededRng::new(config.seed.wrapping_add(rank as u64));
        let network = build_network(&spec, &mut rng)?;
        if rank == 0 {
            match serde_json::to_string_pretty(&network.describe()) {
                Ok(description) => log::info!("network:\n{}", description),
                Err(err) => log::warn!("could not describe network: {}", err),
            }
        }

        let mut classifier = Classifier::new(network, comm, rng)?;
        classifier.fit(&train, Some(&test), &config, |report| {
            if rank == 0 {
                log_report(report);
            }
        })?;
        Ok(())
    });

    for result in results {
        result?;
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("{}", err);
        process::exit(1);
    }
}
