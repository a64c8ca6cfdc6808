use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;
use log::LevelFilter;
use orchestrator::{
    JobBuilder,
    configs::{BackendConfig, BackendKind, DataType, DatasetConfig},
};

const DEFAULT_ENGINE_ADDR: &str = "127.0.0.1:50000";

/// Trains a multi branch MLP on MNIST.
///
/// The main path classifies the digits while two side branches, attached
/// after the first and third hidden layers, add weighted auxiliary costs.
/// The job is run by a training engine node reached at `--engine_addr`.
#[derive(Parser, Debug)]
#[command(name = "mnist-branch", version)]
struct Args {
    /// Compute backend: cpu, gpu or mgpu
    #[arg(short, long, default_value = "cpu")]
    backend: BackendKind,

    /// Number of training epochs
    #[arg(short, long, default_value = "10")]
    epochs: NonZeroUsize,

    /// Random number generator seed
    #[arg(long = "rng_seed")]
    rng_seed: Option<u64>,

    /// Device id for gpu backends
    #[arg(long = "device_id", default_value_t = 0)]
    device_id: usize,

    /// Default datatype: f16 or f32
    #[arg(long, default_value = "f32")]
    datatype: DataType,

    /// Stochastic rounding of the optimizer updates
    #[arg(long)]
    rounding: bool,

    /// Epochs between validation passes, 0 disables them
    #[arg(long = "validation_freq", default_value_t = 0)]
    validation_freq: usize,

    /// Epochs between checkpoints, 0 or less disables them
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    serialize: i64,

    /// Checkpoint destination
    #[arg(short = 's', long = "save_path")]
    save_path: Option<PathBuf>,

    /// Restore the initial model state from this file
    #[arg(long = "model_file")]
    model_file: Option<PathBuf>,

    /// Dataset location
    #[arg(long = "data_dir", default_value = "data")]
    data_dir: PathBuf,

    /// Log level: off, error, warn, info, debug, trace or a numeric level (10 debug .. 50 critical)
    #[arg(long = "log_thresh", default_value = "warn", value_parser = parse_log_thresh)]
    log_thresh: LevelFilter,

    /// Display a progress bar while fitting
    #[arg(long = "progress_bar")]
    progress_bar: bool,

    /// File the engine writes its callback data to
    #[arg(short, long = "output_file")]
    output_file: Option<PathBuf>,

    /// Address of the training engine node
    #[arg(long = "engine_addr", default_value = DEFAULT_ENGINE_ADDR)]
    engine_addr: String,
}

/// Accepts `log` level names as well as the numeric thresholds of the older
/// scripts, where everything at or above the number is shown.
fn parse_log_thresh(s: &str) -> Result<LevelFilter, String> {
    if let Ok(level) = s.parse::<LevelFilter>() {
        return Ok(level);
    }

    let thresh: i64 = s
        .parse()
        .map_err(|_| format!("'{s}' is neither a level name nor a number"))?;

    Ok(match thresh {
        ..=0 => LevelFilter::Trace,
        1..=10 => LevelFilter::Debug,
        11..=20 => LevelFilter::Info,
        21..=30 => LevelFilter::Warn,
        31..=50 => LevelFilter::Error,
        _ => LevelFilter::Off,
    })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_thresh)
        .init();

    let backend = BackendConfig {
        kind: args.backend,
        rng_seed: args.rng_seed,
        device_id: args.device_id,
        datatype: args.datatype,
        stochastic_round: false,
    };
    let dataset = DatasetConfig::Mnist {
        path: args.data_dir,
    };

    let job = JobBuilder::new(dataset, backend, args.epochs)
        .stochastic_round(args.rounding)
        .validation_freq(args.validation_freq)
        .checkpoint(args.serialize, args.save_path)
        .progress_bar(args.progress_bar)
        .output_file(args.output_file)
        .initial_weights(args.model_file)
        .build()?;

    let misclassification = orchestrator::train(args.engine_addr.as_str(), &job)?;
    println!("Misclassification error = {:.1}%", misclassification * 100.0);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let args = Args::try_parse_from(["mnist-branch"]).unwrap();

        assert_eq!(args.backend, BackendKind::Cpu);
        assert_eq!(args.epochs.get(), 10);
        assert_eq!(args.datatype, DataType::F32);
        assert_eq!(args.validation_freq, 0);
        assert_eq!(args.serialize, 0);
        assert_eq!(args.log_thresh, LevelFilter::Warn);
        assert_eq!(args.engine_addr, DEFAULT_ENGINE_ADDR);
        assert!(args.model_file.is_none());
        assert!(!args.rounding);
    }

    #[test]
    fn parses_underscored_flags() {
        let args = Args::try_parse_from([
            "mnist-branch",
            "-b",
            "gpu",
            "-e",
            "3",
            "--validation_freq",
            "1",
            "--serialize",
            "-1",
            "-s",
            "checkpoint.bin",
            "--model_file",
            "init.bin",
            "--log_thresh",
            "info",
            "--progress_bar",
        ])
        .unwrap();

        assert_eq!(args.backend, BackendKind::Gpu);
        assert_eq!(args.epochs.get(), 3);
        assert_eq!(args.validation_freq, 1);
        assert_eq!(args.serialize, -1);
        assert_eq!(args.save_path, Some(PathBuf::from("checkpoint.bin")));
        assert_eq!(args.model_file, Some(PathBuf::from("init.bin")));
        assert_eq!(args.log_thresh, LevelFilter::Info);
        assert!(args.progress_bar);
    }

    #[test]
    fn log_thresh_takes_numeric_levels() {
        let thresh = |value: &str| {
            Args::try_parse_from(["mnist-branch", "--log_thresh", value])
                .unwrap()
                .log_thresh
        };

        assert_eq!(thresh("10"), LevelFilter::Debug);
        assert_eq!(thresh("20"), LevelFilter::Info);
        assert_eq!(thresh("30"), LevelFilter::Warn);
        assert_eq!(thresh("40"), LevelFilter::Error);
        assert_eq!(thresh("50"), LevelFilter::Error);
        assert_eq!(thresh("0"), LevelFilter::Trace);
        assert_eq!(thresh("debug"), LevelFilter::Debug);
        assert!(Args::try_parse_from(["mnist-branch", "--log_thresh", "loud"]).is_err());
    }

    #[test]
    fn rejects_zero_epochs_and_unknown_backends() {
        assert!(Args::try_parse_from(["mnist-branch", "-e", "0"]).is_err());
        assert!(Args::try_parse_from(["mnist-branch", "-b", "tpu"]).is_err());
    }
}
