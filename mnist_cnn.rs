// mnist_cnn.rs
// Sigmoid CNN for MNIST on CPU: Conv(7 @ 5x5) -> sigmoid -> Dense(100) -> Dense(10),
// trained one sample at a time with plain SGD.
//
// Usage:
//   mnist_cnn [config.json]
//
// Expected files (unless "use_synthetic" is set in the config):
//   ./data/train-images.idx3-ubyte
//   ./data/train-labels.idx1-ubyte
//   ./data/t10k-images.idx3-ubyte
//   ./data/t10k-labels.idx1-ubyte
//
// Output:
//   - one accuracy line per epoch and the final test accuracy on stdout
//   - logs/training_accuracy_cnn.txt (epoch,accuracy,loss,time)

use rust_conv_net::config::{load_config, TrainingConfig, IMG_H, IMG_W, NUM_CLASSES};
use rust_conv_net::data::synthetic::stripe_patterns;
use rust_conv_net::data::{mnist, Sample};
use rust_conv_net::network::ConvNet;
use rust_conv_net::training::{evaluate, train, EpochReport};
use rust_conv_net::utils::SimpleRng;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;

// Pick the config from the first CLI argument, or fall back to the built-in constants.
fn config_from_args(args: &[String]) -> Result<TrainingConfig, Box<dyn Error>> {
    match args.get(1) {
        Some(path) => {
            let config = load_config(path)?;
            println!("Loaded config from {}", path);
            Ok(config)
        }
        None => Ok(TrainingConfig::default()),
    }
}

fn load_data(config: &TrainingConfig) -> Result<(Vec<Sample>, Vec<Sample>), Box<dyn Error>> {
    if config.use_synthetic {
        println!("Generating synthetic stripe patterns...");
        let train = stripe_patterns(config.train_samples, (IMG_H, IMG_W), NUM_CLASSES)?;
        let test = stripe_patterns(config.test_samples, (IMG_H, IMG_W), NUM_CLASSES)?;
        return Ok((train, test));
    }

    println!("Loading MNIST from {}...", config.data_dir);
    let data = mnist::load_mnist(
        Path::new(&config.data_dir),
        config.train_samples,
        config.test_samples,
        NUM_CLASSES,
    )?;
    Ok(data)
}

fn open_log(path: &str) -> Result<BufWriter<File>, Box<dyn Error>> {
    if let Some(dir) = Path::new(path).parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

// One CSV line per epoch: epoch,accuracy,loss,time
fn log_epoch(out: &mut impl Write, report: &EpochReport) -> io::Result<()> {
    writeln!(
        out,
        "{},{},{},{}",
        report.epoch,
        report.accuracy(),
        report.mean_loss,
        report.elapsed.as_secs_f64()
    )
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let config = config_from_args(args)?;
    let (train_set, test_set) = load_data(&config)?;
    println!("Train: {} | Test: {}", train_set.len(), test_set.len());

    let mut rng = match config.seed {
        Some(seed) => SimpleRng::new(seed),
        None => SimpleRng::from_time(),
    };
    let mut model = ConvNet::new(config.network_shape(), &mut rng)?;
    println!("Parameters: {}", model.parameter_count());

    let mut log = open_log(&config.log_path)?;
    let mut log_error: Option<io::Error> = None;

    println!(
        "Training CNN: epochs={} lr={}",
        config.epochs, config.learning_rate
    );
    train(
        &mut model,
        &train_set,
        config.epochs,
        config.learning_rate,
        |report| {
            println!(
                "Epoch #{}, Accuracy: {:.2}% | loss={:.6} | time={:.3}s",
                report.epoch,
                report.accuracy(),
                report.mean_loss,
                report.elapsed.as_secs_f64()
            );
            if log_error.is_none() {
                log_error = log_epoch(&mut log, report).err();
            }
        },
    )?;
    if let Some(err) = log_error {
        return Err(err.into());
    }
    log.flush()?;

    println!("Testing...");
    let eval = evaluate(&mut model, &test_set)?;
    println!("Test Accuracy: {:.2}%", eval.accuracy());
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Err(err) = run(&args) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
