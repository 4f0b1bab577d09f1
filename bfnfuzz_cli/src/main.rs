use bfnfuzz_core::config::{FuzzConfig, OutputFormat};
use bfnfuzz_core::mutator::Mutator;

use clap::Parser;
use log::{info, warn};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    #[clap(short, long)]
    seed: Option<u64>,
    #[clap(short, long)]
    iterations: Option<u64>,
    /// Write every emitted payload to `<dir>/<md5>.bin`.
    #[clap(short, long, value_parser)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match cli.config_file {
        Some(config_path) => {
            info!("Loading configuration from specified path: {config_path:?}");
            FuzzConfig::load_from_file(&config_path)?
        }
        None => {
            let default_config_path = PathBuf::from("bfnfuzz.toml");
            if default_config_path.exists() {
                info!("No config file specified via CLI, loading default: {default_config_path:?}");
                FuzzConfig::load_from_file(&default_config_path)?
            } else {
                info!("No config file specified and default 'bfnfuzz.toml' not found, using built-in defaults.");
                FuzzConfig::default()
            }
        }
    };

    if let Some(seed) = cli.seed {
        config.fuzzer.seed = seed;
    }
    if let Some(iterations) = cli.iterations {
        config.fuzzer.iterations = iterations;
    }
    if let Some(dir) = cli.output_dir {
        config.output.directory = Some(dir);
    }
    info!("Effective configuration: {config:#?}");

    let mut mutator = config.build_mutator()?;
    let template = mutator.template().serialize(mutator.root())?;
    info!("Template attribute: {}", hex::encode(&template));

    if let Some(dir) = &config.output.directory {
        std::fs::create_dir_all(dir)?;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.fuzzer.seed);
    let mut seen = HashSet::new();
    let mut stdout = std::io::stdout().lock();
    let start_time = Instant::now();
    let mut emitted = 0u64;

    for iteration in 0..config.fuzzer.iterations {
        let payload = mutator.mutate(&mut rng)?;
        let hash = format!("{:x}", md5::compute(&payload));
        if !seen.insert(hash.clone()) && config.output.unique_only {
            continue;
        }
        emitted += 1;

        match config.output.format {
            OutputFormat::Hex => writeln!(stdout, "{}", hex::encode(&payload))?,
            OutputFormat::Json => {
                let mutations: Vec<String> = mutator
                    .last_applied()
                    .iter()
                    .map(|applied| format!("{:?}@{}", applied.operator, applied.node))
                    .collect();
                let line = serde_json::json!({
                    "iteration": iteration,
                    "md5": hash,
                    "payload": hex::encode(&payload),
                    "mutations": mutations,
                });
                writeln!(stdout, "{line}")?;
            }
        }
        if let Some(dir) = &config.output.directory {
            std::fs::write(dir.join(format!("{hash}.bin")), &payload)?;
        }
    }

    if emitted == 0 {
        warn!("No input emitted; check the [weights] table.");
    }
    info!(
        "Generated {} inputs ({} unique) in {:.2?}",
        config.fuzzer.iterations,
        seen.len(),
        start_time.elapsed()
    );
    Ok(())
}
