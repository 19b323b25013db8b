use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use seedsolver::addressset::AddressSet;
use seedsolver::config::RecoveryConfig;
use seedsolver::derivation::{chain_params, decode_chain_address, WalletDerivation};
use seedsolver::engine::{CpuBatchVerifier, SearchOutcome, VerificationEngine};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "seedsolver")]
#[command(about = "Partial seed phrase and extended-key recovery")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for the seed phrase described by a config file
    Recover {
        /// Path to the JSON configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Build an on-disk address database from a list of addresses
    BuildAddressdb {
        /// Input file, one address per line
        #[arg(short, long)]
        input: PathBuf,
        /// Output database file
        #[arg(short, long)]
        output: PathBuf,
        /// Chain the addresses belong to
        #[arg(long, default_value = "btc")]
        chain: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Recover { config } => recover(&config),
        Commands::BuildAddressdb {
            input,
            output,
            chain,
        } => build_addressdb(&input, &output, &chain),
    }
}

fn recover(config_path: &PathBuf) -> Result<()> {
    let config = RecoveryConfig::from_file(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let (wallet, _guess) = config.build_wallet()?;
    let wallet: Arc<dyn WalletDerivation> = Arc::from(wallet);
    let verifier = Arc::new(CpuBatchVerifier::new(Arc::clone(&wallet)));
    let engine = VerificationEngine::new(verifier, config.batch_size)?;

    let outcome = engine.run_partitioned(
        || config.build_generator(wallet.as_ref()),
        config.num_threads,
    )?;

    match outcome {
        SearchOutcome::Matched {
            candidate,
            examined,
        } => {
            let phrase = candidate.phrase(wallet.wordlist());
            println!("Seed phrase found after {} candidates:", examined);
            println!("  {}", phrase);
            if let Some(found) = wallet.derive_and_match(&candidate)? {
                println!("  path:    {}", found.path);
                println!("  index:   {}", found.index);
                println!("  matched: {}", found.address);
                if !found.passphrase.is_empty() {
                    println!("  passphrase: {}", found.passphrase);
                }
            }
            Ok(())
        }
        SearchOutcome::Exhausted { examined } => {
            println!("No match; search space of {} candidates exhausted", examined);
            std::process::exit(1);
        }
        SearchOutcome::Stopped { examined } => {
            println!("Search stopped after {} candidates", examined);
            std::process::exit(130);
        }
    }
}

fn build_addressdb(input: &PathBuf, output: &PathBuf, chain: &str) -> Result<()> {
    let params = chain_params(chain)?;
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let addresses: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    if addresses.is_empty() {
        anyhow::bail!("{} contains no addresses", input.display());
    }

    let mut set = AddressSet::with_capacity(addresses.len() as u64)?;
    for address in &addresses {
        let hash = decode_chain_address(params, address)
            .with_context(|| format!("decoding {}", address))?;
        set.add(&hash)?;
    }
    set.to_file(output)?;
    info!(
        "wrote {} addresses to {} ({} buckets)",
        set.len(),
        output.display(),
        set.table_len()
    );
    println!("Address database written to {}", output.display());
    Ok(())
}
