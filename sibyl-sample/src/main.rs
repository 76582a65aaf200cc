mod seed;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use bitcoin::bip32::Xpriv;
use bitcoin::Network;
use clap::Parser;
use sibyl::backend::{SecpSchnorrSigner, XprivKeyDeriver};
use sibyl::storage::{MemoryStorage, Storage};
use sibyl::{OracleSigner, Writeable};
use tracing::info;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Clone, Debug)]
struct OracleArgs {
    #[arg(long)]
    #[arg(help = "Set the log level.")]
    #[arg(default_value = "info")]
    log: String,
    #[arg(short, long)]
    #[arg(help = "Bitcoin network the oracle keys are derived for.")]
    #[arg(default_value = "regtest")]
    network: String,
    #[arg(short, long)]
    #[arg(help = "Directory where the oracle seed is stored.")]
    storage_dir: Option<PathBuf>,
    #[arg(long)]
    #[arg(help = "Identifier of the event to announce.")]
    #[arg(default_value = "sibyl-demo")]
    event_id: String,
    #[arg(long)]
    #[arg(help = "Unix timestamp at which the event matures.")]
    #[arg(default_value = "1735689600")]
    maturity: u32,
    #[arg(long)]
    #[arg(help = "Comma separated outcome labels.")]
    #[arg(value_delimiter = ',')]
    #[arg(default_value = "yes,no")]
    outcomes: Vec<String>,
    #[arg(long)]
    #[arg(help = "Outcome to attest to after announcing.")]
    outcome: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = OracleArgs::parse();

    let level = LevelFilter::from_str(&args.log).unwrap_or(LevelFilter::INFO);
    let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let network = Network::from_str(&args.network)?;
    let storage_dir = args.storage_dir.unwrap_or_else(|| PathBuf::from(".sibyl"));
    std::fs::create_dir_all(&storage_dir)?;

    let seed = seed::seed_from_path(&storage_dir)?;
    let xpriv = Xpriv::new_master(network, &seed)?;
    let signer = OracleSigner::build(
        network,
        XprivKeyDeriver::new(xpriv),
        SecpSchnorrSigner::new(),
    )?;
    info!("oracle public key: {}", signer.public_key());

    let store = MemoryStorage::new();
    let announcement =
        signer.create_enum_announcement(&args.event_id, args.maturity, args.outcomes)?;
    store.save_announcement(announcement.clone())?;

    println!("announcement: {}", hex::encode(announcement.encode()));
    println!("{}", serde_json::to_string_pretty(&announcement)?);

    if let Some(outcome) = args.outcome {
        let event = store
            .get_event(&args.event_id)?
            .context("event was just announced")?;
        let attestation =
            signer.create_enum_attestation(&event.announcement.oracle_event, &outcome)?;
        store.save_attestation(&args.event_id, attestation.clone())?;

        println!("attestation: {}", hex::encode(attestation.encode()));
    }

    Ok(())
}
