use std::path::Path;
use std::path::PathBuf;

use bitcoin::BlockHash;
use bitcoin::OutPoint;
use bitcoin::Txid;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use escrow::config::Settings;
use escrow::deposit::FundingProof;
use escrow::error::Error;
use escrow::keys::PublicKey;
use serde::Deserialize;
use serde::Serialize;
use spv::btc_utils;
use spv::relay::RelayVerifier;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogOutputFormat {
    Json,
    Pretty,
}

/// Command line tools for the deposit escrow.
#[derive(Debug, Parser)]
#[clap(name = "escrow")]
struct EscrowArgs {
    /// Optional path to the configuration file. If not provided, the
    /// defaults apply, overridden by any `ESCROW_` environment variables.
    #[clap(short = 'c', long, required = false)]
    config: Option<PathBuf>,

    #[clap(short = 'o', long = "output-format", default_value = "pretty")]
    output_format: Option<LogOutputFormat>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the checks that a deposit applies to a funding proof.
    VerifyFundingProof {
        /// Path to a JSON file holding the proof.
        #[clap(long)]
        proof: PathBuf,
        /// The difficulty of the current epoch, as reported by the relay.
        #[clap(long)]
        current_difficulty: u128,
        /// The difficulty of the previous epoch, as reported by the relay.
        #[clap(long)]
        previous_difficulty: u128,
    },
    /// Print the difficulty declared by each header.
    HeaderDifficulty {
        /// Hex encoded, concatenated 80-byte headers.
        #[clap(long)]
        headers: String,
    },
}

/// A funding proof file. The signer key and lot size are optional; the
/// corresponding checks are skipped without them.
#[derive(Debug, Deserialize)]
struct FundingProofFile {
    #[serde(flatten)]
    proof: FundingProof,
    signer_pubkey_x: Option<String>,
    signer_pubkey_y: Option<String>,
    #[serde(default)]
    lot_size: u64,
}

#[derive(Debug, Serialize)]
struct FundingSummary {
    txid: Txid,
    outpoint: OutPoint,
    utxo_value: u64,
    confirmations: usize,
    accumulated_difficulty: u128,
    tip: BlockHash,
}

#[derive(Debug, Serialize)]
struct HeaderSummary {
    index: usize,
    block_hash: BlockHash,
    difficulty: u128,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = EscrowArgs::parse();

    let pretty = matches!(args.output_format, Some(LogOutputFormat::Pretty));
    escrow::logging::setup_logging("info,escrow=debug,spv=debug", pretty);

    let settings = Settings::new(args.config.as_ref())?;

    match args.command {
        Command::VerifyFundingProof {
            proof,
            current_difficulty,
            previous_difficulty,
        } => {
            let summary = verify_funding_proof(&settings, &proof, previous_difficulty, current_difficulty)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::HeaderDifficulty { headers } => {
            for summary in header_difficulty(&headers)? {
                println!("{}", serde_json::to_string(&summary)?);
            }
        }
    }

    Ok(())
}

fn verify_funding_proof(
    settings: &Settings,
    path: &Path,
    previous_difficulty: u128,
    current_difficulty: u128,
) -> Result<FundingSummary, Error> {
    let file: FundingProofFile = serde_json::from_slice(&std::fs::read(path)?)?;

    let signer_script = match (&file.signer_pubkey_x, &file.signer_pubkey_y) {
        (Some(x), Some(y)) => {
            let key = PublicKey::from_coordinates(&decode_coordinate(x)?, &decode_coordinate(y)?)?;
            Some(key.signer_script())
        }
        _ => None,
    };

    let factor = settings.deposit.tx_proof_difficulty_factor;
    let verifier = RelayVerifier::from_difficulties(previous_difficulty, current_difficulty, factor);
    tracing::debug!(factor, previous_difficulty, current_difficulty, "verifying funding proof");

    let funding =
        escrow::deposit::validate_funding_proof(&file.proof, signer_script.as_deref(), file.lot_size, &verifier)
            .map_err(|error| {
                tracing::error!(%error, "funding proof rejected");
                Error::FundingProofInvalid(error)
            })?;

    Ok(FundingSummary {
        txid: funding.txid,
        outpoint: funding.outpoint,
        utxo_value: funding.utxo_value,
        confirmations: funding.chain.header_count,
        accumulated_difficulty: funding.chain.accumulated_difficulty,
        tip: funding.chain.tip,
    })
}

fn header_difficulty(headers: &str) -> Result<Vec<HeaderSummary>, Error> {
    let bytes = hex::decode(headers.trim())?;
    let headers = btc_utils::parse_headers(&bytes).map_err(spv::Error::from)?;

    Ok(headers
        .iter()
        .enumerate()
        .map(|(index, header)| HeaderSummary {
            index,
            block_hash: header.block_hash(),
            difficulty: btc_utils::extract_difficulty(header),
        })
        .collect())
}

fn decode_coordinate(coordinate: &str) -> Result<[u8; 32], Error> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(coordinate, &mut bytes)?;
    Ok(bytes)
}
