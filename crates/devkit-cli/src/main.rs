//! devkit-hash: command line front end for the hash offload service.
//!
//! Results go to stdout; logs go to stderr and follow `RUST_LOG`.

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use devkit_hash_offload::domain::hashing::{MAX_COST, MIN_COST};
use devkit_hash_offload::{
    HashJob, HashOffloadApi, HashOffloadService, HashParams, HashVariant, OffloadConfig,
};

/// bcrypt hashing on isolated worker threads
#[derive(Parser, Debug)]
#[command(name = "devkit-hash", version)]
#[command(about = "Hash and verify passwords with bcrypt off the main thread")]
struct Args {
    /// Worker threads (overrides DEVKIT_HASH_WORKERS)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Per-request deadline in milliseconds (overrides DEVKIT_HASH_TIMEOUT_MS)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hash a password
    Hash {
        password: String,

        /// Cost factor (defaults to DEVKIT_HASH_ROUNDS or 10)
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Fixed salt, 22 chars of bcrypt base64
        #[arg(long)]
        salt: Option<String>,

        /// Version prefix: 2a, 2b, 2x or 2y
        #[arg(long)]
        variant: Option<HashVariant>,
    },

    /// Check a password against a bcrypt hash. Exits 1 on mismatch.
    Verify { password: String, hash: String },

    /// Time one hash per cost factor
    Bench {
        #[arg(long, default_value_t = MIN_COST)]
        from: u32,

        #[arg(long, default_value_t = 12)]
        to: u32,

        #[arg(long, default_value = "test123")]
        password: String,
    },
}

impl Args {
    /// Environment config with command line overrides on top.
    fn config(&self) -> OffloadConfig {
        let mut config = OffloadConfig::from_env();
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.default_timeout_ms = Some(timeout_ms);
        }
        config
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging();

    let config = args.config();
    debug!(?config, "Loaded configuration");
    let service = HashOffloadService::new(config).context("invalid hash offload configuration")?;

    let outcome = run(&service, &args).await;
    service.shutdown().await;
    outcome
}

async fn run(service: &HashOffloadService, args: &Args) -> Result<ExitCode> {
    match &args.command {
        Command::Hash {
            password,
            rounds,
            salt,
            variant,
        } => {
            let job = HashJob::Hash(HashParams {
                password: password.as_str().into(),
                rounds: rounds.unwrap_or(service.config().default_rounds),
                salt: salt.clone(),
                variant: *variant,
            });
            let output = service.submit(job, None).await?.into_hash()?;

            if args.json {
                println!(
                    "{}",
                    json!({ "hash": output.hash, "computeTimeMs": output.compute_time_ms })
                );
            } else {
                println!("{}", output.hash);
            }
            info!(elapsed_ms = output.compute_time_ms, "Hash computed");
            Ok(ExitCode::SUCCESS)
        }

        Command::Verify { password, hash } => {
            let matches = service
                .verify(password.as_str().into(), hash.clone())
                .await?;

            if args.json {
                println!("{}", json!({ "matches": matches }));
            } else {
                println!("{}", if matches { "match" } else { "mismatch" });
            }
            Ok(if matches {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Bench { from, to, password } => {
            let costs = bench_range(*from, *to)?;
            let mut samples = Vec::with_capacity(costs.clone().count());

            for rounds in costs {
                let output = service
                    .hash(password.as_str().into(), rounds)
                    .await
                    .with_context(|| format!("cost {} failed", rounds))?;
                if !args.json {
                    println!("cost {:>2}  {:>8} ms", rounds, output.compute_time_ms);
                }
                samples.push(json!({ "rounds": rounds, "computeTimeMs": output.compute_time_ms }));
            }

            if args.json {
                println!("{}", serde_json::Value::Array(samples));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn bench_range(from: u32, to: u32) -> Result<std::ops::RangeInclusive<u32>> {
    if from > to {
        bail!("--from {} is greater than --to {}", from, to);
    }
    if from < MIN_COST || to > MAX_COST {
        bail!("cost range must stay within {}..={}", MIN_COST, MAX_COST);
    }
    Ok(from..=to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hash_command() {
        let args = Args::try_parse_from([
            "devkit-hash",
            "hash",
            "test123",
            "--rounds",
            "6",
            "--variant",
            "2a",
            "--json",
        ])
        .unwrap();

        assert!(args.json);
        match args.command {
            Command::Hash {
                password,
                rounds,
                variant,
                salt,
            } => {
                assert_eq!(password, "test123");
                assert_eq!(rounds, Some(6));
                assert_eq!(variant, Some(HashVariant::TwoA));
                assert_eq!(salt, None);
            }
            other => panic!("expected hash command, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_variant_rejected() {
        assert!(Args::try_parse_from(["devkit-hash", "hash", "pw", "--variant", "3z"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let args =
            Args::try_parse_from(["devkit-hash", "--workers", "3", "--timeout-ms", "250", "verify", "pw", "h"])
                .unwrap();
        let config = args.config();

        assert_eq!(config.workers, 3);
        assert_eq!(config.default_timeout_ms, Some(250));
    }

    #[test]
    fn test_bench_range() {
        assert_eq!(bench_range(4, 6).unwrap(), 4..=6);
        assert!(bench_range(8, 6).is_err());
        assert!(bench_range(3, 6).is_err());
        assert!(bench_range(4, 32).is_err());
    }

    #[tokio::test]
    async fn test_verify_exit_code() {
        let args = Args::try_parse_from(["devkit-hash", "verify", "pw", "not-a-hash"]).unwrap();
        let service = HashOffloadService::new(OffloadConfig::default()).unwrap();

        let code = run(&service, &args).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);

        service.shutdown().await;
    }
}
