//! Command-line front end for checking, applying and publishing signed updates.

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use selfupdate::{
    sha256_hex, signature_locator, FileSource, HttpSource, Platform, ReplaceStrategy, Source,
    TrustRoot, UpdateOutcome, Updater, UpdaterConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

/// Command-line arguments for the updater
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file with default settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report whether a newer release is published
    Check(UpdateArgs),
    /// Run one update cycle
    Apply(UpdateArgs),
    /// Run update cycles periodically until one installs
    Watch {
        #[command(flatten)]
        update: UpdateArgs,

        /// Seconds between cycles
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Generate a signing key pair
    Keygen {
        /// Where to write the hex encoded secret seed
        #[arg(short, long, default_value = "selfupdate.key")]
        out: PathBuf,
    },
    /// Write a detached `<file>.ed25519` signature
    Sign {
        /// File holding the hex encoded secret seed
        #[arg(short, long)]
        key: PathBuf,

        /// Release artefact to sign
        file: PathBuf,
    },
    /// Produce a bsdiff delta between two executables
    Diff { old: PathBuf, new: PathBuf, out: PathBuf },
}

/// Options shared by commands that talk to a release source
#[derive(Args, Debug, Default)]
struct UpdateArgs {
    /// Manifest URL, may contain {OS}, {Arch}, {Ext} and {Executable}
    #[arg(long, conflicts_with = "dir")]
    url: Option<String>,

    /// Local release directory holding manifest.json
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Hex encoded ed25519 public key
    #[arg(long)]
    public_key: Option<String>,

    /// Version of the executable being updated
    #[arg(long)]
    current_version: Option<String>,

    /// Executable to replace (defaults to this binary)
    #[arg(long)]
    target: Option<PathBuf>,

    /// Force `rename-over` or `rename-aside`
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<ReplaceStrategy>,

    /// Download deadline in seconds
    #[arg(long)]
    fetch_timeout: Option<u64>,
}

/// Settings read from the `--config` file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    url: Option<String>,
    dir: Option<PathBuf>,
    public_key: Option<String>,
    current_version: Option<String>,
    target: Option<PathBuf>,
    strategy: Option<ReplaceStrategy>,
    fetch_timeout_secs: Option<u64>,
    interval_secs: Option<u64>,
}

impl FileConfig {
    fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Command-line values win over file values.
    fn merge(self, args: UpdateArgs) -> UpdateArgs {
        let dir = args.dir.or(if args.url.is_some() { None } else { self.dir });
        UpdateArgs {
            url: args.url.or(if dir.is_some() { None } else { self.url }),
            dir,
            public_key: args.public_key.or(self.public_key),
            current_version: args.current_version.or(self.current_version),
            target: args.target.or(self.target),
            strategy: args.strategy.or(self.strategy),
            fetch_timeout: args.fetch_timeout.or(self.fetch_timeout_secs),
        }
    }
}

fn parse_strategy(raw: &str) -> Result<ReplaceStrategy, String> {
    match raw {
        "rename-over" => Ok(ReplaceStrategy::RenameOver),
        "rename-aside" => Ok(ReplaceStrategy::RenameAside),
        other => Err(format!("unknown strategy {other:?}")),
    }
}

fn build_updater(args: UpdateArgs) -> anyhow::Result<Updater<Box<dyn Source>>> {
    let public_key = args
        .public_key
        .ok_or_else(|| anyhow!("a public key is required (--public-key or config)"))?;
    let trust_root = TrustRoot::from_hex(&public_key)?;

    let mut config = match args.target {
        Some(target) => {
            let current = args
                .current_version
                .ok_or_else(|| anyhow!("--current-version is required with --target"))?;
            UpdaterConfig::new(current, target, trust_root)
        }
        None => UpdaterConfig::for_current_exe(
            args.current_version
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            trust_root,
        )?,
    };
    if let Some(strategy) = args.strategy {
        config = config.strategy(strategy);
    }
    if let Some(secs) = args.fetch_timeout {
        config = config.fetch_timeout(Duration::from_secs(secs));
    }

    let platform = Platform::current();
    let source: Box<dyn Source> = match (args.url, args.dir) {
        (Some(url), _) => {
            let client = reqwest::Client::builder()
                .user_agent(concat!("selfupdate/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Box::new(HttpSource::new(client, &url, platform))
        }
        (None, Some(dir)) => Box::new(FileSource::new(dir, platform)),
        (None, None) => bail!("no release source configured (--url or --dir)"),
    };

    Ok(Updater::new(source, config))
}

fn report(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::UpToDate { current, latest } => {
            println!("up to date: running {current}, latest {latest}");
        }
        UpdateOutcome::Installed { version, report } => {
            println!(
                "installed {} at {}; restart to use it",
                version.number,
                report.target_path.display()
            );
            if let Some(leftover) = &report.leftover {
                println!("old executable left at {}", leftover.display());
            }
        }
    }
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling update");
            token.cancel();
        }
    });
    cancel
}

fn read_signing_key(path: &Path) -> anyhow::Result<SigningKey> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading key {}", path.display()))?;
    let seed: [u8; 32] = hex::decode(raw.trim())
        .context("key file is not hex")?
        .try_into()
        .map_err(|_| anyhow!("key seed must be 32 bytes"))?;
    Ok(SigningKey::from_bytes(&seed))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug,selfupdate=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,selfupdate=info"))
    };
    fmt().with_env_filter(filter).init();

    let file = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check(args) => {
            let updater = build_updater(file.merge(args))?;
            match updater.check().await? {
                Some(version) => println!(
                    "update available: {} -> {}",
                    updater.config().current_version,
                    version.number
                ),
                None => println!("up to date ({})", updater.config().current_version),
            }
        }
        Commands::Apply(args) => {
            let updater = build_updater(file.merge(args))?;
            let outcome = updater.run_cycle(&shutdown_on_ctrl_c()).await?;
            report(&outcome);
        }
        Commands::Watch { update, interval } => {
            let every = Duration::from_secs(interval.or(file.interval_secs).unwrap_or(3600));
            let updater = build_updater(file.merge(update))?;
            tracing::info!(every = ?every, "watching for updates. Press Ctrl+C to exit.");
            if let Some(outcome) = updater.run_periodically(every, &shutdown_on_ctrl_c()).await? {
                report(&outcome);
            }
        }
        Commands::Keygen { out } => {
            let mut seed = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut seed);
            let key = SigningKey::from_bytes(&seed);
            std::fs::write(&out, hex::encode(seed))
                .with_context(|| format!("writing {}", out.display()))?;
            println!("secret seed written to {}", out.display());
            println!("public key: {}", hex::encode(key.verifying_key().as_bytes()));
        }
        Commands::Sign { key, file: artefact } => {
            let key = read_signing_key(&key)?;
            let payload = std::fs::read(&artefact)
                .with_context(|| format!("reading {}", artefact.display()))?;
            let signature = key.sign(&payload);
            let out = PathBuf::from(signature_locator(&artefact.display().to_string()));
            std::fs::write(&out, signature.to_bytes())
                .with_context(|| format!("writing {}", out.display()))?;
            println!("{}", out.display());
        }
        Commands::Diff { old, new, out } => {
            let old_bytes =
                std::fs::read(&old).with_context(|| format!("reading {}", old.display()))?;
            let new_bytes =
                std::fs::read(&new).with_context(|| format!("reading {}", new.display()))?;
            let mut patch = Vec::new();
            bsdiff::diff(&old_bytes, &new_bytes, &mut patch).context("computing delta")?;
            std::fs::write(&out, &patch).with_context(|| format!("writing {}", out.display()))?;
            println!("sha256 of {}: {}", new.display(), sha256_hex(&new_bytes));
        }
    }

    Ok(())
}
