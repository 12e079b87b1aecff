//! AetherVault CLI - hide encrypted files inside PNG images.
//!
//! Files are encrypted with a password and embedded into a cover image;
//! vault images are turned back into the original files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use aethervault_common::Password;
use aethervault_vault::{
    BatchRunner, BatchSummary, CollisionPolicy, CoverSource, Job, JobReport, Mode,
    PipelineConfig, VaultPipeline,
};

/// Environment variable consulted before prompting for a password.
const PASSWORD_ENV: &str = "AETHERVAULT_PASSWORD";

#[derive(Parser)]
#[command(name = "aethervault")]
#[command(about = "AetherVault - Encrypted steganographic file vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Load pipeline settings from a JSON file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that override the configuration file.
#[derive(clap::Args)]
struct Overrides {
    /// Write outputs into this directory instead of next to the inputs.
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Files processed in parallel.
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// What to do when an output file already exists.
    #[arg(long, global = true, value_enum)]
    on_collision: Option<Collision>,

    /// Use this image as cover instead of generating one.
    #[arg(long, global = true)]
    cover: Option<PathBuf>,

    /// Download cover images instead of generating them.
    #[arg(long, global = true, conflicts_with = "cover")]
    remote_cover: bool,

    /// Never compress before encrypting.
    #[arg(long, global = true)]
    no_compress: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Collision {
    Overwrite,
    Fail,
    Rename,
}

impl From<Collision> for CollisionPolicy {
    fn from(value: Collision) -> Self {
        match value {
            Collision::Overwrite => CollisionPolicy::Overwrite,
            Collision::Fail => CollisionPolicy::Fail,
            Collision::Rename => CollisionPolicy::AutoRename,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt files into vault images.
    Encrypt {
        /// Files to encrypt.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Recover files from vault images.
    Decrypt {
        /// Vault images to decrypt.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Decrypt PNG files and encrypt everything else.
    Process {
        /// Files to process.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show how large a file fits into a cover of the given size.
    Capacity {
        /// Cover width in pixels.
        #[arg(long, default_value_t = aethervault_stego::cover::DEFAULT_WIDTH)]
        width: u32,

        /// Cover height in pixels.
        #[arg(long, default_value_t = aethervault_stego::cover::DEFAULT_HEIGHT)]
        height: u32,

        /// Extension of the file to store, e.g. ".pdf".
        #[arg(long, default_value = ".dat")]
        ext: String,
    },

    /// Print the effective configuration as JSON.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref(), &cli.overrides)?;

    match cli.command {
        Commands::Encrypt { files } => cmd_run(config, files, Some(Mode::Encrypt)).await,
        Commands::Decrypt { files } => cmd_run(config, files, Some(Mode::Decrypt)).await,
        Commands::Process { files } => cmd_run(config, files, None).await,
        Commands::Capacity { width, height, ext } => cmd_capacity(&config, width, height, &ext),
        Commands::Config => cmd_config(&config),
    }
}

/// Build the pipeline configuration from file and flags.
fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &overrides.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if let Some(workers) = overrides.workers {
        config.workers = workers;
    }
    if let Some(collision) = overrides.on_collision {
        config.collision = collision.into();
    }
    if let Some(cover) = &overrides.cover {
        config.cover.source = CoverSource::File {
            path: cover.clone(),
        };
    } else if overrides.remote_cover {
        config.cover.source = CoverSource::Remote;
    }
    if overrides.no_compress {
        config.compression.enabled = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Read the password from the environment or prompt for it.
fn read_password(confirm: bool) -> Result<Password> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        let password = Password::new(password);
        if password.is_empty() {
            anyhow::bail!("{} is set but empty", PASSWORD_ENV);
        }
        return Ok(password);
    }

    let password = Password::new(
        rpassword::prompt_password("Enter password: ").context("Failed to read password")?,
    );
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    if confirm {
        let again = Password::new(
            rpassword::prompt_password("Confirm password: ").context("Failed to read password")?,
        );
        if again.as_bytes() != password.as_bytes() {
            anyhow::bail!("Passwords do not match");
        }
    }
    Ok(password)
}

/// Encrypt, decrypt or auto-detect over a list of files.
async fn cmd_run(config: PipelineConfig, files: Vec<PathBuf>, mode: Option<Mode>) -> Result<()> {
    let jobs: Vec<Job> = files
        .into_iter()
        .map(|file| match mode {
            Some(mode) => Job::new(file, mode),
            None => Job::detect(file),
        })
        .collect();

    let encrypting = jobs.iter().any(|job| job.mode == Mode::Encrypt);
    let password = read_password(encrypting)?;

    let pipeline = VaultPipeline::new(config).context("Failed to build pipeline")?;
    info!(cover = pipeline.cover_name(), "Pipeline ready");
    let runner = BatchRunner::new(Arc::new(pipeline));

    let token = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing files in progress");
            token.cancel();
        }
    });

    let reports = runner.run(jobs, password, None).await;
    for report in &reports {
        print_report(report);
    }

    let summary = BatchSummary::from_reports(&reports);
    println!(
        "\n{} succeeded, {} failed, {} cancelled",
        summary.succeeded, summary.failed, summary.cancelled
    );
    if summary.failed + summary.cancelled > 0 {
        anyhow::bail!(
            "{} of {} files not processed",
            summary.failed + summary.cancelled,
            reports.len()
        );
    }
    Ok(())
}

fn print_report(report: &JobReport) {
    match &report.outcome {
        Ok(output) => println!(
            "[{}] {} -> {}",
            report.mode,
            report.source.display(),
            output.display()
        ),
        Err(e) => {
            error!(file = %report.source.display(), kind = ?e.kind(), "{}", e);
            println!("[{}] {} FAILED: {}", report.mode, report.source.display(), e);
        }
    }
}

/// Print the capacity of a cover size.
fn cmd_capacity(config: &PipelineConfig, width: u32, height: u32, ext: &str) -> Result<()> {
    let max = VaultPipeline::max_plaintext_len(width, height, ext, config.suite.kdf)
        .with_context(|| format!("Invalid extension {:?}", ext))?;
    let raw = aethervault_stego::capacity_bits(width, height) / 8;

    println!("Cover:            {}x{}", width, height);
    println!("Raw capacity:     {} bytes", raw);
    println!("Max file size:    {} bytes ({:.2} MiB)", max, max as f64 / (1024.0 * 1024.0));
    println!("  (uncompressed; compressible files may be larger)");
    Ok(())
}

/// Print the effective configuration.
fn cmd_config(config: &PipelineConfig) -> Result<()> {
    println!("{}", config.to_json()?);
    Ok(())
}
