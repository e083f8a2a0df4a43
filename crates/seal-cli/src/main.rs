//! seal: chunked streaming authenticated encryption for files
//!
//! Commands:
//!   encrypt <input> <output>          - encrypt with a fresh key, print the key as hex on stdout
//!   decrypt <input> <output> <key>    - verify and decrypt with a 64-character hex key
//!   config show                       - display the active configuration
//!
//! Logs and progress go to stderr so stdout carries only the key.
//!
//! There is no interrupt handler. On Ctrl-C the process exits and, with atomic
//! output (the default), the `.seal-*.partial` temporary file is removed, so
//! the output path never holds an incomplete stream or unverified plaintext.
//! Cooperative cancellation (`seal_engine::CancelToken`) is for library callers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use seal_core::config::expand_tilde;
use seal_core::SealConfig;
use seal_engine::{EngineOptions, ProgressFn};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "seal",
    version,
    about = "Chunked streaming authenticated file encryption",
    long_about = "seal: encrypt files of any size into an authenticated chunk stream, and decrypt them back"
)]
struct Cli {
    /// Path to the configuration file [default: ~/.config/sealstream/config.toml]
    #[arg(long, short = 'c', env = "SEAL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "SEAL_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "SEAL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file under a freshly generated key and print the key as hex
    Encrypt {
        /// Plaintext input file
        input: PathBuf,
        /// Ciphertext output file
        output: PathBuf,
        #[command(flatten)]
        output_opts: OutputArgs,
    },

    /// Decrypt a file produced by `seal encrypt`
    Decrypt {
        /// Ciphertext input file
        input: PathBuf,
        /// Plaintext output file
        output: PathBuf,
        /// 64-character hex key printed by `seal encrypt`
        #[arg(env = "SEAL_KEY", hide_env_values = true)]
        key: String,
        #[command(flatten)]
        output_opts: OutputArgs,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Write straight to the output path instead of renaming a temporary file into place
    #[arg(long)]
    no_atomic: bool,
    /// Show a progress bar on stderr
    #[arg(long)]
    progress: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(SealConfig::default_path);
    let config = SealConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Encrypt { input, output, output_opts } => {
            cmd_encrypt(&config, &input, &output, &output_opts)
        }
        Commands::Decrypt { input, output, key, output_opts } => {
            let key = SecretString::from(key);
            cmd_decrypt(&config, &input, &output, &key, &output_opts)
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

fn engine_options<'a>(
    config: &SealConfig,
    args: &OutputArgs,
    progress: Option<&'a ProgressFn>,
) -> EngineOptions<'a> {
    EngineOptions {
        progress,
        cancel: None,
        atomic_output: config.output.atomic && !args.no_atomic,
    }
}

// ── `seal encrypt` ────────────────────────────────────────────────────────────

fn cmd_encrypt(config: &SealConfig, input: &Path, output: &Path, args: &OutputArgs) -> Result<()> {
    let key = seal_crypto::generate_key();

    let pb = (config.output.progress || args.progress).then(|| make_progress_bar("encrypt"));
    let callback = pb.as_ref().map(progress_callback);
    let opts = engine_options(config, args, callback.as_ref());

    let result = seal_engine::encrypt_file(&key, input, output, &opts)
        .with_context(|| format!("encrypting {} → {}", input.display(), output.display()));
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let summary = result?;

    println!("{}", seal_crypto::encode_hex(&key).as_str());
    key.release();

    info!(
        chunks = summary.chunks,
        plaintext_bytes = summary.plaintext_bytes,
        ciphertext_bytes = summary.ciphertext_bytes,
        "encrypt complete"
    );
    Ok(())
}

// ── `seal decrypt` ────────────────────────────────────────────────────────────

fn cmd_decrypt(
    config: &SealConfig,
    input: &Path,
    output: &Path,
    key_hex: &SecretString,
    args: &OutputArgs,
) -> Result<()> {
    let key = seal_crypto::decode_hex(key_hex.expose_secret().trim()).context("parsing key")?;

    let pb = (config.output.progress || args.progress).then(|| make_progress_bar("decrypt"));
    let callback = pb.as_ref().map(progress_callback);
    let opts = engine_options(config, args, callback.as_ref());

    let result = seal_engine::decrypt_file(&key, input, output, &opts).map_err(|e| {
        let what = if e.is_integrity_failure() {
            "ciphertext failed verification (wrong key, or the file was modified or truncated)"
        } else {
            "decrypting"
        };
        anyhow::Error::new(e).context(format!("{what}: {} → {}", input.display(), output.display()))
    });
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    key.release();
    let summary = result?;

    info!(
        chunks = summary.chunks,
        plaintext_bytes = summary.plaintext_bytes,
        "decrypt complete"
    );
    Ok(())
}

// ── `seal config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &SealConfig, config_path: &Path) -> Result<()> {
    let path = expand_tilde(config_path);
    if path.exists() {
        println!("# config: {}", path.display());
    } else {
        println!("# config: {} (not found, showing defaults)", path.display());
    }
    print!("{}", config.to_toml_string().context("serializing config")?);
    Ok(())
}
