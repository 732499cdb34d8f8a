//! sealgate: signature-gated ingestion and transformation service
//!
//! Accepts uploaded ELF binaries over HTTP, authenticates them with
//! RSA-PSS digital signatures, and dispatches admitted inputs to an
//! external transformation program, serving the result for download.
//!
//! The `sign` subcommand covers the client side of the protocol: it
//! manages a persistent signing key pair and produces the signature and
//! public key to attach to an upload.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use sealgate::api::{self, AppState};
use sealgate::config::Config;
use sealgate::keys::{FileKeyStore, SigningIdentity};
use sealgate::{signer, storage};

#[derive(Parser)]
#[command(name = "sealgate")]
#[command(about = "Signature-gated ingestion and transformation service for ELF binaries")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sealgate.toml")]
    config: String,

    /// HTTP port (overrides config file)
    #[arg(long, env = "SEALGATE_HTTP_PORT")]
    http_port: Option<u16>,

    /// Upload directory (overrides config file)
    #[arg(long, env = "SEALGATE_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Output directory (overrides config file)
    #[arg(long, env = "SEALGATE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a file with the persisted client key pair
    Sign {
        /// File to sign
        file: PathBuf,

        /// Directory holding the signing key pair
        #[arg(long, env = "SEALGATE_KEYS_DIR", default_value = "keys")]
        keys_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sealgate=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load or create default config
    let mut config: Config = if std::path::Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&content)?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    // Apply CLI overrides
    if let Some(port) = cli.http_port {
        config.server.http_port = port;
    }
    if let Some(dir) = cli.upload_dir {
        config.storage.upload_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.storage.output_dir = dir;
    }

    if let Some(Commands::Sign { file, keys_dir }) = cli.command {
        return sign_command(&file, &keys_dir);
    }

    info!("Starting sealgate");
    info!("Upload dir: {}", config.storage.upload_dir.display());
    info!("Output dir: {}", config.storage.output_dir.display());
    info!(
        "Transformer: {} {:?}",
        config.pipeline.command, config.pipeline.script
    );

    storage::ensure_dirs(&config.storage)?;

    let port = config.server.http_port;
    let state = Arc::new(AppState::new(config));
    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Client-side signing flow: load-or-create the key pair, hash and sign
/// the file, print the material to attach to the upload.
fn sign_command(file: &PathBuf, keys_dir: &PathBuf) -> anyhow::Result<()> {
    let store = FileKeyStore::new(keys_dir);
    let identity = SigningIdentity::get_or_create(&store)?;

    let signature = signer::sign_file(&identity.private_key, file)?;

    println!("signature: {}", signature);
    println!("public key:\n{}", identity.public_key_pem);
    Ok(())
}
