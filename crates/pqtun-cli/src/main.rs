use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use pqtun_proto::auth::{HmacVerifier, PasswordLookup};
use pqtun_server::{AllowList, Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "pqtun", version, about = "Post-quantum authenticated tunnelling proxy")]
struct Cli {
    /// Set log level: error,warn,info,debug,trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server and accept connections until interrupted
    Start {
        /// Address to bind to
        #[arg(long, short = 'h', default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, short = 'p', default_value_t = 9443)]
        port: u16,

        /// ML-KEM security level (768 or 1024)
        #[arg(long, default_value_t = 768)]
        bits: u16,

        /// Protocols clients may request, comma-separated
        #[arg(long, default_value = "tcp,udp")]
        allowed_protocols: String,

        /// Deadline for each handshake step, in seconds
        #[arg(long, default_value_t = 5)]
        step_deadline: u64,

        /// Minimum accepted size of the decrypted id/metadata record
        #[arg(long, default_value_t = 2)]
        id_meta_min_size: usize,

        /// Maximum accepted size of the decrypted id/metadata record
        #[arg(long, default_value_t = 256)]
        id_meta_max_size: usize,

        /// Minimum accepted size of the decrypted signature
        #[arg(long, default_value_t = 32)]
        sig_min_size: usize,

        /// Maximum accepted size of the decrypted signature
        #[arg(long, default_value_t = 32)]
        sig_max_size: usize,
    },

    /// Print version information
    Version,
}

/// A fixed-password lookup, matching the example deployment's hardcoded
/// credential: every client identity authenticates with the same password.
/// Real deployments should supply their own [`PasswordLookup`].
struct FixedPassword(&'static str);

impl PasswordLookup for FixedPassword {
    fn lookup(&self, _client_id: &[u8]) -> Option<Vec<u8>> {
        Some(self.0.as_bytes().to_vec())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_target(false)
        .init();

    match cli.cmd {
        Commands::Version => {
            println!("pqtun {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Start {
            host,
            port,
            bits,
            allowed_protocols,
            step_deadline,
            id_meta_min_size,
            id_meta_max_size,
            sig_min_size,
            sig_max_size,
        } => {
            start(
                host,
                port,
                bits,
                allowed_protocols,
                step_deadline,
                id_meta_min_size,
                id_meta_max_size,
                sig_min_size,
                sig_max_size,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn start(
    host: String,
    port: u16,
    bits: u16,
    allowed_protocols: String,
    step_deadline: u64,
    id_meta_min_size: usize,
    id_meta_max_size: usize,
    sig_min_size: usize,
    sig_max_size: usize,
) -> Result<()> {
    let kem = pqtun_proto::kem::KemKind::from_bits(bits)
        .with_context(|| format!("unsupported ML-KEM security level: {bits}"))?;

    let mut config = ServerConfig::default();
    config.bind_addr = format!("{host}:{port}");
    config.handshake.kem = kem;
    config.handshake.step_deadline = std::time::Duration::from_secs(step_deadline);
    config.handshake.id_meta_min_size = id_meta_min_size;
    config.handshake.id_meta_max_size = id_meta_max_size;
    config.handshake.signature_min_size = sig_min_size;
    config.handshake.signature_max_size = sig_max_size;

    let verifier = Arc::new(HmacVerifier::new(FixedPassword("password")));
    let protocols: Vec<String> = allowed_protocols.split(',').map(|s| s.trim().to_string()).collect();
    let policy = Arc::new(AllowList::new(protocols));

    let server = Server::start(config, verifier, policy, None)
        .await
        .context("failed to start server")?;

    tracing::info!(addr = %server.local_addr(), "listening");

    tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    tracing::info!("shutting down");
    server.stop();
    server.wait().await;

    Ok(())
}
