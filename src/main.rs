use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use storehouse::auth::password;
use storehouse::Config;

#[derive(Parser, Debug)]
#[command(name = "storehouse", version, about = "Role-gated inventory API for stores and their items")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway.
    Serve {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overrides [gateway] host.
        #[arg(long)]
        host: Option<String>,

        /// Overrides [gateway] port.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a PHC password hash for an [[auth.users]] entry.
    HashPassword {
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Load and validate the configuration, then print a summary.
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            storehouse::gateway::run_gateway(config).await
        }
        Commands::HashPassword { password } => {
            let password = match password {
                Some(p) => p,
                None => read_password_line()?,
            };
            if password.is_empty() {
                anyhow::bail!("Password cannot be empty");
            }
            let hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
                .await
                .context("Hashing task failed")??;
            println!("{hash}");
            Ok(())
        }
        Commands::CheckConfig { config } => {
            let config = Config::load(config.as_deref())?;
            println!("Config OK");
            println!("  listen:            {}:{}", config.gateway.host, config.gateway.port);
            println!("  database:          {}", config.resolved_db_path().display());
            println!("  users:             {}", config.auth.users.len());
            println!("  seed demo users:   {}", config.auth.seed_demo_users);
            println!("  unlisted identity: {:?}", config.auth.unlisted_identity);
            println!("  token ttl:         {}s", config.auth.token_ttl_secs);
            println!(
                "  token secret:      {}",
                if config.auth.token_secret.is_some() {
                    "configured"
                } else {
                    "generated per process"
                }
            );
            Ok(())
        }
    }
}

fn read_password_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
