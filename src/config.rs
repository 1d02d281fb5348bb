use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub s3: S3Config,
}

/// Connection settings for the external object store.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores; AWS when unset.
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Encrypted file vault API")]
pub struct Args {
    /// Host to bind to (overrides VAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VAULT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides VAULT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        let env_host = env::var("VAULT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("VAULT_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing VAULT_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading VAULT_PORT"),
        };
        let env_db = env::var("VAULT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/file_vault.db".into());

        let s3 = S3Config {
            bucket: env::var("AWS_BUCKET_NAME").unwrap_or_default(),
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint: env::var("AWS_ENDPOINT").ok().filter(|v| !v.is_empty()),
            access_key: env::var("AWS_ACCESS").unwrap_or_default(),
            secret_key: env::var("AWS_SECRET").unwrap_or_default(),
        };

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            s3,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
