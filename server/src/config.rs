use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Command-line flags. Every field is optional and only flags the user
/// actually passed are serialized, so an absent flag never masks a value
/// from the TOML file or the environment.
#[derive(Parser, Serialize, Deserialize, Clone, Debug, Default)]
#[command(name = "outpass-server", version, about = "Outpass request server")]
pub struct CliArgs {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file [default: ./outpass.toml]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Lifetime of issued bearer tokens, in days
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_ttl_days: Option<i64>,

    /// Comma-separated list of allowed CORS origins ("*" allows any)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors_origins: Option<String>,

    /// Prefix prepended to the access token before it is encoded into a QR code
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload_prefix: Option<String>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub config: String,
    pub json_logs: bool,
    pub generate_config: bool,
    pub data_dir: String,
    pub token_ttl_days: i64,
    pub cors_origins: String,
    pub qr_payload_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8001,
            bind_address: "0.0.0.0".to_string(),
            config: "./outpass.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            token_ttl_days: 7,
            cors_origins: "*".to_string(),
            qr_payload_prefix: "hitam:outpass:".to_string(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (OUTPASS_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_args(CliArgs::parse())
    }

    /// Same layering as `load`, with already-parsed flags.
    pub fn from_args(cli: CliArgs) -> Result<Self, figment::Error> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| Config::default().config);

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("OUTPASS_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    /// Parsed CORS origin list. An empty list means "allow any".
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|o| o.trim())
            .filter(|o| !o.is_empty() && *o != "*")
            .map(str::to_string)
            .collect()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Outpass Server Configuration
# Place this file at ./outpass.toml or specify with --config <path>
# All settings can be overridden via environment variables (OUTPASS_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8001)
# port = 8001

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# Bearer token lifetime in days
# token_ttl_days = 7

# Allowed CORS origins, comma-separated. "*" allows any origin.
# cors_origins = "*"

# Prefix encoded into approved outpass QR codes ahead of the access token
# qr_payload_prefix = "hitam:outpass:"
"#
    .to_string()
}
