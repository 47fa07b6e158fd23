//! `broker`: command-line client for the broker assistant backend.
//!
//! Drives the same session, login and application flows as the
//! mini-program, with a local redb store standing in for device storage.

mod commands;
mod platform;

use clap::{Parser, Subcommand};

/// Broker assistant CLI.
#[derive(Parser, Debug)]
#[command(name = "broker", about = "Broker assistant CLI client")]
struct Cli {
    /// Path to client config file (default: ~/.broker/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in, reusing a valid stored session.
    Login {
        /// Force a fresh login that shares the user profile.
        #[arg(long)]
        profile: bool,
        /// Platform login code. Uses platform credentials instead of mock ones.
        #[arg(long)]
        code: Option<String>,
        #[command(flatten)]
        fields: ProfileArgs,
    },

    /// Clear the stored session.
    Logout,

    /// Show the stored session and profile.
    Status,

    /// Check whether the stored session is still valid.
    Check,

    /// Exchange the stored token for a new one.
    Refresh,

    /// Update profile fields on the backend and locally.
    Profile {
        #[command(flatten)]
        fields: ProfileArgs,
    },

    /// Upload a new avatar image.
    Avatar {
        file: std::path::PathBuf,
    },

    /// List buildings open for application.
    Buildings,

    /// Submit a broker application.
    Apply {
        #[arg(long = "name")]
        real_name: String,
        #[arg(long)]
        phone: String,
        /// Building id (see `broker buildings`).
        #[arg(long)]
        building: i64,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        license: Option<String>,
    },

    /// Show version.
    Version,
}

/// Profile fields settable from the command line.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ProfileArgs {
    #[arg(long)]
    pub nick: Option<String>,
    #[arg(long)]
    pub avatar: Option<String>,
    #[arg(long)]
    pub phone_number: Option<String>,
    /// 0 unknown, 1 male, 2 female.
    #[arg(long)]
    pub gender: Option<u8>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub province: Option<String>,
}

impl ProfileArgs {
    /// camelCase patch of the fields that were given.
    pub fn to_patch(&self) -> serde_json::Value {
        let mut patch = serde_json::Map::new();
        let mut put = |key: &str, value: Option<serde_json::Value>| {
            if let Some(v) = value {
                patch.insert(key.to_string(), v);
            }
        };
        put("nickName", self.nick.clone().map(Into::into));
        put("avatarUrl", self.avatar.clone().map(Into::into));
        put("phoneNumber", self.phone_number.clone().map(Into::into));
        put("gender", self.gender.map(Into::into));
        put("city", self.city.clone().map(Into::into));
        put("province", self.province.clone().map(Into::into));
        serde_json::Value::Object(patch)
    }

    /// Profile shared at login, if any field was given.
    pub fn to_profile(&self) -> Option<broker_auth::UserProfile> {
        let patch = self.to_patch();
        if patch.as_object().is_none_or(|m| m.is_empty()) {
            return None;
        }
        serde_json::from_value(patch).ok()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(broker_core::ClientConfig::default_path);
    let json_output = cli.output == "json";

    match cli.command {
        Commands::Version => {
            println!("broker cli v{}", env!("CARGO_PKG_VERSION"));
        }

        Commands::Login { profile, code, fields } => {
            let ctx = commands::context::Context::open(&config_path, code, fields.to_profile())?;
            commands::session::login(&ctx, profile, json_output).await?;
        }

        Commands::Logout => {
            let ctx = commands::context::Context::open(&config_path, None, None)?;
            commands::session::logout(&ctx).await;
        }

        Commands::Status => {
            let ctx = commands::context::Context::open(&config_path, None, None)?;
            commands::session::status(&ctx, json_output).await?;
        }

        Commands::Check => {
            let ctx = commands::context::Context::open(&config_path, None, None)?;
            commands::session::check(&ctx).await;
        }

        Commands::Refresh => {
            let ctx = commands::context::Context::open(&config_path, None, None)?;
            commands::session::refresh(&ctx).await?;
        }

        Commands::Profile { fields } => {
            let patch = fields.to_patch();
            if patch.as_object().is_none_or(|m| m.is_empty()) {
                anyhow::bail!("Provide at least one field, e.g. --nick <name>.");
            }
            let ctx = commands::context::Context::open(&config_path, None, None)?;
            commands::session::profile(&ctx, patch, json_output).await?;
        }

        Commands::Avatar { file } => {
            let ctx = commands::context::Context::open(&config_path, None, None)?;
            commands::session::avatar(&ctx, &file).await?;
        }

        Commands::Buildings => {
            let ctx = commands::context::Context::open(&config_path, None, None)?;
            commands::apply::buildings(&ctx, json_output).await?;
        }

        Commands::Apply {
            real_name,
            phone,
            building,
            company,
            license,
        } => {
            let ctx = commands::context::Context::open(&config_path, None, None)?;
            let input = commands::apply::ApplyInput {
                real_name,
                phone,
                building_id: building,
                company_name: company.unwrap_or_default(),
                license_no: license.unwrap_or_default(),
            };
            commands::apply::apply(&ctx, input).await?;
        }
    }

    Ok(())
}
