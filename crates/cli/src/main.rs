//! admigrate command-line tool.
//!
//! One-time migration of Active Directory principal IDs from their
//! Distinguished Name form to the stable objectGUID form, across users,
//! project/cluster role bindings and tokens.
//!
//! Subcommands: `check` (dry run), `migrate`, `rollback`, `candidates`
//! (completion helper), plus `init` / `validate` for the config file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use admigrate_core::api::{resolve_service_account_password, ManagementApi, RestApi};
use admigrate_core::config::AppConfig;
use admigrate_core::ldap::{LdapDirectory, LdapSettings};
use admigrate_core::migrate::{candidate_names, Migrator};
use admigrate_core::report::ConsoleReport;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Active Directory GUID principal migration tool.
#[derive(Parser, Debug)]
#[command(
    name = "admigrate",
    version,
    about = "Migrate Active Directory principal IDs to objectGUID form"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./admigrate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dry-run report of what would be migrated or rolled back.
    Check,

    /// Rewrite DN-form principals to their objectGUID form.
    Migrate {
        /// Restrict to these user names or principal IDs.
        ids: Vec<String>,
    },

    /// Rewrite objectGUID-form principals back to their DN form.
    Rollback {
        /// Restrict to these user names or principal IDs.
        ids: Vec<String>,
    },

    /// Print candidate user names, one per line (for shell completion).
    Candidates {
        /// List already-migrated names (rollback candidates) instead.
        #[arg(long)]
        migrated: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./admigrate.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // Minimal logging for CLI; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Candidates { migrated } => {
            let config = load_config(&cli.config)?;
            let api = build_api(&config)?;
            cmd_candidates(&api, migrated).await
        }
        command => {
            let config = load_config(&cli.config)?;
            let api = build_api(&config)?;
            let mut directory = connect_directory(&api).await?;
            let mut report = ConsoleReport;
            let mut migrator = Migrator::new(&api, &mut report);

            match command {
                Commands::Check => migrator.check(&mut directory).await?,
                Commands::Migrate { ids } => migrator.migrate(&mut directory, &ids).await?,
                Commands::Rollback { ids } => migrator.rollback(&mut directory, &ids).await?,
                _ => unreachable!(),
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn load_config(path: &PathBuf) -> Result<AppConfig> {
    let mut config =
        AppConfig::load_from_file(path).context("failed to load configuration file")?;
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_api(config: &AppConfig) -> Result<RestApi> {
    let ca_pem = match &config.api.ca_cert_file {
        Some(path) => Some(std::fs::read(path).context("failed to read api.ca_cert_file")?),
        None => None,
    };
    let token = config
        .api
        .token
        .as_deref()
        .context("bearer token not resolved")?;

    RestApi::new(
        &config.api.server,
        token,
        ca_pem.as_deref(),
        config.api.insecure,
    )
    .context("failed to build management API client")
}

/// Fetch the auth config, resolve the service-account secret, connect and
/// bind. Any failure here aborts before a single mutation.
async fn connect_directory(api: &RestApi) -> Result<LdapDirectory> {
    let ad_config = api
        .get_active_directory_config()
        .await
        .context("failed to read the activedirectory auth config")?;

    let password =
        resolve_service_account_password(api, &ad_config.service_account_password).await;

    let settings = LdapSettings::from_config(&ad_config, password)
        .context("invalid directory connection settings")?;
    let ldap = settings
        .connect()
        .await
        .context("failed to connect to the directory")?;

    Ok(LdapDirectory::new(ldap, &ad_config))
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_candidates(api: &RestApi, migrated: bool) -> Result<()> {
    let names = candidate_names(api, migrated)
        .await
        .context("failed to list candidates")?;
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn cmd_init(output: &PathBuf) -> Result<()> {
    let default_config = r#"# admigrate configuration
# The directory (LDAP) connection settings are read at runtime from the
# platform's activedirectory auth config; only the management API endpoint
# is configured here.

[api]
server = "https://mgmt.example.com"
token_env = "ADMIGRATE_TOKEN"
# ca_cert_file = "/etc/admigrate/ca.pem"
# insecure = false
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your management server URL");
    println!("  2. Export the bearer token: ADMIGRATE_TOKEN");
    println!(
        "  3. Validate with: admigrate validate --config {}",
        output.display()
    );
    println!("  4. Dry run: admigrate check");

    Ok(())
}

fn cmd_validate(config_path: &PathBuf) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    // Env resolution is a warning here, not an error: validate is usable
    // before the token is exported.
    let token_resolved = config.resolve_env_vars().is_ok();
    println!("  [OK] Environment variable references processed");

    config.validate().context("configuration validation failed")?;
    println!("  [OK] All required fields are valid");

    println!();
    println!("Configuration summary:");
    println!("  Server      : {}", config.api.server);
    println!("  Token env   : {}", config.api.token_env);
    println!(
        "  Token       : {}",
        if token_resolved { "set" } else { "NOT SET" }
    );
    println!(
        "  CA cert file: {}",
        config.api.ca_cert_file.as_deref().unwrap_or("-")
    );
    println!("  Insecure    : {}", config.api.insecure);
    println!();
    println!("Configuration is valid.");

    Ok(())
}
