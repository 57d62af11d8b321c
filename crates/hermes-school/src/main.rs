//! Hermes School - entry point.

use std::path::PathBuf;

use hermes_config::{ConfigLoader, HermesConfig};
use hermes_school::App;
use hermes_telemetry::init_telemetry;

/// Read when neither `--config` nor `HERMES_CONFIG` names a file.
const DEFAULT_CONFIG: &str = "hermes.toml";
const CONFIG_ENV: &str = "HERMES_CONFIG";

const USAGE: &str = r"Hermes School - school management API

USAGE:
    hermes-school [--config <PATH>]
    hermes-school --help | --version

The configuration file is TOML or JSON. It is taken from --config, then
HERMES_CONFIG, then ./hermes.toml when that file exists. Environment
variables prefixed with HERMES__ override file values, and a .env file in
the working directory is read first.

ENVIRONMENT VARIABLES:
    HERMES__SERVER__HTTP_ADDR                  Listen address (default: 0.0.0.0:5111)
    HERMES__AUTH__LONG_TOKEN_SECRET            Long token secret (required)
    HERMES__AUTH__SHORT_TOKEN_SECRET           Short token secret (required)
    HERMES__BOOTSTRAP__SUPERADMIN_USERNAME     Superadmin seeded at startup
    HERMES__BOOTSTRAP__SUPERADMIN_EMAIL
    HERMES__BOOTSTRAP__SUPERADMIN_PASSWORD
    HERMES__TELEMETRY__LOGGING__LEVEL          Log level (default: info)
    RUST_LOG                                   Overrides the log filter
";

/// What the process was asked to do.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve { config: Option<PathBuf> },
    Help,
    Version,
}

impl Command {
    /// Reads the command from process arguments, without the program name.
    fn from_args<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Self::Help),
                "--version" | "-V" => return Ok(Self::Version),
                "--config" | "-c" => match args.next() {
                    Some(path) => config = Some(PathBuf::from(path)),
                    None => return Err(format!("{arg} expects a path")),
                },
                other => match other.strip_prefix("--config=") {
                    Some(path) => config = Some(PathBuf::from(path)),
                    None => return Err(format!("unexpected argument '{other}'")),
                },
            }
        }

        Ok(Self::Serve { config })
    }
}

/// Builds the configuration. An explicit file must exist; the default may be absent.
fn load_config(explicit: Option<PathBuf>) -> Result<HermesConfig, hermes_config::ConfigError> {
    let loader = ConfigLoader::new().with_dotenv();
    let named = explicit.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let loader = match named {
        Some(path) => loader.with_file(path)?,
        None => loader.with_optional_file(DEFAULT_CONFIG)?,
    };
    loader.with_env_prefix("HERMES").load()
}

async fn run(config: HermesConfig) -> anyhow::Result<()> {
    init_telemetry(&config.telemetry.to_telemetry_config(&config.server.service_name))?;
    tracing::info!(
        version = hermes_school::VERSION,
        addr = %config.server.http_addr,
        "starting hermes-school"
    );

    let app = App::build(config).await?;
    app.run().await?;
    tracing::info!("hermes-school stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let explicit = match Command::from_args(std::env::args().skip(1)) {
        Ok(Command::Serve { config }) => config,
        Ok(Command::Help) => {
            print!("{USAGE}");
            return;
        }
        Ok(Command::Version) => {
            println!("hermes-school {}", hermes_school::VERSION);
            return;
        }
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = match load_config(explicit) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "hermes-school failed");
        eprintln!("hermes-school failed: {e:#}");
        std::process::exit(1);
    }
}
