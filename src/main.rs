use clap::{Parser, Subcommand};
use site_mounter::api::{HttpClient, normalize_host};
use site_mounter::config::{self, MounterConfig};
use site_mounter::{output, reader, writer};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "site-mounter")]
#[command(about = "Mount a CMS site between a local directory and a remote engine")]
#[command(long_about = "\
Mount a CMS site between a local directory and a remote engine

The local layout mirrors what the engine stores:

  my-site/
  ├── mounter.toml                     # Mounter config (optional)
  ├── config/
  │   ├── site.yml                     # Site name, locales, SEO
  │   └── translations.yml             # key → {locale: text}
  ├── app/
  │   ├── content_types/events.yml     # Content type definitions
  │   └── views/
  │       ├── pages/index.liquid       # Page (front matter + template)
  │       ├── pages/index.fr.liquid    # Its French translation
  │       ├── pages/about-us/team.liquid
  │       └── snippets/footer.liquid
  ├── data/events.yml                  # Entries of the events type
  └── public/
      ├── stylesheets/application.css  # Theme assets
      └── samples/photo.jpg            # Content assets

Credentials come from mounter.toml ([api] email, api_key) or the
MOUNTER_API_KEY environment variable.

Run 'site-mounter gen-config' to generate a documented mounter.toml.")]
#[command(version = env!("MOUNTER_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a local site and report what it holds
    Check {
        /// Site directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Fetch the remote site into a local directory
    Pull {
        /// Destination directory (its mounter.toml supplies the API settings)
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Engine URL, overriding the config
        #[arg(long)]
        host: Option<String>,
    },
    /// Send a local site to the remote engine
    Push {
        /// Site directory
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Engine URL, overriding the config
        #[arg(long)]
        host: Option<String>,
        /// Re-upload assets even when the remote checksum matches
        #[arg(long)]
        force: bool,
    },
    /// Print a stock mounter.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check { path } => {
            let config = load(&path)?;
            println!("==> Checking {}", path.display());
            let mp = reader::file_system::read(&path, config.tree.orphans)?;
            output::print_mount_summary(&mp);
            println!("==> Site is valid");
        }
        Command::Pull { path, host } => {
            let mut config = load(&path)?;
            if let Some(host) = host {
                config.api.host = host;
            }
            let (email, api_key) = config.api.credentials()?;
            println!("==> Pulling {}", config.api.host);
            let client = HttpClient::connect(&config.api, email, api_key)?;
            let mp = reader::api::read(&client, &normalize_host(&config.api.host), config.tree.orphans)?;
            output::print_mount_summary(&mp);
            let written = writer::file_system::write(&mp, &path)?;
            output::print_written(&written, &path);
        }
        Command::Push { path, host, force } => {
            let mut config = load(&path)?;
            if let Some(host) = host {
                config.api.host = host;
            }
            config.push.force |= force;
            println!("==> Reading {}", path.display());
            let mp = reader::file_system::read(&path, config.tree.orphans)?;
            output::print_mount_summary(&mp);

            let (email, api_key) = config.api.credentials()?;
            println!("==> Pushing to {}", config.api.host);
            let client = HttpClient::connect(&config.api, email, api_key)?;
            let report = writer::api::push(&client, &mp, &config.push)?;
            output::print_push_report(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the site's config and start logging at its level. `RUST_LOG`
/// overrides the configured level.
fn load(path: &Path) -> Result<MounterConfig, config::ConfigError> {
    let config = config::load_config(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(root = %path.display(), "config loaded");
    Ok(config)
}
