use clap::{Parser, Subcommand};
use sitepix::imaging::{EngineRegistry, RustBackend};
use sitepix::site::Site;
use sitepix::{build, config, output, thumbnails};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitepix")]
#[command(about = "Image sizing and thumbnails for static site builds")]
#[command(long_about = "\
Image sizing and thumbnails for static site builds

Adds missing width/height attributes to <img> tags in HTML pages and
generates thumbnails declared in meta.toml files of the content tree.

Site structure:

  site/
  ├── config.toml                  # Site config (optional)
  └── content/
      ├── meta.toml                # [[thumbnails]] specs (cascade to children)
      ├── index.html               # <img> tags get width/height
      └── gallery/
          ├── meta.toml            # Replaces inherited thumbnail specs
          └── dawn.jpg             # → deploy/gallery/thumb_dawn.jpg

Thumbnails are staged in content/.thumbnails/ and only regenerated when the
source image is newer.

Run 'sitepix gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site root (directory holding config.toml)
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Output directory (default: deploy_root from config.toml)
    #[arg(long, global = true)]
    deploy: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate thumbnails, then deploy every resource with sized images
    Build,
    /// Generate stale thumbnails only
    Thumbnails,
    /// Validate config and thumbnail specs without building
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build => {
            let mut site = Site::load(&cli.source)?;
            init_thread_pool(&site.config.processing);
            let deploy_root = resolve_deploy_root(&site, cli.deploy.as_deref());

            println!("==> Building {}", site.root.display());
            let report = build::build(
                &mut site,
                &EngineRegistry::standard(),
                &RustBackend::new(),
                &deploy_root,
            )?;
            output::print_build_report(&report);
            println!("==> Build complete: {}", deploy_root.display());
        }
        Command::Thumbnails => {
            let mut site = Site::load(&cli.source)?;
            init_thread_pool(&site.config.processing);
            let report = thumbnails::generate_thumbnails(&mut site, &EngineRegistry::standard())?;
            output::print_thumbnail_report(&report);
        }
        Command::Check => {
            let site = Site::load(&cli.source)?;
            println!("==> Checking {}", site.root.display());
            output::print_site_output(&site);
            let report = thumbnails::check_specs(&site, &EngineRegistry::standard());
            output::print_check_report(&report);
            if !report.problems.is_empty() {
                return Err(format!("{} invalid thumbnail specs", report.problems.len()).into());
            }
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "sitepix=debug" } else { "sitepix=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn resolve_deploy_root(site: &Site, cli_deploy: Option<&Path>) -> PathBuf {
    match cli_deploy {
        Some(path) => path.to_path_buf(),
        None => site.deploy_root(),
    }
}
