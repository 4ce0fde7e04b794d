use std::path::PathBuf;

use clap::{Parser, Subcommand};

use oamfuture_signup::proxy::fetch_proxy_pool;
use oamfuture_signup::runner::RunController;
use oamfuture_signup::store::{CollisionPolicy, RecordStore};
use oamfuture_signup::{init_logging, log_dir, RunConfig};

#[derive(Parser)]
#[command(
    name = "oamfuture-signup",
    version,
    about = "Batch signup automation with CSV bookkeeping and free-proxy rotation"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a fresh batch of identifiers into the record store
    Generate {
        /// Number of identifiers to generate
        #[arg(long)]
        count: Option<usize>,
        /// Identifier prefix
        #[arg(long)]
        prefix: Option<String>,
        /// What to do when the store file already exists
        #[arg(long, value_enum)]
        on_collision: Option<CollisionPolicy>,
        /// Record store path
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Submit every pending identifier in the record store
    Run {
        /// Rotate the outbound IP through a scraped proxy pool
        #[arg(long)]
        proxy: bool,
        /// Run with a visible browser window
        #[arg(long)]
        headed: bool,
        /// Delay between submissions, in seconds
        #[arg(long)]
        interval: Option<u64>,
        /// Rotate the proxy every N submissions
        #[arg(long)]
        rotate_every: Option<u64>,
        /// Record store path
        #[arg(long)]
        store: Option<PathBuf>,
        /// Explicit Chrome executable path
        #[arg(long)]
        chrome: Option<String>,
    },
    /// Fetch the proxy pool and print its endpoints
    FetchProxies {
        /// Proxy list source URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging();
    if let Some(dir) = log_dir() {
        tracing::info!("Log files saved to: {}", dir.display());
    }

    let mut config = RunConfig::load();

    match cli.command {
        Command::Generate {
            count,
            prefix,
            on_collision,
            store,
        } => {
            if let Some(count) = count {
                config.batch_size = count;
            }
            if let Some(prefix) = prefix {
                config.prefix = prefix;
            }
            if let Some(policy) = on_collision {
                config.collision_policy = policy;
            }
            if let Some(store) = store {
                config.store_path = store;
            }
            config.validate().map_err(anyhow::Error::msg)?;
            config.save();

            let store = RecordStore::create(
                &config.store_path,
                config.batch_size,
                &config.prefix,
                config.collision_policy,
            )?;
            println!(
                "{} records in {}",
                store.load_all()?.len(),
                store.path().display()
            );
        }

        Command::Run {
            proxy,
            headed,
            interval,
            rotate_every,
            store,
            chrome,
        } => {
            config.proxy_mode = proxy;
            config.headless = !headed;
            if let Some(interval) = interval {
                config.interval_secs = interval;
            }
            if let Some(rotate_every) = rotate_every {
                config.rotate_every = rotate_every;
            }
            if let Some(store) = store {
                config.store_path = store;
            }
            if let Some(chrome) = chrome {
                config.chrome_path = Some(chrome);
            }
            config.validate().map_err(anyhow::Error::msg)?;
            config.save();

            let summary = RunController::new(config).run().await?;
            println!(
                "Processed {}: {} succeeded, {} failed ({} automation errors)",
                summary.processed, summary.succeeded, summary.failed, summary.errors
            );
        }

        Command::FetchProxies { url } => {
            if let Some(url) = url {
                config.proxy_source_url = url;
            }
            config.validate().map_err(anyhow::Error::msg)?;

            let pool = fetch_proxy_pool(&config.proxy_source_url).await?;
            for endpoint in pool.endpoints() {
                println!("{}", endpoint);
            }
        }
    }

    Ok(())
}
