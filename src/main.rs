use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dashboard_state::config::{Config, get_config_path, get_storage_path};
use dashboard_state::consts::dash_consts::network::GIST_API_URL;
use dashboard_state::dashboard::{
    ControllerCommand, DashboardController, DashboardDocument, DashboardSources, Navigation,
};
use dashboard_state::events::EventBus;
use dashboard_state::index::{ElasticCatalog, IndexExpander, Interval};
use dashboard_state::logging;
use dashboard_state::network::JsonClient;
use dashboard_state::store::{
    DashboardFiles, DirectoryFiles, DocKind, ElasticStore, FileStorage, GistClient, HttpFiles,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Command-line arguments
struct Args {
    /// Path to the configuration file (defaults to ~/.dashboard-state/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a dashboard and print its state
    Load {
        /// Source type: elasticsearch, temp or file
        #[arg(long = "type", value_name = "TYPE", requires = "id")]
        kind: Option<String>,

        /// Dashboard id or file name
        #[arg(long, requires = "kind")]
        id: Option<String>,

        /// Keep running and recompute partitions every N seconds
        #[arg(long, value_name = "SECONDS")]
        refresh_every: Option<u64>,
    },
    /// List existing partitions for a time window
    Indices {
        /// Window start, RFC 3339
        #[arg(long)]
        from: String,

        /// Window end, RFC 3339
        #[arg(long)]
        to: String,

        /// Partition pattern, e.g. "[logstash-]YYYY.MM.DD"
        #[arg(long)]
        pattern: String,

        /// hour, day, week, month or year
        #[arg(long)]
        interval: Interval,
    },
    /// Save the current dashboard to the store
    Save {
        /// Title to save under (defaults to the dashboard's own)
        #[arg(long)]
        title: Option<String>,

        /// Save as an anonymous temporary document
        #[arg(long)]
        temp: bool,

        /// Expiry of a temporary document, e.g. "30d"
        #[arg(long, requires = "temp")]
        ttl: Option<String>,
    },
    /// List saved dashboards
    List {
        /// Query-string filter
        #[arg(long, default_value = "*")]
        query: String,

        /// Maximum number of results
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
    /// Delete a saved dashboard
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Write the current dashboard to a JSON file
    Export {
        #[arg(long, value_name = "DIR")]
        dir: PathBuf,
    },
    /// Store a dashboard file as the local default
    SetDefault {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Clear the local default dashboard
    PurgeDefault,
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>, Box<dyn Error>> {
    let instant = DateTime::parse_from_rfc3339(text)
        .map_err(|e| format!("Invalid timestamp '{}': {}", text, e))?;
    Ok(instant.with_timezone(&Utc))
}

fn client(config: &Config, base_url: &str) -> Result<JsonClient, Box<dyn Error>> {
    Ok(JsonClient::new(
        base_url,
        config.request_timeout(),
        config.max_retries,
    )?)
}

fn expander(config: &Config) -> Result<IndexExpander, Box<dyn Error>> {
    let catalog = ElasticCatalog::new(client(config, &config.elasticsearch)?);
    Ok(IndexExpander::new(Arc::new(catalog)))
}

fn sources(config: &Config) -> Result<DashboardSources, Box<dyn Error>> {
    let files: Arc<dyn DashboardFiles> = match (&config.dashboards_dir, &config.dashboards_url) {
        (Some(dir), _) => Arc::new(DirectoryFiles::new(dir)),
        (None, Some(url)) => Arc::new(HttpFiles::new(client(config, url)?)),
        (None, None) => Arc::new(DirectoryFiles::new("dashboards")),
    };
    Ok(DashboardSources {
        store: Arc::new(ElasticStore::new(
            client(config, &config.elasticsearch)?,
            config.kibana_index.clone(),
        )),
        files,
        local: Arc::new(FileStorage::new(get_storage_path()?)),
        gist: Arc::new(GistClient::new(client(config, GIST_API_URL)?)),
    })
}

fn build_controller(
    config: &Config,
) -> Result<(DashboardController, mpsc::Receiver<ControllerCommand>), Box<dyn Error>> {
    Ok(DashboardController::new(
        EventBus::new(),
        expander(config)?,
        sources(config)?,
    ))
}

fn print_state(controller: &DashboardController) {
    let Some(document) = controller.current() else {
        println!("No dashboard loaded.");
        return;
    };
    println!("Title:      {}", document.title);
    println!("Interval:   {}", document.index.interval);
    println!("Queries:    {}", document.services.query.len());
    println!("Filters:    {}", document.services.filter.len());
    println!("Partitions: {}", controller.indices().join(", "));
    log::debug!(
        "filter predicate: {}",
        document.services.filter.combined_predicate().to_json()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_path()?,
    };
    let config = Config::load_or_default(&config_path)
        .map_err(|e| format!("Failed to load config {}: {}", config_path.display(), e))?;

    match args.command {
        Command::Load {
            kind,
            id,
            refresh_every,
        } => {
            let (mut controller, mut commands) = build_controller(&config)?;
            controller.navigate(&Navigation { kind, id }).await?;
            print_state(&controller);

            if let Some(seconds) = refresh_every {
                let period = Duration::from_secs(seconds.max(1));
                let mut pending = controller.schedule_refresh(period);
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            controller.cancel_timer(pending);
                            break;
                        }
                        command = commands.recv() => {
                            let Some(command) = command else { break };
                            if controller.handle(command).await? {
                                println!("Partitions: {}", controller.indices().join(", "));
                            }
                            pending = controller.schedule_refresh(period);
                        }
                    }
                }
            }
            Ok(())
        }
        Command::Indices {
            from,
            to,
            pattern,
            interval,
        } => {
            let from = parse_instant(&from)?;
            let to = parse_instant(&to)?;
            let partitions = expander(&config)?
                .resolve(from, to, &pattern, interval)
                .await?;
            for partition in partitions {
                println!("{}", partition);
            }
            Ok(())
        }
        Command::Save { title, temp, ttl } => {
            let (mut controller, _commands) = build_controller(&config)?;
            controller.navigate(&Navigation::home()).await?;
            let kind = if temp { DocKind::Temp } else { DocKind::Dashboard };
            let receipt = controller
                .save_to_store(kind, title.as_deref(), ttl)
                .await?;
            println!("Saved {} with id {}", receipt.kind, receipt.id);
            Ok(())
        }
        Command::List { query, count } => {
            let (controller, _commands) = build_controller(&config)?;
            let dashboards = controller.list_from_store(&query, count).await?;
            if dashboards.is_empty() {
                println!("No dashboards found.");
            }
            for dashboard in dashboards {
                println!("{}\t{}", dashboard.id, dashboard.title);
            }
            Ok(())
        }
        Command::Delete { id } => {
            let (controller, _commands) = build_controller(&config)?;
            controller.delete_from_store(&id).await?;
            println!("Deleted dashboard {}", id);
            Ok(())
        }
        Command::Export { dir } => {
            let (mut controller, _commands) = build_controller(&config)?;
            controller.navigate(&Navigation::home()).await?;
            let path = controller.export_to_file(&dir)?;
            println!("Exported to {}", path.display());
            Ok(())
        }
        Command::SetDefault { file } => {
            let contents = std::fs::read(&file)
                .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
            let document =
                DashboardDocument::from_value_with_defaults(serde_json::from_slice(&contents)?)?;
            let (controller, _commands) = build_controller(&config)?;
            if controller.set_default(Some(&document))? {
                println!("Default dashboard set to '{}'.", document.title);
                Ok(())
            } else {
                Err(Box::from("Local storage is unavailable."))
            }
        }
        Command::PurgeDefault => {
            let (controller, _commands) = build_controller(&config)?;
            if controller.purge_default()? {
                println!("Default dashboard cleared.");
                Ok(())
            } else {
                Err(Box::from("Local storage is unavailable."))
            }
        }
    }
}
