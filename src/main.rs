use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookmark_sorter::app::App;
use bookmark_sorter::bookmarks::exclusion::ExclusionRegistry;
use bookmark_sorter::coalescer::AutoSorter;
use bookmark_sorter::config::{AppConfig, StoreSection};
use bookmark_sorter::error::Result;
use bookmark_sorter::event::ChangeListener;
use bookmark_sorter::store::file::JsonFileStore;
use bookmark_sorter::store::watcher::FileWatcher;

/// Keeps a JSON bookmark file sorted.
#[derive(Parser, Debug)]
#[command(name = "bsort", version, about)]
struct Cli {
    /// Config file (merged over the usual config locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bookmark file to sort
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Exclusion registry file
    #[arg(long, global = true)]
    exclusions: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single sort pass
    Sort,
    /// Keep sorting whenever the bookmark file changes, until Ctrl-C
    Watch,
    /// Stop sorting a folder
    Exclude {
        folder_id: String,
        /// Also skip everything beneath the folder
        #[arg(long)]
        recursive: bool,
    },
    /// Sort a folder again
    Include {
        folder_id: String,
        /// Leave the recursive flag set
        #[arg(long)]
        keep_recursive: bool,
    },
    /// List excluded folders
    Exclusions,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "bookmark_sorter=debug,bsort=debug"
    } else {
        "bookmark_sorter=info,bsort=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_app(config: &AppConfig, store: Arc<JsonFileStore>) -> Result<App<JsonFileStore, JsonFileStore>> {
    let exclusions = config.exclusions_path();
    let registry = ExclusionRegistry::load(&exclusions)?;
    Ok(App::new(
        store.clone(),
        store,
        registry,
        config.sort_config()?,
        config.root_ids(),
    )
    .with_registry_path(exclusions))
}

async fn sort_once(config: &AppConfig) -> Result<()> {
    let store = Arc::new(JsonFileStore::open(&config.bookmarks_path())?);
    let mut app = build_app(config, store)?;
    let report = app.sort_all().await?;
    println!(
        "{} folders visited, {} reordered, {} skipped; {} moves applied, {} failed; {} stale exclusions removed",
        report.folders_visited,
        report.folders_sorted,
        report.folders_skipped,
        report.moves_applied,
        report.moves_failed,
        report.registry_pruned,
    );
    if report.rescan_needed {
        println!("the bookmark file changed while sorting and was left as is; run again to sort it");
    }
    Ok(())
}

async fn watch(config: &AppConfig) -> Result<()> {
    let path = config.bookmarks_path();
    let store = Arc::new(JsonFileStore::open(&path)?);
    let app = build_app(config, store)?;

    let (listener, events) = ChangeListener::channel();
    let _watcher = FileWatcher::new(&path, config.watch_debounce(), listener.clone())?;
    if !config.auto_sort_enabled() {
        tracing::warn!("auto-sort is disabled; only the initial pass will run");
    }

    let (sorter, handle) = AutoSorter::new(
        app,
        listener,
        events,
        config.quiet_period(),
        config.settle_delay(),
        config.auto_sort_enabled(),
    );
    let task = tokio::spawn(sorter.run());
    handle.sort_now();
    tracing::info!(file = %path.display(), "watching for changes");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.shutdown();
    if let Err(e) = task.await {
        tracing::error!(error = %e, "auto-sorter task failed");
    }
    Ok(())
}

fn edit_exclusions(config: &AppConfig, edit: impl FnOnce(&mut ExclusionRegistry)) -> Result<()> {
    let path = config.exclusions_path();
    let mut registry = ExclusionRegistry::load(&path)?;
    edit(&mut registry);
    registry.save(&path)
}

fn list_exclusions(config: &AppConfig) -> Result<()> {
    let registry = ExclusionRegistry::load(&config.exclusions_path())?;
    if registry.is_empty() {
        println!("no folders excluded");
    }
    for (id, entry) in registry.iter() {
        let scope = match (entry.skip, entry.skip_recursive) {
            (true, true) => "folder and subfolders",
            (true, false) => "folder only",
            (false, _) => "recursive flag only (inactive)",
        };
        println!("{}\t{}", id, scope);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = AppConfig {
        store: StoreSection {
            bookmarks: cli.file.clone(),
            exclusions: cli.exclusions.clone(),
            ..Default::default()
        },
        ..Default::default()
    };
    let config = AppConfig::load(cli.config.as_deref(), Some(&overrides));

    match cli.command {
        Commands::Sort => sort_once(&config).await,
        Commands::Watch => watch(&config).await,
        Commands::Exclude {
            folder_id,
            recursive,
        } => edit_exclusions(&config, |registry| {
            registry.set_excluded(&folder_id);
            if recursive {
                registry.set_recursive(&folder_id);
            }
        }),
        Commands::Include {
            folder_id,
            keep_recursive,
        } => edit_exclusions(&config, |registry| {
            registry.clear_excluded(&folder_id);
            if !keep_recursive {
                registry.clear_recursive(&folder_id);
            }
        }),
        Commands::Exclusions => list_exclusions(&config),
    }
}
