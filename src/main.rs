use catalog_compare::adapters::http::extract_records;
use catalog_compare::config::cli::{CompareCommand, Command, SearchArgs};
use catalog_compare::core::search_controller::decode_records;
use catalog_compare::utils::error::ErrorSeverity;
use catalog_compare::utils::{logger, validation::Validate};
use catalog_compare::{
    AddOutcome, CatalogBrowser, CatalogError, CatalogRecord, CliConfig, FileStorage,
    FileWatchFeed, HttpSearchBackend, SearchController, SelectionItem, SelectionStore,
    TomlConfig,
};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("CLI config: {:?}", cli);

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let outcome = match cli.command {
        Command::Search(args) => run_search(&args, &config).await,
        Command::Compare(cmd) => run_compare(cmd, &config).await,
    };

    if let Err(e) = outcome {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // Exit code follows severity; low-severity errors still exit 0.
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

/// A missing default config file just means "use defaults".
fn load_config(path: &str) -> catalog_compare::Result<TomlConfig> {
    if Path::new(path).exists() {
        tracing::info!("📁 Loading configuration from: {}", path);
        TomlConfig::from_file(path)
    } else if path == "catalog-compare.toml" {
        tracing::debug!("No configuration file, using defaults");
        Ok(TomlConfig::default())
    } else {
        Err(CatalogError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path),
        )))
    }
}

fn load_records(path: &str) -> catalog_compare::Result<Vec<CatalogRecord>> {
    let content = std::fs::read_to_string(path)?;
    let body: serde_json::Value = serde_json::from_str(&content)?;
    Ok(decode_records(extract_records(body), usize::MAX))
}

async fn run_search(args: &SearchArgs, config: &TomlConfig) -> catalog_compare::Result<()> {
    let records = match &args.records {
        Some(path) => load_records(path)?,
        None => Vec::new(),
    };

    let mut backend = HttpSearchBackend::new(config.endpoint()?);
    if let Some(headers) = &config.search.headers {
        backend = backend.with_headers(headers.clone());
    }
    if let Some(timeout) = config.request_timeout() {
        backend = backend.with_timeout(timeout);
    }

    let controller = SearchController::new(Arc::new(backend), config.search_settings());
    let mut browser = CatalogBrowser::new(records, controller).with_context(args.context());
    browser.set_query(&args.query);

    let local: Vec<CatalogRecord> = browser.local_results().into_iter().cloned().collect();
    println!("🔎 Local matches ({}):", local.len());
    print_records(&local);

    browser.search().settled().await;

    let shown = browser.display();
    println!("📋 Results ({}):", shown.len());
    print_records(&shown);
    Ok(())
}

async fn run_compare(cmd: CompareCommand, config: &TomlConfig) -> catalog_compare::Result<()> {
    let storage = FileStorage::new(&config.selection.storage_dir);
    let store = SelectionStore::new(config.selection_config(), Arc::new(storage.clone()));

    match cmd {
        CompareCommand::List => print_selection(&store.items(), store.config().max_items),
        CompareCommand::Add(args) => match store.add(args.to_item())? {
            AddOutcome::Added => println!("✅ Added {} to the comparison set", args.id),
            AddOutcome::AlreadyPresent => println!("ℹ️  {} is already in the comparison set", args.id),
            AddOutcome::InvalidIdentity => println!("ℹ️  Nothing to add: the item has no id"),
        },
        CompareCommand::Remove { id } => {
            if store.remove(&id) {
                println!("🗑️  Removed {}", id);
            } else {
                println!("ℹ️  {} is not in the comparison set", id);
            }
        }
        CompareCommand::Clear => {
            store.clear();
            println!("🧹 Comparison set cleared");
        }
        CompareCommand::Watch => {
            if !config.selection.watch_storage {
                return Err(CatalogError::Config {
                    message: "selection.watch_storage is disabled".to_string(),
                });
            }
            let feed = Arc::new(FileWatchFeed::new(&storage, &config.selection.storage_key)?);
            let store = store.with_feed(feed);
            let max_items = store.config().max_items;

            let mut view = store.watch();
            print_selection(&view.borrow_and_update(), max_items);
            loop {
                let changed = tokio::select! {
                    changed = view.changed() => changed.is_ok(),
                    _ = tokio::signal::ctrl_c() => false,
                };
                if !changed {
                    break;
                }
                print_selection(&view.borrow_and_update(), max_items);
            }
        }
    }
    Ok(())
}

fn print_records(records: &[CatalogRecord]) {
    for record in records {
        let price = record
            .price
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>8}  {}  ({})",
            record.identity().unwrap_or_default(),
            record.title,
            price
        );
    }
}

fn print_selection(items: &[SelectionItem], max_items: usize) {
    println!("🧺 Comparing {}/{}", items.len(), max_items);
    for item in items {
        println!(
            "  {:>8}  {}  ({})",
            item.id,
            item.title,
            item.price.as_deref().unwrap_or("-")
        );
    }
}
