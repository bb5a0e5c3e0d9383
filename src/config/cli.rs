use crate::domain::model::{SearchContext, SelectionItem};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "catalog-compare")]
#[command(about = "Search a product catalog and keep a comparison set")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = "catalog-compare.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Filter a local record list, then confirm against the remote search
    Search(SearchArgs),
    /// Manage the comparison set
    #[command(subcommand)]
    Compare(CompareCommand),
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    pub query: String,

    /// JSON file holding the records already on screen
    #[arg(long)]
    pub records: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub subcategory: Option<String>,

    #[arg(long)]
    pub min_price: Option<f64>,

    #[arg(long)]
    pub max_price: Option<f64>,

    #[arg(long)]
    pub status: Option<String>,
}

impl SearchArgs {
    pub fn context(&self) -> SearchContext {
        SearchContext {
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            status: self.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum CompareCommand {
    /// Show the current comparison set
    List,
    /// Add an item
    Add(AddArgs),
    /// Remove an item by id
    Remove { id: String },
    /// Empty the comparison set
    Clear,
    /// Print the set every time another process changes it
    Watch,
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    pub id: String,

    #[arg(long, default_value = "")]
    pub title: String,

    #[arg(long, default_value = "")]
    pub slug: String,

    #[arg(long)]
    pub thumbnail: Option<String>,

    #[arg(long)]
    pub price: Option<String>,
}

impl AddArgs {
    pub fn to_item(&self) -> SelectionItem {
        SelectionItem {
            slug: self.slug.clone(),
            thumbnail: self.thumbnail.clone(),
            price: self.price.clone(),
            added_at: Some(chrono::Utc::now()),
            ..SelectionItem::new(self.id.clone(), self.title.clone())
        }
    }
}
