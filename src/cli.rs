use clap::{Args, Parser, Subcommand};

use crate::seatable::DEFAULT_SERVER_URL;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Build(BuildArgs),
    Rows(RowsArgs),
    Images(ImagesArgs),
    Render(RenderArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// SeaTable server base URL.
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Table to read (default: the first table of the base).
    #[arg(long)]
    pub table: Option<String>,

    /// View to read (default: the table's default view).
    #[arg(long)]
    pub view: Option<String>,

    /// Output directory for the catalog (catalog.html, images/, snapshots).
    #[arg(long)]
    pub out: String,

    /// Page title for the rendered catalog.
    #[arg(long, default_value = "Artwork Catalog")]
    pub title: String,
}

#[derive(Debug, Args)]
pub struct RowsArgs {
    /// SeaTable server base URL.
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Table to read (default: the first table of the base).
    #[arg(long)]
    pub table: Option<String>,

    /// View to read (default: the table's default view).
    #[arg(long)]
    pub view: Option<String>,

    /// Output file path for `rows.jsonl`.
    #[arg(long)]
    pub out: String,
}

#[derive(Debug, Args)]
pub struct ImagesArgs {
    /// SeaTable server base URL.
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Input path to `rows.jsonl` (created by `rows`).
    #[arg(long)]
    pub rows: String,

    /// Directory for the content-addressed image files.
    #[arg(long)]
    pub images_dir: String,

    /// Output file path for `assets.jsonl`.
    #[arg(long)]
    pub out: String,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Input path to `rows.jsonl` (created by `rows`).
    #[arg(long)]
    pub rows: String,

    /// Input path to `assets.jsonl` (created by `images`).
    #[arg(long)]
    pub assets: String,

    /// Output file path for the HTML catalog.
    #[arg(long)]
    pub out: String,

    /// Relative path from the HTML file to the image directory.
    #[arg(long, default_value = "images")]
    pub image_base: String,

    /// Page title for the rendered catalog.
    #[arg(long, default_value = "Artwork Catalog")]
    pub title: String,
}
