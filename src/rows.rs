use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::RowsArgs;
use crate::config::Config;
use crate::formats::RowRecord;
use crate::seatable;

pub async fn run(args: RowsArgs) -> anyhow::Result<()> {
    let config = Config::from_env(&args.server)?;
    let client = seatable::Client::new(&config)?;

    let base = client
        .base_access()
        .await
        .context("obtain base access token")?;
    tracing::debug!(base = %base.dtable_uuid, "connected to base");

    let metadata = client.metadata(&base).await.context("load base metadata")?;
    let table = seatable::find_table(&metadata, args.table.as_deref())?;
    let image_column = seatable::find_image_column(table)?;
    tracing::info!(
        table = %table.name,
        image_column = %image_column.name,
        "resolved image column"
    );

    let rows = client
        .rows(&base, &table.name, args.view.as_deref())
        .await
        .context("fetch rows")?;
    tracing::info!(
        rows = rows.len(),
        view = args.view.as_deref().unwrap_or("(default)"),
        "fetched rows"
    );

    let out_path = PathBuf::from(&args.out);
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create rows output dir: {}", parent.display()))?;
    }

    // Rows are fetched fresh every run; the snapshot is replaced wholesale.
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&out_path)
        .with_context(|| format!("create rows snapshot: {}", out_path.display()))?;
    let mut out = BufWriter::new(file);

    let retrieved_at = chrono::Utc::now().to_rfc3339();
    for (idx, mut row) in rows.into_iter().enumerate() {
        let row_id = match row.get("_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_owned(),
            None => format!("row{:04}", idx + 1),
        };
        let image_urls = image_urls_from_cell(row.remove(image_column.name.as_str()));

        let record = RowRecord {
            row_id,
            image_urls,
            fields: row,
            retrieved_at: retrieved_at.clone(),
        };
        serde_json::to_writer(&mut out, &record).context("write row record json")?;
        out.write_all(b"\n").context("write row record newline")?;
    }

    out.flush().context("flush rows snapshot")?;
    Ok(())
}

/// An image cell is usually a list of URL strings; older bases store a bare
/// string, and file-style cells store attachment objects with a `url` field.
fn image_urls_from_cell(cell: Option<serde_json::Value>) -> Vec<String> {
    let urls = match cell {
        None => Vec::new(),
        Some(serde_json::Value::String(url)) => vec![url],
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(url) => Some(url),
                serde_json::Value::Object(mut attachment) => {
                    match attachment.remove("url") {
                        Some(serde_json::Value::String(url)) => Some(url),
                        _ => None,
                    }
                }
                _ => None,
            })
            .collect(),
        Some(_) => Vec::new(),
    };

    urls.into_iter()
        .filter(|url| !url.trim().is_empty())
        .collect()
}
