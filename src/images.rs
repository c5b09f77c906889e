use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

use crate::cli::ImagesArgs;
use crate::config::Config;
use crate::formats::{self, AssetRecord};
use crate::image_store::ImageStore;
use crate::seatable;

pub async fn run(args: ImagesArgs) -> anyhow::Result<()> {
    let config = Config::from_env(&args.server)?;
    let client = seatable::Client::new(&config)?;

    let rows = formats::read_row_records(Path::new(&args.rows))?;
    let store = ImageStore::open(Path::new(&args.images_dir))?;

    let out_path = PathBuf::from(&args.out);
    let prior = read_prior_assets(&out_path, &store);

    let mut records: Vec<AssetRecord> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut downloaded = 0_usize;
    let mut reused = 0_usize;
    let mut failed = 0_usize;

    for row in &rows {
        for url_str in &row.image_urls {
            if !seen.insert(url_str.as_str()) {
                continue;
            }

            if let Some(record) = prior.get(url_str.as_str()) {
                tracing::debug!(
                    url = %url_str,
                    file = %record.file_name,
                    "image known from previous run; skipping download"
                );
                records.push(record.clone());
                reused += 1;
                continue;
            }

            let parsed = match Url::parse(url_str) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(row = %row.row_id, url = %url_str, %err, "skipping unparsable image url");
                    failed += 1;
                    continue;
                }
            };

            // A failed download degrades the row, never the run.
            let (bytes, content_type) = match client.fetch_image(&parsed).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    tracing::warn!(
                        row = %row.row_id,
                        url = %url_str,
                        err = format!("{err:#}"),
                        "image fetch failed; row will render without it"
                    );
                    failed += 1;
                    continue;
                }
            };

            // Filesystem trouble is fatal, unlike a failed download.
            let stored = store
                .store(&parsed, content_type.as_deref(), &bytes)
                .with_context(|| format!("store image: {url_str}"))?;
            if stored.newly_written {
                tracing::info!(url = %url_str, file = %stored.file_name, bytes = stored.byte_len, "stored image");
            }

            records.push(AssetRecord {
                url: url_str.clone(),
                content_hash: stored.content_hash,
                file_name: stored.file_name,
                byte_len: stored.byte_len,
            });
            downloaded += 1;
        }
    }

    write_assets(&out_path, &records)?;
    tracing::info!(downloaded, reused, failed, "image pass complete");
    Ok(())
}

/// A prior assets snapshot doubles as the url → file map for download
/// skipping. Entries count only while the named file still exists; dedup
/// correctness never depends on this map.
fn read_prior_assets(out_path: &Path, store: &ImageStore) -> HashMap<String, AssetRecord> {
    if !out_path.exists() {
        return HashMap::new();
    }

    let records = match formats::read_asset_records(out_path) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(
                path = %out_path.display(),
                err = format!("{err:#}"),
                "ignoring unreadable prior assets snapshot"
            );
            return HashMap::new();
        }
    };

    records
        .into_iter()
        .filter(|record| store.contains(&record.file_name))
        .map(|record| (record.url.clone(), record))
        .collect()
}

fn write_assets(out_path: &Path, records: &[AssetRecord]) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create assets output dir: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(out_path)
        .with_context(|| format!("create assets snapshot: {}", out_path.display()))?;
    let mut out = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut out, record).context("write asset record json")?;
        out.write_all(b"\n").context("write asset record newline")?;
    }

    out.flush().context("flush assets snapshot")?;
    Ok(())
}
