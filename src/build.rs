use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::{BuildArgs, ImagesArgs, RenderArgs, RowsArgs};

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let out_dir = PathBuf::from(&args.out);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create catalog dir: {}", out_dir.display()))?;

    let rows_path = out_dir.join("rows.jsonl");
    let assets_path = out_dir.join("assets.jsonl");
    let images_dir = out_dir.join("images");
    let html_path = out_dir.join("catalog.html");

    tracing::info!(
        server = %args.server,
        table = args.table.as_deref().unwrap_or("(first)"),
        view = args.view.as_deref().unwrap_or("(default)"),
        "build: rows"
    );
    crate::rows::run(RowsArgs {
        server: args.server.clone(),
        table: args.table.clone(),
        view: args.view.clone(),
        out: rows_path.to_string_lossy().to_string(),
    })
    .await
    .context("rows")?;

    tracing::info!("build: images");
    crate::images::run(ImagesArgs {
        server: args.server.clone(),
        rows: rows_path.to_string_lossy().to_string(),
        images_dir: images_dir.to_string_lossy().to_string(),
        out: assets_path.to_string_lossy().to_string(),
    })
    .await
    .context("images")?;

    tracing::info!("build: render");
    crate::render::run(RenderArgs {
        rows: rows_path.to_string_lossy().to_string(),
        assets: assets_path.to_string_lossy().to_string(),
        out: html_path.to_string_lossy().to_string(),
        image_base: "images".to_owned(),
        title: args.title.clone(),
    })
    .context("render")?;

    tracing::info!(catalog = %html_path.display(), "build complete");
    Ok(())
}
