use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    catalogify::logging::init().context("init logging")?;

    let cli = catalogify::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        catalogify::cli::Command::Build(args) => {
            catalogify::build::run(args).await.context("build")?;
        }
        catalogify::cli::Command::Rows(args) => {
            catalogify::rows::run(args).await.context("rows")?;
        }
        catalogify::cli::Command::Images(args) => {
            catalogify::images::run(args).await.context("images")?;
        }
        catalogify::cli::Command::Render(args) => {
            catalogify::render::run(args).context("render")?;
        }
    }

    Ok(())
}
