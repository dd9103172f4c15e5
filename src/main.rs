use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Duration;

use segdl::cli::{Args, ReportFormat};
use segdl::logging::init_tracing;
use segdl::utils::resolve_output_path;
use segdl::{DownloadConfig, DownloadReport, Downloader};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let output = resolve_output_path(&args.url, args.output.as_deref(), args.download_dir.as_deref())?;
    let config = DownloadConfig::default()
        .with_segments(args.segments)?
        .with_progress(!args.no_progress);
    let downloader = Downloader::new(config).context("Failed to set up downloader")?;

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        match args.timeout {
            Some(secs) => downloader
                .download_within(&args.url, &output, Duration::from_secs(secs))
                .await
                .context("Download abandoned"),
            None => Ok(downloader.download(&args.url, &output).await),
        }
    })?;

    print_report(&report, args.format)?;

    if !report.overall_status.is_success() {
        bail!("Download failed: {:?}", report.overall_status);
    }
    Ok(())
}

fn print_report(report: &DownloadReport, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => println!("{}", report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}
