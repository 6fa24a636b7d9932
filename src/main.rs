use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;

use featureboard_lib::{run_demo, DemoOptions, FeatureAction, PlatformFamily};

#[derive(Parser, Debug)]
#[command(name = "featureboard")]
#[command(about = "Runs the device features screen against a simulated handset")]
struct Args {
    /// Settings file (JSON). Defaults to $FEATUREBOARD_SETTINGS.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Platform family: ios, android or web.
    #[arg(short, long)]
    platform: Option<PlatformFamily>,

    /// Seconds to let the simulated sensors stream before the snapshot.
    #[arg(long, default_value = "2")]
    run_secs: u64,

    /// Actions to perform: capture, share, locate, open-maps, notify, authenticate.
    actions: Vec<FeatureAction>,
}

#[tokio::main]
async fn main() -> Result<()> {
    featureboard_lib::init_logging();
    let args = Args::parse();

    let snapshot = run_demo(DemoOptions {
        settings_path: args.settings,
        platform: args.platform,
        run_for: Duration::from_secs(args.run_secs),
        actions: args.actions,
    })
    .await?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
