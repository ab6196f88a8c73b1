// SPDX-License-Identifier: MIT

use clap::Parser;
use std::path::PathBuf;
use strata_cli::{config, run, ExitError};
use strata_engine::DetectArgs;

/// `detect <platform-dir> <plan-path>` (spec.md §6).
#[derive(Parser)]
#[command(name = "detect")]
struct Args {
    platform_dir: PathBuf,
    plan_path: PathBuf,
}

fn main() -> ! {
    run(|| {
        let args = Args::parse();
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ExitError::new(1, e.to_string()))?;
        rt.block_on(async_main(args))
    })
}

async fn async_main(args: Args) -> Result<(), ExitError> {
    let packfile = config::load_packfile().await?;
    let app_dir = std::env::current_dir()?;

    let plan = strata_engine::run_detect(DetectArgs {
        packfile,
        app_dir,
        platform_dir: args.platform_dir,
        pf_config_path: std::env::var(config::PF_CONFIG_PATH_VAR).ok().map(PathBuf::from),
    })
    .await?;

    tokio::fs::write(&args.plan_path, toml::to_string_pretty(&plan)?).await?;
    Ok(())
}
