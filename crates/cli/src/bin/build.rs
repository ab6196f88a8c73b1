// SPDX-License-Identifier: MIT

use clap::Parser;
use std::path::PathBuf;
use strata_cli::{config, run, ExitError};
use strata_core::{BuildPlan, LaunchManifest};
use strata_engine::BuildArgs;

/// `build <layers-dir> <platform-dir> <plan-path>` (spec.md §6).
#[derive(Parser)]
#[command(name = "build")]
struct Args {
    layers_dir: PathBuf,
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

    let plan_text = tokio::fs::read_to_string(&args.plan_path).await?;
    let plan: BuildPlan = toml::from_str(&plan_text)?;

    tokio::fs::create_dir_all(&args.layers_dir).await?;

    let new_plan = strata_engine::run_build(BuildArgs {
        packfile,
        layers_dir: args.layers_dir.clone(),
        app_dir,
        platform_dir: args.platform_dir,
        plan,
        pf_config_path: std::env::var(config::PF_CONFIG_PATH_VAR).ok().map(PathBuf::from),
    })
    .await?;

    tokio::fs::write(&args.plan_path, toml::to_string_pretty(&new_plan)?).await?;
    tokio::fs::write(
        args.layers_dir.join("launch.toml"),
        toml::to_string_pretty(&LaunchManifest::default())?,
    )
    .await?;
    Ok(())
}
