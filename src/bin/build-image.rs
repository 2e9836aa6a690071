use std::process::ExitCode;

use kanux_image::{
    preflight, BuildConfig, BuildError, BuildResult, Orchestrator, QemuImg, RunMode, Xsysroot,
};
use tracing::info;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(result) => {
            println!("{}", result.summary());
            ExitCode::SUCCESS
        }
        Err(err) => {
            if err.is_warning() {
                eprintln!("WARNING: {err}");
            } else {
                eprintln!("error: {err}");
            }
            ExitCode::from(err.exit_code())
        }
    }
}

fn run() -> Result<BuildResult, BuildError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = RunMode::from_args(&args)?;
    info!("Running in {mode} mode");

    let config = BuildConfig::builtin().map_err(BuildError::environment)?;
    preflight::check_host_tools().map_err(BuildError::environment)?;
    let sysroot = Xsysroot::resolve(&config.profile).map_err(BuildError::environment)?;

    Orchestrator::new(config, sysroot, QemuImg::default()).run(mode)
}
