use anyhow::{anyhow, Context};
use clap::Parser;
use shotbot::{
    build_http_client, install_prometheus_recorder, load_bot, setup_logging, Cli, Orchestrator,
    Pipeline, RunOutcome, EXIT_FAILURE, EXIT_USAGE, USAGE,
};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let Some(bot) = args.bot().map(str::to_string) else {
        println!("{USAGE}");
        std::process::exit(EXIT_USAGE);
    };

    setup_logging(args.verbose).map_err(|e| anyhow!(e))?;
    info!("Starting shotbot v{} for '{}'", env!("CARGO_PKG_VERSION"), bot);

    let metrics = install_prometheus_recorder().map_err(|e| anyhow!(e))?;

    let (config, behavior) = match load_bot(&args.config_dir, &bot)
        .await
        .with_context(|| format!("loading bot '{bot}' from {}", args.config_dir.display()))
    {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let client = build_http_client(config.request_timeout())?;
    let request = config.job_request();
    let run = args.run_config();
    if run.dry_run {
        info!("Dry run: images go to {}", run.scratch_dir.display());
    }

    let pipeline = Pipeline::with_defaults(config, behavior, run, client);
    let result = Orchestrator::new(pipeline).run(request).await;

    debug!("Metrics:\n{}", metrics.render());

    match result {
        Ok(RunOutcome::Posted) | Ok(RunOutcome::DryRun) => Ok(()),
        Err(e) => {
            error!("{}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}
