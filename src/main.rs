mod cli;
mod config;
mod ecflow;
mod envir;
mod error;
mod lifecycle;
mod runner;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{Cli, Command, EnvFormat};
use config::SiteConfig;
use ecflow::EcflowClient;
use envir::{Environment, Resolver};
use runner::{ExitPlan, JobRunner, RunRequest};
use ui::JobConsole;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli).await {
        Ok(plan) => plan.terminate(),
        Err(e) => {
            eprintln!("ecfjob: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = std::env::var("ECFJOB_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn dispatch(cli: Cli) -> Result<ExitPlan> {
    let env = Environment::capture();
    let config = SiteConfig::load(cli.config.as_deref(), &env)?;
    let console = JobConsole::default();

    match cli.command {
        Command::Run { command } => {
            let (program, args) = command
                .split_first()
                .context("no job command given")?;
            let request = RunRequest {
                tier: cli.envir,
                program: program.clone(),
                args: args.to_vec(),
            };

            let client = EcflowClient::locate(&config, &env);
            let exit = JobRunner::new(&config, &env).run(client, request).await?;
            if cli.verbose {
                if let Some(record) = &exit.record {
                    console.print_record(record);
                }
            }
            Ok(exit.plan)
        }
        Command::Env { format } => {
            let resolver = Resolver::new(&config, &env);
            let tier = resolver.select_tier_name(cli.envir.as_deref());
            let bindings = resolver.resolve(&tier)?;
            match format {
                EnvFormat::Shell => console.print_exports(&bindings),
                EnvFormat::Json => console.print_json(&bindings)?,
            }
            Ok(ExitPlan::Code(0))
        }
        Command::Tiers => {
            console.print_tiers();
            Ok(ExitPlan::Code(0))
        }
    }
}
