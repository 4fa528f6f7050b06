use anyhow::{Context, Result};
use pipeline_launcher::backend::{HttpBackend, InMemoryBackend, OrchestrationBackend};
use pipeline_launcher::cli::output::*;
use pipeline_launcher::cli::Cli;
use pipeline_launcher::core::settings::LauncherSettings;
use pipeline_launcher::core::PipelineConfig;
use pipeline_launcher::execution::{prepare_pipeline, LaunchEvent, Launcher};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_directive = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = cli.pipeline_config();

    if cli.print_definition {
        return print_definition(&config);
    }

    let settings = LauncherSettings::load(cli.config.as_deref())
        .context("Failed to load launcher settings")?;

    if cli.dry_run {
        println!("{} Dry run: using the in-process backend", INFO);
        launch(InMemoryBackend::new(), &config).await
    } else {
        let client_config = settings.client_config(cli.endpoint.as_deref());
        let backend = HttpBackend::new(client_config).context("Failed to create backend client")?;
        info!("Using orchestration endpoint {}", backend.endpoint());
        launch(backend, &config).await
    }
}

async fn launch<B: OrchestrationBackend>(backend: B, config: &PipelineConfig) -> Result<()> {
    let spinner = create_wait_spinner();
    let progress = spinner.clone();

    let launcher = Launcher::new(backend).with_event_handler(move |event| match event {
        LaunchEvent::WaitingForCompletion { .. } => {
            start_spinner(&progress, format_launch_event(event));
        }
        LaunchEvent::ExecutionFinished { .. } => {
            progress.finish_and_clear();
            println!("{}", format_launch_event(event));
        }
        _ => println!("{}", format_launch_event(event)),
    });

    println!(
        "{} Launching pipeline {}",
        ROCKET,
        style(&config.pipeline_name).bold()
    );

    match launcher.launch_and_wait(config).await {
        Ok(description) => {
            println!("{}", format_description(&description));
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&description.pipeline_name).bold(),
                style("successfully").green()
            );
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            println!(
                "\n{} {} {}",
                CROSS,
                style(&config.pipeline_name).bold(),
                style("failed").red()
            );
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn print_definition(config: &PipelineConfig) -> Result<()> {
    match prepare_pipeline(config) {
        Ok(pipeline) => {
            let json = serde_json::to_string_pretty(&pipeline.definition())?;
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            println!("{} Invalid launch configuration:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}
