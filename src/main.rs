mod cli;

use bitforge::{
    checkpoint::BatchState,
    config::{self, Config},
    events::LoggingObserver,
    persist::InterruptHandle,
    processor::FfmpegToolkit,
    run::Pipeline,
    scanner,
    service::{ConversionServiceManager, DockerCli},
};

use anyhow::{Context, Result};
use bitforge_av::Tool;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

struct ProcessArgs {
    manifest: PathBuf,
    input_dir: PathBuf,
    output_dir: PathBuf,
    workers: Option<usize>,
    state_dir: Option<PathBuf>,
    until_done: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "bitforge=trace,bitforge_av=debug,bitforge_common=debug".to_string()
        } else {
            "bitforge=info,bitforge_av=info,bitforge_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Process {
            manifest,
            input_dir,
            output_dir,
            workers,
            state_dir,
            until_done,
        } => process(
            ProcessArgs {
                manifest,
                input_dir,
                output_dir,
                workers,
                state_dir,
                until_done,
            },
            cli.config.as_deref(),
        ),
        Commands::Status {
            manifest,
            input_dir,
            state_dir,
        } => show_status(&manifest, &input_dir, state_dir, cli.config.as_deref()),
        Commands::StopService => stop_service(cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("bitforge {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn conversion_service(config: &Config) -> Arc<ConversionServiceManager> {
    let docker = bitforge_av::get_tool_path(Tool::Docker, config.tools.path_for(Tool::Docker))
        .unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            PathBuf::from(Tool::Docker.binary_name())
        });
    Arc::new(ConversionServiceManager::new(
        Arc::new(DockerCli::new(docker)),
        config.service.clone(),
    ))
}

fn process(args: ProcessArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(workers) = args.workers {
        config.ingest.workers = workers;
    }
    if let Some(state_dir) = args.state_dir {
        config.ingest.state_dir = state_dir;
    }
    config::validate_config(&config)?;

    if !args.manifest.exists() {
        anyhow::bail!("Manifest does not exist: {:?}", args.manifest);
    }

    let service = conversion_service(&config);
    let media = Arc::new(FfmpegToolkit::discover(&config.tools));
    let interrupt = InterruptHandle::install(service.clone())?;

    let pipeline = Pipeline::new(config, &args.input_dir, &args.output_dir, service, media)?
        .with_observer(Arc::new(LoggingObserver))
        .with_interrupt(interrupt);

    let result = pipeline.scan(&args.manifest).and_then(|all_paths| {
        if args.until_done {
            pipeline.run_until_done(&all_paths)
        } else {
            pipeline.run_batch(&all_paths)
        }
    });
    pipeline.shutdown();

    let report = result?;
    if let Some(ref snapshot) = report.snapshot {
        println!("Results written to {}", snapshot.display());
    }
    match report.exit_code() {
        0 => println!("All files processed"),
        2 => println!("Run again to process the remaining files"),
        _ => {}
    }

    Ok(ExitCode::from(report.exit_code()))
}

fn show_status(
    manifest: &Path,
    input_dir: &Path,
    state_dir: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;
    let state_dir = state_dir.unwrap_or(config.ingest.state_dir);
    let input_dir = input_dir
        .canonicalize()
        .with_context(|| format!("Input directory not found: {:?}", input_dir))?;

    let all_paths = scanner::scan(manifest, &input_dir, &config.ingest.bitstream_marker)
        .with_context(|| format!("Failed to scan manifest {:?}", manifest))?;
    let state = BatchState::load_verified(&all_paths, &state_dir)?;

    println!("Manifest: {}", manifest.display());
    println!("Files: {}", all_paths.len());
    println!("Processed: {}", state.processed.len());
    println!("Unprocessed: {}", state.unprocessed.len());
    println!(
        "Batches remaining: {}",
        state.unprocessed.len().div_ceil(config.ingest.batch_size)
    );

    Ok(ExitCode::SUCCESS)
}

fn stop_service(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;
    let service = conversion_service(&config);
    service.stop_and_remove()?;
    println!("Conversion service {} stopped", service.name());
    Ok(ExitCode::SUCCESS)
}

fn check_tools(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = bitforge_av::check_tools(|tool| config.tools.path_for(tool));
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Image and video files need them.");
    }

    Ok(ExitCode::SUCCESS)
}

fn validate_config(path: Option<&Path>) -> Result<ExitCode> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Batch size: {}", config.ingest.batch_size);
    println!("  Chunk size: {}", config.ingest.chunk_size);
    println!("  Workers: {}", config.ingest.worker_count());
    println!("  State dir: {}", config.ingest.state_dir.display());
    println!(
        "  Service: {} ({})",
        config.service.container_name, config.service.image
    );

    Ok(ExitCode::SUCCESS)
}
