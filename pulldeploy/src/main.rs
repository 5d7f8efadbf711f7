//! CLI binary entry point for PullDeploy.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pulldeploy::cli::{Cli, Commands};
use pulldeploy::commands;
use pulldeploy::config::loader::load_daemon_config;

const EXIT_CONFIG_ERROR: u8 = 3;
const EXIT_EXECUTION_ERROR: u8 = 4;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logfile = match &cli.command {
        Commands::Daemon(args) => args.logfile.clone(),
        _ => None,
    };
    let _guard = init_tracing(&cli.verbose, logfile.as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start the tokio runtime");
    runtime.block_on(real_main(cli))
}

/// Set up the global subscriber. When `logfile` is given (daemon mode),
/// writes go to that file through a non-blocking appender whose guard
/// must be kept alive for the process's lifetime; otherwise writes go to
/// stderr.
fn init_tracing(verbose: &str, logfile: Option<&camino::Utf8Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(verbose).unwrap_or_else(|_| EnvFilter::new("info"));
    match logfile {
        Some(path) => {
            let dir = path.parent().unwrap_or(camino::Utf8Path::new("."));
            let filename = path.file_name().unwrap_or("pulldeploy.log");
            let appender = tracing_appender::rolling::never(dir, filename);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

async fn real_main(cli: Cli) -> ExitCode {
    let (config, config_errors) = match load_daemon_config(&cli.config_dir) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("pulldeploy: {e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    for err in &config_errors {
        tracing::warn!("{err}");
    }

    let result = match cli.command {
        Commands::InitRepo(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::initrepo::run(storage.as_ref(), &args.app).await
        }
        Commands::AddEnv(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::addenv::run(storage.as_ref(), config.signaller.clone(), &args.app, &args.envs).await
        }
        Commands::RmEnv(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::rmenv::run(storage.as_ref(), config.signaller.clone(), &args.app, &args.envs).await
        }
        Commands::Set(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::set::run(storage.as_ref(), config.signaller.clone(), &args.app, &args.env, args.keep).await
        }
        Commands::Upload(args) => {
            let Some(app_config) = config.app(&args.app).cloned() else {
                eprintln!("pulldeploy: upload: no configuration for application {}", args.app);
                return ExitCode::from(EXIT_EXECUTION_ERROR);
            };
            let Some(artifact_type) = config.artifact_type(&app_config.artifact_type).cloned() else {
                eprintln!("pulldeploy: upload: unknown artifact type {}", app_config.artifact_type);
                return ExitCode::from(EXIT_EXECUTION_ERROR);
            };
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::upload::run(
                storage.as_ref(),
                config.signaller.clone(),
                &app_config,
                &artifact_type,
                &args.app,
                &args.version,
                &args.file,
                args.disabled,
            )
            .await
        }
        Commands::Enable(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::enable::run(storage.as_ref(), config.signaller.clone(), &args.app, &args.version).await
        }
        Commands::Disable(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::disable::run(storage.as_ref(), config.signaller.clone(), &args.app, &args.version).await
        }
        Commands::Purge(args) => {
            let Some(app_config) = config.app(&args.app).cloned() else {
                eprintln!("pulldeploy: purge: no configuration for application {}", args.app);
                return ExitCode::from(EXIT_EXECUTION_ERROR);
            };
            let Some(artifact_type) = config.artifact_type(&app_config.artifact_type).cloned() else {
                eprintln!("pulldeploy: purge: unknown artifact type {}", app_config.artifact_type);
                return ExitCode::from(EXIT_EXECUTION_ERROR);
            };
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::purge::run(storage.as_ref(), config.signaller.clone(), &artifact_type, &args.app, &args.version).await
        }
        Commands::Deploy(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::deploy::run(storage.as_ref(), config.signaller.clone(), &args.app, &args.env, &args.version).await
        }
        Commands::Release(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::release::run(
                storage.as_ref(),
                config.signaller.clone(),
                &args.app,
                &args.env,
                &args.version,
                &args.previewers,
            )
            .await
        }
        Commands::List => commands::list::run(&config),
        Commands::Status(args) => {
            let storage = match commands::open_storage(&config).await {
                Ok(s) => s,
                Err(e) => return config_error(e),
            };
            commands::status::run(storage.as_ref(), &args.app).await
        }
        Commands::ListHosts(args) => {
            commands::listhosts::run(config.signaller.clone(), &args.app, &args.env).await
        }
        Commands::Daemon(args) => commands::daemon::run(config, &args.env).await,
    };

    result.report();
    if result.has_errors() {
        ExitCode::from(EXIT_EXECUTION_ERROR)
    } else {
        ExitCode::SUCCESS
    }
}

fn config_error(e: pulldeploy::PullDeployError) -> ExitCode {
    eprintln!("pulldeploy: {e}");
    ExitCode::from(EXIT_CONFIG_ERROR)
}
