use std::{io, process};

use tracing::debug;
use tracing_subscriber::EnvFilter;

use immuctl::{
    cli::{Cli, Commands, parse_args},
    config::{ToolConfig, load_config},
    controller::ServiceLifecycleController,
    error::ServiceError,
    host::LinuxHost,
    launcher::{DetachedLauncher, Invocation, OsSpawner, ThreadSleeper},
    process::ProcessScanner,
    prompt::TerminalReader,
    schedule::{DelayScheduler, Schedule},
    service::{ServiceName, ServiceRequest},
};

fn main() {
    let args = parse_args();
    init_logging(&args);

    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(args: Cli) -> Result<(), ServiceError> {
    let invocation = Invocation::from_env()?;
    let config = load_config(args.config.as_deref())?;
    debug!("Loaded configuration: {config:?}");
    let host = LinuxHost::new(config.clone());
    let globals = args.global_args();

    match args.command {
        Commands::Service(service) => {
            manage_service(&host, &invocation, &service.request(), &globals)
        }
        Commands::Run {
            service,
            detached,
            args: extra,
        } => run_service(&host, &config, &invocation, &service, detached, &extra),
    }
}

fn manage_service(
    host: &LinuxHost,
    invocation: &Invocation,
    request: &ServiceRequest,
    globals: &[String],
) -> Result<(), ServiceError> {
    let mut prompt = TerminalReader::stdio();
    let mut stdout = io::stdout();
    let mut controller = ServiceLifecycleController::new(host, &mut prompt, &mut stdout);
    let validated = controller.validate(request)?;

    let scheduler = DelayScheduler::new(invocation, &OsSpawner, &ThreadSleeper);
    match scheduler.schedule(request, globals)? {
        Schedule::Proceed => controller.execute(validated),
        scheduled => {
            println!("{scheduled}");
            Ok(())
        }
    }
}

fn run_service(
    host: &LinuxHost,
    config: &ToolConfig,
    invocation: &Invocation,
    service: &str,
    detached: bool,
    extra: &[String],
) -> Result<(), ServiceError> {
    let service = ServiceName::from_arg(service)?;

    if detached {
        let launcher = DetachedLauncher::new(
            ProcessScanner::system(),
            &OsSpawner,
            &ThreadSleeper,
            config.settle(),
        );
        launcher.launch_detached(invocation, service.as_ref(), &mut io::stdout())?;
        return Ok(());
    }

    Err(host.exec_foreground(service, extra))
}
