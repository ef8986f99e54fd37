use catalog_reducer::config::{PORT_ENV, ParsedArgs, ReducerConfig, usage};
use catalog_reducer::reducer::service::ReductionService;
use catalog_reducer::replica::handle::ReplicaHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "catalog-reducer".to_string());

    let config = match ReducerConfig::from_args(args, std::env::var(PORT_ENV).ok()) {
        Ok(ParsedArgs::Run(config)) => config,
        Ok(ParsedArgs::Help) => {
            println!("{}", usage(&program));
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", usage(&program));
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    for (arg, reason) in &config.skipped {
        tracing::warn!("Ignoring replica argument '{}': {}", arg, reason);
    }
    if let Some(raw) = &config.ignored_env_port {
        tracing::warn!("Invalid {} value '{}', using default port", PORT_ENV, raw);
    }

    tracing::info!("Starting reducer with {} replica(s)", config.replicas.len());

    // 1. Replica handles, in configured order:
    let mut replicas = Vec::with_capacity(config.replicas.len());
    for addr in &config.replicas {
        replicas.push(ReplicaHandle::connect(addr.clone(), config.replica_options).await);
    }

    // 2. Reduction service:
    let service = ReductionService::new(replicas);

    // 3. Stats reporter:
    if let Some(every) = config.stats_interval {
        let _reporter = service.spawn_stats_reporter(every);
    }

    // 4. Dispatcher listener:
    let listen_addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("Press Ctrl+C to shutdown");

    tokio::select! {
        result = service.clone().serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }

    service.shutdown().await;
    Ok(())
}
