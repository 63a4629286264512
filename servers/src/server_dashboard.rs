use anyhow::Result;
use tokio::signal;

mod dashboard_logic;
use dashboard_logic::{config, domains, downstream, logger, state};

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up MEMBERHUB_* variables from a local .env during development.
    dotenvy::dotenv().ok();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), &config.log_level())?;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let app_state = state::AppState::new(config.clone());

    // Register the association domains and start their pollers.
    domains::start_polling(&app_state);

    let downstream_handle = tokio::spawn(downstream::run(
        config.clone(),
        app_state.clone(),
        shutdown_tx.subscribe(),
    ));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Stop the pollers (in-flight fetches may still deliver one trailing
    // update) and shut the downstream server down.
    app_state.scheduler().stop_all();
    let _ = shutdown_tx.send(());
    let _ = tokio::join!(downstream_handle);

    log::info!("Shutdown complete.");
    Ok(())
}
