use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::continuity::RestartContinuity;
use crate::error::StartupError;
use crate::gateway::DiscordGateway;
use crate::lifecycle::Lifecycle;
use crate::persistence::PeriodicPersistence;
use crate::presence::PresenceRefresh;
use crate::provisioner::ConfigProvisioner;
use crate::readiness::ReadinessGate;
use crate::store::ConfigStore;
use crate::traits::{Gateway, Service};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. Credential first: refuse to start without a token.
    let token_path = PathBuf::from(&config.discord.token_path);
    if !token_path.exists() {
        return Err(StartupError::CredentialMissing(token_path).into());
    }
    let token = std::fs::read_to_string(&token_path)?.trim().to_string();

    // 2. Record store, populated from disk before anything ticks.
    let store = Arc::new(ConfigStore::new(&config.data.config_dir));
    store.load().await?;

    // 3. Gateway and readiness.
    let gate = Arc::new(ReadinessGate::new());
    let gateway = Arc::new(DiscordGateway::new(&token, Arc::clone(&gate)));
    let gateway_dyn: Arc<dyn Gateway> = gateway.clone();

    // 4. Services, registered as an explicit typed list. Registration
    //    order is start order: presence, provisioner, persistence.
    let mut lifecycle = Lifecycle::new(Arc::clone(&store), Arc::clone(&gateway_dyn));
    let cancel = lifecycle.cancel_token();
    let presence = Arc::new(PresenceRefresh::new(
        Arc::clone(&gateway_dyn),
        Duration::from_secs(config.discord.presence_interval_secs),
        cancel.child_token(),
    ));
    let provisioner = Arc::new(ConfigProvisioner::new(
        Arc::clone(&store),
        Arc::clone(&gateway_dyn),
        Arc::clone(&gate),
        Duration::from_secs(config.data.provision_tick_secs),
        cancel.child_token(),
    ));
    let persistence = Arc::new(PeriodicPersistence::new(
        Arc::clone(&store),
        Duration::from_secs(config.data.save_interval_secs),
        cancel.child_token(),
    ));
    lifecycle.register(presence as Arc<dyn Service>);
    lifecycle.register(provisioner as Arc<dyn Service>);
    lifecycle.register(persistence as Arc<dyn Service>);
    let lifecycle = Arc::new(lifecycle);

    // 5. OS termination hook: unconditional save, then the idempotent
    //    shutdown. Registered before the connection is attempted.
    spawn_signal_hook(Arc::clone(&store), Arc::clone(&lifecycle));

    // 6. Connect. The client task owns the websocket from here on.
    let mut ready = gateway.ready_signal();
    Arc::clone(&gateway).connect().await?;
    info!("Discord client connecting");

    // 7. Ready-driven init: restart continuity first (needs only the
    //    connection), then the registered services.
    {
        let lifecycle = Arc::clone(&lifecycle);
        let gateway = Arc::clone(&gateway_dyn);
        let marker_path = config.data.marker_path.clone();
        tokio::spawn(async move {
            if ready.wait_for(|ready| *ready).await.is_err() {
                return;
            }
            let continuity = RestartContinuity::new(marker_path);
            match continuity.consume_if_present(gateway.as_ref()).await {
                Ok(true) => info!("pending restart notification handled"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "restart notification failed"),
            }
            lifecycle.start_services().await;
        });
    }

    // 8. Block until a shutdown is triggered, by signal or explicit call.
    lifecycle.wait().await;
    Ok(())
}

fn spawn_signal_hook(store: Arc<ConfigStore>, lifecycle: Arc<Lifecycle>) {
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("termination signal received");
        if let Err(e) = store.save().await {
            warn!(error = %e, "save on termination failed");
        }
        lifecycle.shutdown().await;
    });
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
