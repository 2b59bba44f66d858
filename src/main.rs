//! Card Battle Server
//!
//! Serves the battle rendezvous over WebSocket.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use card_battle::{
    BattleConfig, InMemoryStore, Matchmaker, VERSION,
    network::{AuthConfig, BattleServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Card Battle Server v{}", VERSION);

    let config = ServerConfig::from_env().context("loading server config")?;
    let auth = AuthConfig::from_env();
    if !auth.is_configured() && !auth.allow_debug_tokens {
        warn!("No AUTH_SECRET or AUTH_PUBLIC_KEY_PEM set; every login will be rejected");
    }
    if auth.allow_debug_tokens {
        warn!("Debug tokens are enabled");
    }

    let store = match &config.seed_data_path {
        Some(path) => {
            let store = InMemoryStore::load(path)
                .await
                .with_context(|| format!("loading seed data from {}", path.display()))?;
            info!("Loaded {} players from {}", store.player_count().await, path.display());
            store
        }
        None => {
            warn!("No SEED_DATA_PATH set; starting with an empty store");
            InMemoryStore::new()
        }
    };

    let battle = BattleConfig::default();
    info!(
        "Rounds: {}, min deck: {}, crit chance: {}%",
        battle.max_rounds, battle.min_deck_size, battle.crit_chance_percent
    );
    if let Some(timeout) = config.matchmaking.wait_timeout {
        info!("Matchmaking wait timeout: {:?}", timeout);
    }

    let matchmaker = Arc::new(Matchmaker::new(Arc::new(store), battle, config.matchmaking.clone()));
    let server = Arc::new(BattleServer::new(config, auth, matchmaker));

    let running = server.clone();
    let mut handle = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = &mut handle => {
            result.context("server task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            server.shutdown();
            handle.await.context("server task panicked")??;
        }
    }

    Ok(())
}
