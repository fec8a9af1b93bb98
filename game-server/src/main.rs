use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use game_core::CategoryStore;
use game_persistence::{connection::connect_and_migrate, repositories::UserRepository};
use game_server::{
    auth::AuthService, config::Config, create_routes, learning::LearningManager,
    lobby::LobbyManager, match_coordinator::MatchCoordinator, store::SeaOrmStore,
    websocket::ConnectionManager,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting Chrono Arena server...");

    let config = Config::new();

    let categories = match &config.categories_file {
        Some(path) => CategoryStore::load(path),
        None => CategoryStore::with_default_categories(),
    };
    let categories = match categories {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to load category dataset: {:?}", e);
            error!("Set CATEGORIES_FILE to a valid dataset or unset it for the built-in one.");
            std::process::exit(1);
        }
    };

    let db = match connect_and_migrate().await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };
    let user_repository = Arc::new(UserRepository::new(db.clone()));
    let store = Arc::new(SeaOrmStore::new(db));

    let connection_manager = Arc::new(ConnectionManager::new());
    let lobby = Arc::new(LobbyManager::new(connection_manager.clone()));
    let coordinator = Arc::new(MatchCoordinator::new_with_config(
        categories.clone(),
        connection_manager.clone(),
        store.clone(),
        Duration::from_millis(config.match_start_delay_ms),
        Duration::from_millis(config.round_intro_delay_ms),
    ));
    let learning = Arc::new(LearningManager::new(categories.clone(), store));

    let auth_service = if config.auth_dev_mode {
        info!("Starting in development authentication mode - JWT validation disabled");
        Arc::new(AuthService::new_dev_mode())
    } else {
        Arc::new(AuthService::new(&config.jwt_secret))
    };

    let routes = create_routes(
        connection_manager.clone(),
        categories,
        lobby.clone(),
        coordinator.clone(),
        learning,
        auth_service,
        user_repository,
    );

    // Matchmaking sweep: widen bands, pair waiting players, expire
    // invites, prune dead lobby entries
    {
        let lobby = lobby.clone();
        let coordinator = coordinator.clone();
        let sweep_interval = Duration::from_secs(config.matchmaking_sweep_seconds);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                let pairs = lobby.sweep().await;
                for pair in pairs {
                    let participants = vec![
                        (pair.player1.connection_id, pair.player1.to_auth_user()),
                        (pair.player2.connection_id, pair.player2.to_auth_user()),
                    ];
                    if let Err(e) = coordinator
                        .create_match(&pair.category_key, participants)
                        .await
                    {
                        error!("Failed to create swept match: {}", e);
                    }
                }
            }
        });
    }

    // Stale connection cleanup
    {
        let connection_manager = connection_manager.clone();
        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                connection_manager.cleanup_inactive_connections(timeout).await;
            }
        });
    }

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config
            .host
            .parse::<std::net::IpAddr>()
            .expect("Invalid HOST"),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
