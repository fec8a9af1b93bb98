use serde::Deserialize;
use std::sync::Arc;
use warp::Filter;

use crate::auth::AuthService;
use crate::learning::LearningManager;
use crate::lobby::LobbyManager;
use crate::match_coordinator::MatchCoordinator;
use crate::websocket::ConnectionManager;
use game_core::CategoryStore;
use game_persistence::repositories::UserRepository;

pub mod auth;
pub mod config;
pub mod learning;
pub mod lobby;
pub mod match_coordinator;
pub mod store;
pub mod websocket;

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<u64>,
}

#[allow(clippy::too_many_arguments)]
pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    categories: Arc<CategoryStore>,
    lobby: Arc<LobbyManager>,
    coordinator: Arc<MatchCoordinator>,
    learning: Arc<LearningManager>,
    auth_service: Arc<AuthService>,
    user_repository: Arc<UserRepository>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let categories_filter = warp::any().map({
        let categories = categories.clone();
        move || categories.clone()
    });

    let lobby_filter = warp::any().map({
        let lobby = lobby.clone();
        move || lobby.clone()
    });

    let coordinator_filter = warp::any().map({
        let coordinator = coordinator.clone();
        move || coordinator.clone()
    });

    let learning_filter = warp::any().map({
        let learning = learning.clone();
        move || learning.clone()
    });

    let auth_filter = warp::any().map({
        let auth_service = auth_service.clone();
        move || auth_service.clone()
    });

    let user_repository_filter = warp::any().map({
        let user_repository = user_repository.clone();
        move || user_repository.clone()
    });

    // WebSocket endpoint; the bearer token rides the query string
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(warp::query::<WsQuery>())
        .and(connection_manager_filter.clone())
        .and(categories_filter.clone())
        .and(lobby_filter.clone())
        .and(coordinator_filter.clone())
        .and(learning_filter.clone())
        .and(auth_filter.clone())
        .map(
            |ws: warp::ws::Ws, query: WsQuery, conn_mgr, categories, lobby, coordinator, learning, auth| {
                ws.on_upgrade(move |socket| {
                    websocket::handle_connection(
                        socket,
                        query.token,
                        conn_mgr,
                        categories,
                        lobby,
                        coordinator,
                        learning,
                        auth,
                    )
                })
            },
        );

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    // Rating leaderboard
    let leaderboard = warp::path("leaderboard")
        .and(warp::get())
        .and(warp::query::<LeaderboardQuery>())
        .and(user_repository_filter.clone())
        .and_then(handle_leaderboard_request);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET"]);

    websocket
        .or(health)
        .or(leaderboard)
        .with(cors)
        .with(warp::log("chrono_arena"))
}

async fn handle_leaderboard_request(
    query: LeaderboardQuery,
    user_repository: Arc<UserRepository>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let limit = query.limit.unwrap_or(10).min(100); // Default 10, max 100

    match user_repository.get_leaderboard(limit).await {
        Ok(leaderboard) => Ok(warp::reply::with_status(
            warp::reply::json(&leaderboard),
            warp::http::StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch leaderboard: {}", err);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Failed to fetch leaderboard"
                })),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
