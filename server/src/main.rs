use axum::{
    extract::Query,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use quixio::{best_move, Difficulty, MoveRequest, Player};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let app = app_router();

    let addr = std::env::var("QUIXIO_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn app_router() -> Router {
    let api = Router::new().route("/move", get(handle_move));
    Router::new()
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET])
                .allow_origin(axum::http::HeaderValue::from_static("*"))
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, serde::Deserialize)]
struct MoveQuery {
    board: String,
    player: String,
    difficulty: String,
}

async fn handle_move(Query(query): Query<MoveQuery>) -> Result<impl IntoResponse, ApiError> {
    let req = MoveRequest {
        board: query.board,
        player: query.player.parse::<Player>()?,
        difficulty: query.difficulty.parse::<Difficulty>()?,
    };
    // Searches are CPU-bound; keep them off the async workers.
    let mv = tokio::task::spawn_blocking(move || best_move(req)).await??;
    let headers = [(header::CACHE_CONTROL, "no-store")];
    Ok((headers, Json(mv)))
}

#[derive(Debug)]
struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        let body = format!("{}", self.0);
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use quixio::{legal_moves, Board, MoveResponse};
    use tower::util::ServiceExt;

    async fn send(uri: &str) -> Response {
        app_router()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn http_move_endpoint() {
        let response = send("/api/move?board=AB.../...../...../...../.....&player=sideB&difficulty=medium").await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let res: MoveResponse = serde_json::from_slice(&bytes).unwrap();
        let board = Board::parse("AB.../...../...../...../.....").unwrap();
        assert!(legal_moves(Player::B, &board, true).contains(&res.mv.unwrap()));
    }

    #[tokio::test]
    async fn finished_board_returns_null_move() {
        let response = send("/api/move?board=AAAAA/...../...../...../.....&player=b&difficulty=easy").await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["move"].is_null());
    }

    #[tokio::test]
    async fn bad_input_is_a_client_error() {
        let response = send("/api/move?board=AB.../...../...../...../.....&player=sideB&difficulty=insane").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("insane"));

        let response = send("/api/move?board=AB?&player=a&difficulty=easy").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
