//! HTTP 控制接口 + 静态资源

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::services::ServeDir;

use crate::config::display_name;
use crate::protocol::{ConfigResponse, RestartResponse};
use crate::tail::TailService;

#[derive(Clone)]
struct ApiState {
    tail: Arc<TailService>,
    max_lines: usize,
}

pub(super) fn router(tail: Arc<TailService>, max_lines: usize, public_dir: &Path) -> Router {
    Router::new()
        .route("/api/restart", post(restart))
        .route("/api/config", get(config))
        .fallback_service(ServeDir::new(public_dir))
        .with_state(ApiState { tail, max_lines })
}

/// 重新启动日志监控（重新解析配置路径）
async fn restart(State(state): State<ApiState>) -> Json<RestartResponse> {
    match state.tail.restart() {
        Ok(path) => {
            tracing::info!("🔄 已重新启动日志监控: {:?}", path);
            Json(RestartResponse::restarted(&display_name(&path)))
        }
        Err(e) => {
            tracing::warn!("重启日志监控失败: {}", e);
            Json(RestartResponse::failed())
        }
    }
}

/// 当前配置（只返回文件名）
async fn config(State(state): State<ApiState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        log_file_path: state.tail.display_name(),
        max_lines: state.max_lines,
    })
}
