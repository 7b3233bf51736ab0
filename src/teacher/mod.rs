use axum::Router;

use crate::state::AppState;

mod dto;
pub mod handlers;
mod services;

pub fn router() -> Router<AppState> {
    handlers::teacher_routes()
}
