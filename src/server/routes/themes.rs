use crate::config::ThemeEntry;
use crate::server::router::YoddaState;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ThemeList {
    pub themes: Vec<ThemeEntry>,
}

async fn list_themes(State(state): State<YoddaState>) -> Json<ThemeList> {
    Json(ThemeList {
        themes: state.themes.list.clone(),
    })
}

pub fn router() -> Router<YoddaState> {
    Router::new().route("/api/v1/pw/themes", get(list_themes))
}
