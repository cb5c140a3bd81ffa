use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The generated stylesheet.
pub async fn ui_css(State(state): State<AppState>) -> AppResult<Response> {
    let css = state
        .stylesheet
        .css()
        .map_err(|e| AppError::Internal(format!("Failed to render stylesheet: {e}")))?;

    Ok(([(CONTENT_TYPE, "text/css")], css.to_string()).into_response())
}
