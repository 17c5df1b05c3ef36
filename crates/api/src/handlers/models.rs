use axum::extract::State;
use axum::Json;
use serde::Serialize;

use genrelay_core::catalog::ModelSpec;

use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<ModelSpec>,
    pub count: usize,
}

/// GET /api/v1/models
pub async fn list_models(State(state): State<AppState>) -> Json<DataResponse<ModelList>> {
    let models = state.dispatcher.catalog().models().to_vec();
    Json(DataResponse {
        data: ModelList {
            count: models.len(),
            models,
        },
    })
}
