//! HTTP endpoints: room creation for the host page, plus a read-only
//! listing of the available question categories.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{RoomConfig, RoomId};
use crate::ServerState;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub total_players: usize,
    pub spy_count: usize,
    pub blank_count: usize,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub msg: String,
}

/// POST /api/create-room
pub async fn create_room(
    State(state): State<ServerState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, (StatusCode, Json<ApiError>)> {
    let config = RoomConfig {
        total_players: req.total_players,
        spy_count: req.spy_count,
        blank_count: req.blank_count,
        category: req.category,
    };

    match state.engine.create_room(config).await {
        Ok(room_id) => Ok(Json(CreateRoomResponse { room_id })),
        Err(e) => {
            let status = match e {
                EngineError::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(ApiError {
                    code: e.code().to_string(),
                    msg: e.to_string(),
                }),
            ))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionTypesResponse {
    pub types: Vec<String>,
    pub total: usize,
}

/// GET /api/question-types
pub async fn question_types(State(state): State<ServerState>) -> Json<QuestionTypesResponse> {
    Json(QuestionTypesResponse {
        types: state.questions.categories(),
        total: state.questions.total(),
    })
}
