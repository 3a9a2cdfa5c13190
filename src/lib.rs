// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod error;
pub mod protocol;
pub mod questions;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;

use std::sync::Arc;

use broadcast::ChannelSink;
use questions::QuestionBank;
use state::AppState;

/// Shared handle passed to every axum handler.
#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<AppState>,
    /// The engine's broadcast sink; WebSocket connections subscribe here.
    pub sink: Arc<ChannelSink>,
    pub questions: Arc<QuestionBank>,
}
