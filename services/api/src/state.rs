//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like database pools, the model client and the
//! registry of running interviews.

use crate::config::Config;
use interview_core::{
    llm_client::LLMClient, prompts::PromptLibrary, runtime::SessionRegistry,
    session::SessionLimits,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<crate::db::Db>,
    pub llm_client: Arc<dyn LLMClient>,
    pub prompts: Arc<PromptLibrary>,
    pub limits: SessionLimits,
    /// Interviews with a connected WebSocket, by session id.
    pub sessions: SessionRegistry,
    pub config: Arc<Config>,
}
