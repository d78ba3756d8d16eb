//! MixLogic Core - two-deck mixing engine
//!
//! The UI owns an [`AppState`](state::AppState) and calls
//! [`MixEngine::synchronize`](engine::MixEngine::synchronize) after every
//! change; the engine reconciles transports and pushes smoothed parameters
//! to the real-time [`MixRenderer`](engine::MixRenderer).

pub mod audio;
pub mod audio_file;
pub mod clock;
pub mod config;
pub mod crossfade;
pub mod engine;
pub mod explain;
pub mod loader;
pub mod state;
pub mod types;

pub use types::*;
