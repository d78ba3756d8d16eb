//! Mixing engine
//!
//! Split into a control half and a render half joined by a lock-free queue:
//! - [`MixEngine`]: owned by the UI, reconciles `AppState` snapshots and
//!   tracks transport positions against the wall clock
//! - [`MixRenderer`]: owned by the audio thread, runs voices through the
//!   channel chains and master stage

pub mod command;
mod engine;
mod eq;
pub mod gc;
mod mixer;
mod renderer;
mod smoothing;
mod transport;
mod voice;

pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use engine::*;
pub use eq::{eq_to_db, ThreeBandEq, EQ_HIGH_FREQ, EQ_LOW_FREQ, EQ_MID_FREQ};
pub use mixer::{ChannelChain, MasterStage};
pub use renderer::MixRenderer;
pub use smoothing::SmoothedParam;
pub use transport::{TransportController, TransportState, VoiceStart};
pub use voice::{Voice, VoiceId};
