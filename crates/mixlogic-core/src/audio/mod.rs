//! Real-time audio output
//!
//! The UI thread keeps the [`MixEngine`](crate::engine::MixEngine); the cpal
//! callback owns the [`MixRenderer`](crate::engine::MixRenderer). The two
//! only talk through the engine's lock-free command queue.
//!
//! ```ignore
//! use mixlogic_core::audio::start_audio_system;
//!
//! let system = start_audio_system(&config, Arc::new(SystemClock::new()))?;
//! let mut engine = system.engine;
//! engine.synchronize(&state);
//! ```

mod cpal_backend;
mod device;
mod error;

pub use cpal_backend::{start_audio_system, AudioHandle, AudioSystem};
pub use device::{find_output_device, list_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
