//! Background track loading
//!
//! Decoding is the only slow operation in the engine. It runs off the
//! control thread and hands back a [`PendingTrack`] that the engine then
//! installs, which suits message-driven UIs:
//!
//! ```ignore
//! let pending = loader.load(DeckId::A, bytes).await?;
//! // ...later, back on the UI thread
//! engine.install_track(pending);
//! ```

mod track;

pub use track::{PendingTrack, TrackLoader};
