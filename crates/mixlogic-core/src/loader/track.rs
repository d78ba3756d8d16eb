//! Deck track loader
//!
//! Decodes raw file bytes on tokio's blocking pool and tags each result
//! with a per-deck generation number. The engine installs a result only if
//! its generation is newer than what the deck already has, so a slow decode
//! that finishes after a newer one is dropped instead of replacing it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio_file::{DecodeError, DecodedTrack, TrackDecoder};
use crate::types::{DeckId, NUM_DECKS};

/// A decoded track waiting to be installed on a deck
#[derive(Debug, Clone)]
pub struct PendingTrack {
    /// Deck the load was requested for
    pub deck: DeckId,
    /// Load generation; higher numbers were requested later
    pub generation: u64,
    pub track: DecodedTrack,
}

/// Cloneable front end for decoding tracks off the control thread
#[derive(Clone)]
pub struct TrackLoader {
    decoder: Arc<dyn TrackDecoder>,
    /// Last generation handed out per deck
    generations: Arc<[AtomicU64; NUM_DECKS]>,
}

impl TrackLoader {
    pub fn new(decoder: Arc<dyn TrackDecoder>) -> Self {
        Self {
            decoder,
            generations: Arc::new([AtomicU64::new(0), AtomicU64::new(0)]),
        }
    }

    /// Generation of the most recent load request for a deck
    pub fn latest_generation(&self, deck: DeckId) -> u64 {
        self.generations[deck.index()].load(Ordering::Acquire)
    }

    /// Decode `bytes` for `deck`
    ///
    /// The decode runs on the blocking pool; the caller only awaits.
    pub async fn load(&self, deck: DeckId, bytes: Vec<u8>) -> Result<PendingTrack, DecodeError> {
        let generation = self.generations[deck.index()].fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!(
            "Decoding {} bytes for deck {} (generation {})",
            bytes.len(),
            deck,
            generation
        );

        let decoder = Arc::clone(&self.decoder);
        let track = tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(|e| {
                log::error!("Decode task for deck {} failed: {}", deck, e);
                DecodeError::Cancelled
            })??;

        Ok(PendingTrack {
            deck,
            generation,
            track,
        })
    }
}

impl std::fmt::Debug for TrackLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackLoader")
            .field("deck_a_generation", &self.latest_generation(DeckId::A))
            .field("deck_b_generation", &self.latest_generation(DeckId::B))
            .finish()
    }
}
