//! Deferred deallocation for decoded tracks
//!
//! Decoded buffers reach the render thread as `basedrop::Shared<T>`.
//! Dropping the last reference there only enqueues the pointer; the
//! collector thread started here does the actual free, so a deck swap
//! never deallocates megabytes of samples inside the audio callback.

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle};

/// Interval between collection passes
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("mixlogic-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created on the thread that runs it
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Track GC thread started");
            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.map_err(|e| e.to_string()).and_then(|_| rx.recv().map_err(|e| e.to_string())) {
        Ok(handle) => handle,
        Err(e) => {
            // Without a collector thread deferred drops are never reclaimed
            log::error!("Failed to start track GC thread: {}", e);
            Box::leak(Box::new(Collector::new())).handle()
        }
    }
}

/// Handle for allocating `Shared<T>` values
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_clone_and_drop() {
        let data = Shared::new(&gc_handle(), vec![1.0f32; 1024]);
        let other = Shared::clone(&data);
        assert_eq!(other.len(), 1024);
        drop(data);
        assert_eq!(other[0], 1.0);
        drop(other);
    }

    #[test]
    fn test_handle_is_reused() {
        let _a = gc_handle();
        let _b = gc_handle();
        assert!(GC_HANDLE.get().is_some());
    }
}
