//! The snapshot push channel.
//!
//! The engine emits one [`WorldSnapshot`] after each cache-changing
//! mutation through a caller-supplied sink. The sink is an injected
//! dependency: a closure, or an `mpsc` sender via [`channel_sink`] when the
//! consumer lives on another thread.

use crate::query::WorldSnapshot;
use std::sync::mpsc::Sender;
use tracing::debug;

/// Receives every emitted snapshot.
pub type SnapshotSink = Box<dyn FnMut(WorldSnapshot) + Send>;

/// A sink that forwards snapshots into a channel. Snapshots sent after the
/// receiver has been dropped are discarded.
pub fn channel_sink(sender: Sender<WorldSnapshot>) -> SnapshotSink {
    Box::new(move |snapshot| {
        if sender.send(snapshot).is_err() {
            debug!("snapshot receiver dropped");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gated_world, new_engine};
    use std::sync::mpsc;

    #[test]
    fn channel_sink_delivers_across_threads() {
        let (tx, rx) = mpsc::channel();
        let mut engine = new_engine(gated_world());
        engine.set_sink(channel_sink(tx));

        let handle = std::thread::spawn(move || {
            engine.add_item_to_inventory("Key");
            engine
        });
        let engine = handle.join().unwrap();

        let snapshot = rx.recv().unwrap();
        assert_eq!(snapshot.is_region_accessible("B"), Some(true));
        assert!(!engine.is_batching());
    }

    #[test]
    fn dropped_receiver_is_harmless() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut engine = new_engine(gated_world());
        engine.set_sink(channel_sink(tx));
        assert!(engine.add_item_to_inventory("Key"));
    }
}
