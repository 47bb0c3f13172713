//! Latest-frame store shared by the upload and stream handlers

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;

use crate::frame::{Fingerprint, Frame};

/// Holds the single most recent frame.
///
/// Backed by a `watch` slot: `set` swaps the whole frame under the slot's
/// lock, `get` clones the current value out. Readers only ever see `None` or a
/// complete (bytes, fingerprint) pair. Last writer wins.
#[derive(Clone)]
pub struct FrameStore {
    slot: Arc<watch::Sender<Option<Frame>>>,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Replace the stored frame and return the snapshot that was stored.
    ///
    /// Hashing happens before the slot is locked; only the sequence number is
    /// assigned inside, so sequence order matches store order.
    pub fn set(&self, bytes: impl Into<Bytes>) -> Frame {
        let mut frame = Frame::new(bytes.into(), 0);
        self.slot.send_modify(|current| {
            frame.sequence = current.as_ref().map_or(1, |f| f.sequence + 1);
            *current = Some(frame.clone());
        });
        frame
    }

    /// Snapshot of the current frame, `None` before the first upload
    pub fn get(&self) -> Option<Frame> {
        self.slot.borrow().clone()
    }

    /// Fingerprint of the current frame
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.slot.borrow().as_ref().map(|f| f.fingerprint.clone())
    }

    /// True until the first upload
    pub fn is_empty(&self) -> bool {
        self.slot.borrow().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_has_no_frame() {
        let store = FrameStore::new();
        assert!(store.is_empty());
        assert!(store.get().is_none());
        assert!(store.fingerprint().is_none());
    }

    #[test]
    fn set_then_get_returns_bytes() {
        let store = FrameStore::new();
        let stored = store.set(Bytes::from_static(b"jpeg-1"));
        let frame = store.get().unwrap();
        assert_eq!(frame.bytes, Bytes::from_static(b"jpeg-1"));
        assert_eq!(frame.fingerprint, Fingerprint::of(b"jpeg-1"));
        assert_eq!(frame.sequence, 1);
        assert_eq!(stored.fingerprint, frame.fingerprint);
        assert!(!store.is_empty());
    }

    #[test]
    fn later_set_wins() {
        let store = FrameStore::new();
        store.set(b"first".to_vec());
        store.set(b"second".to_vec());
        let frame = store.get().unwrap();
        assert_eq!(&frame.bytes[..], b"second");
        assert_eq!(frame.sequence, 2);
        assert_eq!(store.fingerprint(), Some(Fingerprint::of(b"second")));
    }

    #[test]
    fn snapshot_survives_overwrite() {
        let store = FrameStore::new();
        store.set(b"old".to_vec());
        let snapshot = store.get().unwrap();
        store.set(b"new".to_vec());
        assert_eq!(&snapshot.bytes[..], b"old");
        assert_eq!(snapshot.fingerprint, Fingerprint::of(b"old"));
    }

    #[test]
    fn clones_share_the_slot() {
        let store = FrameStore::new();
        let other = store.clone();
        other.set(b"shared".to_vec());
        assert_eq!(&store.get().unwrap().bytes[..], b"shared");
    }

    #[test]
    fn concurrent_readers_never_see_torn_frames() {
        let store = FrameStore::new();
        let writers: Vec<_> = (0..4u8)
            .map(|w| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..200u32 {
                        let len = 1 + (i as usize % 64);
                        store.set(vec![w.wrapping_add(i as u8); len]);
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(frame) = store.get() {
                            assert_eq!(frame.fingerprint, Fingerprint::of(&frame.bytes));
                        }
                    }
                })
            })
            .collect();
        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
        let last = store.get().unwrap();
        assert_eq!(last.sequence, 800);
        assert_eq!(last.fingerprint, Fingerprint::of(&last.bytes));
    }
}
