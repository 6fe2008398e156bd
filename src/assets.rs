// ============================================================================
// ASSET STORE: decoded rasters referenced by logo layers
// ============================================================================
//
// Decoding happens off the interaction path: `request_decode` hands the bytes
// to a rayon worker and returns an id immediately. The renderer only ever
// reads `Ready` slots; a layer whose asset is still pending is skipped for
// that frame and drawn once `poll` reports the decode finished.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::StudioError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

#[derive(Clone, Debug)]
pub enum AssetSlot {
    Pending,
    Ready(Arc<RgbaImage>),
    Failed(String),
}

/// Outcome of one finished background decode, as reported by [`AssetStore::poll`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetEvent {
    Ready(AssetId),
    Failed(AssetId, String),
}

type DecodeResult = (AssetId, Result<RgbaImage, String>);

pub struct AssetStore {
    slots: HashMap<AssetId, AssetSlot>,
    next_id: u64,
    sender: Sender<DecodeResult>,
    receiver: Receiver<DecodeResult>,
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStore {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { slots: HashMap::new(), next_id: 1, sender, receiver }
    }

    fn allocate(&mut self) -> AssetId {
        let id = AssetId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Start decoding `bytes` in the background.
    ///
    /// Bytes that are not recognisably an image are rejected up front so no
    /// layer is ever created for them.
    pub fn request_decode(&mut self, bytes: Vec<u8>) -> Result<AssetId, StudioError> {
        crate::io::sniff_format(&bytes)?;
        let id = self.allocate();
        self.slots.insert(id, AssetSlot::Pending);
        let tx = self.sender.clone();
        rayon::spawn(move || {
            let result = crate::io::decode_image(&bytes).map_err(|e| e.to_string());
            let _ = tx.send((id, result));
        });
        Ok(id)
    }

    fn settle(&mut self, id: AssetId, result: Result<RgbaImage, String>) -> Option<AssetEvent> {
        // The slot may have been released while the decode was in flight.
        let slot = self.slots.get_mut(&id)?;
        match result {
            Ok(img) => {
                *slot = AssetSlot::Ready(Arc::new(img));
                Some(AssetEvent::Ready(id))
            }
            Err(e) => {
                crate::log_warn!("Asset {} failed to decode: {}", id.0, e);
                *slot = AssetSlot::Failed(e.clone());
                Some(AssetEvent::Failed(id, e))
            }
        }
    }

    /// Collect finished decodes without blocking.
    pub fn poll(&mut self) -> Vec<AssetEvent> {
        let mut events = Vec::new();
        while let Ok((id, result)) = self.receiver.try_recv() {
            events.extend(self.settle(id, result));
        }
        events
    }

    /// Block until no slot is pending.
    pub fn wait_all(&mut self) -> Vec<AssetEvent> {
        let mut events = self.poll();
        while self.pending_count() > 0 {
            match self.receiver.recv() {
                Ok((id, result)) => events.extend(self.settle(id, result)),
                Err(_) => break,
            }
        }
        events
    }

    pub fn pending_count(&self) -> usize {
        self.slots.values().filter(|s| matches!(s, AssetSlot::Pending)).count()
    }

    pub fn slot(&self, id: AssetId) -> Option<&AssetSlot> {
        self.slots.get(&id)
    }

    pub fn get_ready(&self, id: AssetId) -> Option<&Arc<RgbaImage>> {
        match self.slots.get(&id) {
            Some(AssetSlot::Ready(img)) => Some(img),
            _ => None,
        }
    }

    pub fn release(&mut self, id: AssetId) {
        self.slots.remove(&id);
    }

    /// Forget every asset. In-flight decodes are dropped when they land.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        crate::io::encode_png(&RgbaImage::from_pixel(w, h, image::Rgba([9, 8, 7, 255]))).unwrap()
    }

    #[test]
    fn decode_lands_after_wait() {
        let mut store = AssetStore::new();
        let id = store.request_decode(png_bytes(5, 4)).unwrap();
        let events = store.wait_all();
        assert_eq!(events, vec![AssetEvent::Ready(id)]);
        assert_eq!(store.get_ready(id).unwrap().dimensions(), (5, 4));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn non_image_bytes_are_rejected_up_front() {
        let mut store = AssetStore::new();
        assert!(matches!(store.request_decode(b"plain text".to_vec()), Err(StudioError::UnsupportedFormat)));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn corrupt_image_fails_in_background() {
        let mut store = AssetStore::new();
        let mut bytes = png_bytes(16, 16);
        bytes.truncate(24);
        let id = store.request_decode(bytes).unwrap();
        let events = store.wait_all();
        assert!(matches!(events.as_slice(), [AssetEvent::Failed(got, _)] if *got == id));
        assert!(store.get_ready(id).is_none());
    }

    #[test]
    fn released_slot_ignores_late_result() {
        let mut store = AssetStore::new();
        let id = store.request_decode(png_bytes(2, 2)).unwrap();
        store.release(id);
        // Nothing pending, so this returns without blocking on the worker.
        assert!(store.wait_all().is_empty());
        assert!(store.slot(id).is_none());
    }
}
