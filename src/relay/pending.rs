//! Bounded FIFO of client frames received before the upstream opens.

use std::collections::VecDeque;

use crate::error::RelayError;
use crate::relay::frame::RelayFrame;

/// Frames queued during Dialing/Buffering.
///
/// Owned by the session task only. Consuming it with [`PendingQueue::into_frames`]
/// is the single flush; afterwards the queue no longer exists.
#[derive(Debug)]
pub struct PendingQueue {
    frames: VecDeque<RelayFrame>,
    bytes: usize,
    max_frames: usize,
    max_bytes: usize,
}

impl PendingQueue {
    pub fn new(max_frames: usize, max_bytes: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            bytes: 0,
            max_frames,
            max_bytes,
        }
    }

    /// Append a frame, or fail if either bound would be exceeded.
    pub fn push(&mut self, frame: RelayFrame) -> Result<(), RelayError> {
        let size = frame.payload_len();
        if self.frames.len() >= self.max_frames || self.bytes + size > self.max_bytes {
            return Err(RelayError::BufferExhausted {
                frames: self.frames.len(),
                bytes: self.bytes,
            });
        }
        self.bytes += size;
        self.frames.push_back(frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Consume the queue, yielding frames in arrival order.
    pub fn into_frames(self) -> impl Iterator<Item = RelayFrame> {
        self.frames.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn preserves_order_and_tags() {
        let mut queue = PendingQueue::new(10, 1024);
        queue.push(RelayFrame::Text("a".into())).unwrap();
        queue.push(RelayFrame::Binary(Bytes::from_static(b"b"))).unwrap();
        queue.push(RelayFrame::Text("c".into())).unwrap();

        let frames: Vec<_> = queue.into_frames().collect();
        assert_eq!(
            frames,
            vec![
                RelayFrame::Text("a".into()),
                RelayFrame::Binary(Bytes::from_static(b"b")),
                RelayFrame::Text("c".into()),
            ]
        );
    }

    #[test]
    fn frame_bound() {
        let mut queue = PendingQueue::new(2, 1024);
        queue.push(RelayFrame::Text("1".into())).unwrap();
        queue.push(RelayFrame::Text("2".into())).unwrap();
        let err = queue.push(RelayFrame::Text("3".into())).unwrap_err();
        assert!(matches!(err, RelayError::BufferExhausted { frames: 2, bytes: 2 }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn byte_bound() {
        let mut queue = PendingQueue::new(100, 8);
        queue.push(RelayFrame::Binary(Bytes::from(vec![0u8; 6]))).unwrap();
        assert!(queue.push(RelayFrame::Binary(Bytes::from(vec![0u8; 3]))).is_err());
        assert_eq!(queue.bytes(), 6);
    }
}
