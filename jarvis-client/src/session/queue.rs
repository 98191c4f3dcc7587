use std::collections::VecDeque;
use crate::config::{OverflowPolicy, QueueConfig};
use crate::transport::Frame;

/// Frames waiting for the connection to open
#[derive(Debug)]
pub struct OutboundQueue {
    frames: VecDeque<Frame>,
    capacity: usize,
    overflow: OverflowPolicy,
}

impl OutboundQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity: config.capacity,
            overflow: config.overflow,
        }
    }

    /// Returns the frame that was dropped to respect the capacity, if any
    pub fn push(&mut self, frame: Frame) -> Option<Frame> {
        if self.capacity == 0 {
            return Some(frame);
        }
        if self.frames.len() < self.capacity {
            self.frames.push_back(frame);
            return None;
        }
        match self.overflow {
            OverflowPolicy::DropOldest => {
                let evicted = self.frames.pop_front();
                self.frames.push_back(frame);
                evicted
            }
            OverflowPolicy::RejectNewest => Some(frame),
        }
    }

    /// Put back a frame that failed to transmit, ahead of everything else
    pub fn requeue(&mut self, frame: Frame) {
        self.frames.push_front(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Frame {
        Frame::Text(s.to_string())
    }

    fn queue(capacity: usize, overflow: OverflowPolicy) -> OutboundQueue {
        OutboundQueue::new(&QueueConfig { capacity, overflow })
    }

    #[test]
    fn test_drop_oldest() {
        let mut q = queue(2, OverflowPolicy::DropOldest);
        assert_eq!(q.push(text("a")), None);
        assert_eq!(q.push(text("b")), None);
        assert_eq!(q.push(text("c")), Some(text("a")));
        assert_eq!(q.pop(), Some(text("b")));
        assert_eq!(q.pop(), Some(text("c")));
        assert!(q.is_empty());
    }

    #[test]
    fn test_reject_newest() {
        let mut q = queue(2, OverflowPolicy::RejectNewest);
        q.push(text("a"));
        q.push(text("b"));
        assert_eq!(q.push(text("c")), Some(text("c")));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(text("a")));
    }

    #[test]
    fn test_requeue_goes_first() {
        let mut q = queue(4, OverflowPolicy::DropOldest);
        q.push(text("b"));
        q.requeue(text("a"));
        assert_eq!(q.pop(), Some(text("a")));
        assert_eq!(q.pop(), Some(text("b")));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut q = queue(0, OverflowPolicy::DropOldest);
        assert_eq!(q.push(text("a")), Some(text("a")));
        assert!(q.is_empty());
    }
}
