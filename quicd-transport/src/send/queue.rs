//! # Send Request Queue
//!
//! Frames waiting to be sent are queued as requests: an upper bound on the
//! encoded size plus a function that materializes the frame once the packet
//! builder knows how much room is left. Fixed frames use their exact size
//! as the bound.
//!
//! The packet builder calls [`SendRequestQueue::next`] with the space left
//! in the packet and gets the oldest request that fits. Selection is
//! first-fit in arrival order; a large request at the head does not block
//! smaller ones behind it, and it keeps its place for the next packet.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::frames::Frame;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

type ProduceFn = Box<dyn FnOnce(usize) -> Frame + Send>;

/// A deferred frame.
///
/// `estimated_size` must be at least the encoded size of the frame the
/// producer returns for any budget of that size or larger.
pub struct SendRequest {
    estimated_size: usize,
    producer: ProduceFn,
}

impl SendRequest {
    /// A request for a frame that already exists.
    pub fn fixed(frame: Frame) -> Self {
        let estimated_size = frame.encoded_len();
        Self {
            estimated_size,
            producer: Box::new(move |_| frame),
        }
    }

    /// A request whose frame is built when space is granted.
    pub fn deferred<F>(estimated_size: usize, producer: F) -> Self
    where
        F: FnOnce(usize) -> Frame + Send + 'static,
    {
        Self {
            estimated_size,
            producer: Box::new(producer),
        }
    }

    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    /// Build the frame for a packet with `budget` bytes left.
    ///
    /// A producer that returns more than `budget` bytes breaks the queue's
    /// size contract; the frame is rejected rather than overflowing the
    /// packet.
    pub fn produce(self, budget: usize) -> Result<Frame> {
        let frame = (self.producer)(budget);
        let produced = frame.encoded_len();
        if produced > budget {
            return Err(Error::FrameExceedsBudget { produced, budget });
        }
        Ok(frame)
    }
}

impl fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendRequest")
            .field("estimated_size", &self.estimated_size)
            .finish_non_exhaustive()
    }
}

/// Thread-safe FIFO of [`SendRequest`]s.
///
/// Callers on any thread may add requests while the connection drains the
/// queue; insertion and the scan-and-remove in `next` are mutually
/// exclusive.
#[derive(Debug, Default)]
pub struct SendRequestQueue {
    requests: Mutex<VecDeque<SendRequest>>,
}

impl SendRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame that is already built.
    pub fn add_frame(&self, frame: Frame) {
        self.add(SendRequest::fixed(frame));
    }

    /// Queue a frame to be built later with at most `estimated_size` bytes.
    pub fn add_request<F>(&self, estimated_size: usize, producer: F)
    where
        F: FnOnce(usize) -> Frame + Send + 'static,
    {
        self.add(SendRequest::deferred(estimated_size, producer));
    }

    pub fn add(&self, request: SendRequest) {
        self.requests.lock().push_back(request);
    }

    /// Remove and return the oldest request whose estimate fits in
    /// `max_frame_length` bytes.
    pub fn next(&self, max_frame_length: usize) -> Option<SendRequest> {
        if max_frame_length < 1 {
            return None;
        }
        let mut requests = self.requests.lock();
        let index = requests
            .iter()
            .position(|r| r.estimated_size <= max_frame_length)?;
        requests.remove(index)
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }

    /// Drop every pending request.
    pub fn clear(&self) {
        self.requests.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::CryptoFrame;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::thread;

    /// CRYPTO frame at offset 0 with an encoded length of exactly `len`.
    fn crypto_of_len(len: usize) -> Frame {
        // type (1) + offset (1) + length (1) + data
        assert!(len >= 3 && len - 3 < 64);
        Frame::Crypto(CryptoFrame {
            offset: 0,
            data: Bytes::from(vec![0xab; len - 3]),
        })
    }

    #[test]
    fn test_first_fit_by_arrival_order() {
        let queue = SendRequestQueue::new();
        queue.add_frame(crypto_of_len(50));
        queue.add_frame(crypto_of_len(10));
        queue.add_frame(crypto_of_len(30));

        let request = queue.next(20).unwrap();
        assert_eq!(request.estimated_size(), 10);
        assert_eq!(request.produce(20).unwrap(), crypto_of_len(10));

        assert!(queue.next(5).is_none());
        assert_eq!(queue.len(), 2);

        // The 50 stays at the head; the 30 is the first fit for 40.
        assert_eq!(queue.next(40).unwrap().estimated_size(), 30);
        assert_eq!(queue.next(1200).unwrap().estimated_size(), 50);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_first_fit_not_best_fit() {
        let queue = SendRequestQueue::new();
        queue.add_frame(crypto_of_len(30));
        queue.add_frame(crypto_of_len(10));
        // Both fit in 40; the older one wins even though it is larger.
        assert_eq!(queue.next(40).unwrap().estimated_size(), 30);
    }

    #[test]
    fn test_zero_budget() {
        let queue = SendRequestQueue::new();
        queue.add_frame(Frame::Ping);
        assert!(queue.next(0).is_none());
        assert_eq!(queue.len(), 1);
        assert!(queue.next(1).is_some());
    }

    #[test]
    fn test_deferred_request_sees_budget() {
        let queue = SendRequestQueue::new();
        queue.add_request(100, |budget| Frame::Padding(budget.min(100)));
        let request = queue.next(150).unwrap();
        assert_eq!(request.produce(60).unwrap(), Frame::Padding(60));
    }

    #[test]
    fn test_oversized_production_rejected() {
        let queue = SendRequestQueue::new();
        // Lies about its size.
        queue.add_request(10, |_| Frame::Padding(25));
        let request = queue.next(10).unwrap();
        assert!(matches!(
            request.produce(10),
            Err(Error::FrameExceedsBudget {
                produced: 25,
                budget: 10
            })
        ));
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(SendRequestQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for _ in 0..250 {
                        queue.add_frame(Frame::Ping);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut drained = 0;
        while queue.next(1).is_some() {
            drained += 1;
        }
        assert_eq!(drained, 1000);
    }

    #[test]
    fn test_clear() {
        let queue = SendRequestQueue::new();
        queue.add_frame(Frame::Ping);
        queue.add_frame(Frame::HandshakeDone);
        queue.clear();
        assert!(queue.is_empty());
    }
}
