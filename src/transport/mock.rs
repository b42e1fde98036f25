//! # Scripted Transport
//!
//! An in-memory [`Transport`] that records every `send` as one frame, plays
//! back queued or rule-triggered replies, and can be told to fail.
//!
//! The transport itself is moved into the job under test; keep a
//! [`MockProbe`] to inspect what happened afterwards.
//!
//! ```
//! use ptlabel::transport::{MockTransport, Transport};
//! use std::time::Duration;
//!
//! let mut mock = MockTransport::new().respond_to(b"ping", b"pong".to_vec());
//! let probe = mock.probe();
//!
//! mock.send(b"ping").unwrap();
//! assert_eq!(mock.receive(32, Duration::ZERO).unwrap(), Some(b"pong".to_vec()));
//! mock.close().unwrap();
//!
//! assert_eq!(probe.frames(), vec![b"ping".to_vec()]);
//! assert_eq!(probe.close_calls(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::Transport;
use crate::error::TransportError;

/// Message used for injected write failures
pub const SIMULATED_FAILURE: &str = "simulated write failure";

type FailRule = Box<dyn FnMut(&[Vec<u8>], &[u8]) -> bool + Send>;

#[derive(Debug, Default)]
struct MockState {
    frames: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
    close_calls: usize,
    closed: bool,
}

/// Scripted transport for tests.
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    rules: Vec<(Vec<u8>, Vec<u8>)>,
    fail: Option<FailRule>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            rules: Vec::new(),
            fail: None,
        }
    }

    /// Queue a reply for the next `receive`.
    pub fn with_reply(self, reply: Vec<u8>) -> Self {
        lock(&self.state).replies.push_back(reply);
        self
    }

    /// Queue `reply` every time a frame equal to `request` is sent.
    pub fn respond_to(mut self, request: &[u8], reply: Vec<u8>) -> Self {
        self.rules.push((request.to_vec(), reply));
        self
    }

    /// Fail a send when `rule(frames_so_far, next_frame)` returns true.
    pub fn fail_when<F>(mut self, rule: F) -> Self
    where
        F: FnMut(&[Vec<u8>], &[u8]) -> bool + Send + 'static,
    {
        self.fail = Some(Box::new(rule));
        self
    }

    /// Handle for inspecting the transport after it has been moved.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        if let Some(rule) = self.fail.as_mut() {
            if rule(&state.frames, data) {
                return Err(TransportError::Send(SIMULATED_FAILURE.to_string()));
            }
        }
        state.frames.push(data.to_vec());
        for (request, reply) in &self.rules {
            if request.as_slice() == data {
                state.replies.push_back(reply.clone());
            }
        }
        Ok(())
    }

    fn receive(
        &mut self,
        max_len: usize,
        _timeout: Duration,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        let Some(mut reply) = state.replies.pop_front() else {
            return Ok(None);
        };
        // Unread bytes stay queued for the next receive, like a byte stream.
        if reply.len() > max_len {
            let rest = reply.split_off(max_len);
            state.replies.push_front(rest);
        }
        Ok(Some(reply))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        state.close_calls += 1;
        state.closed = true;
        Ok(())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Read-only view of a [`MockTransport`]'s history.
#[derive(Clone)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockProbe {
    /// Every successfully sent frame, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        lock(&self.state).frames.clone()
    }

    /// All sent bytes concatenated.
    pub fn sent_bytes(&self) -> Vec<u8> {
        lock(&self.state).frames.concat()
    }

    /// How many times `close` was called.
    pub fn close_calls(&self) -> usize {
        lock(&self.state).close_calls
    }

    /// Number of sent frames matching `predicate`.
    pub fn count_frames(&self, predicate: impl Fn(&[u8]) -> bool) -> usize {
        lock(&self.state)
            .frames
            .iter()
            .filter(|f| predicate(f))
            .count()
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_replies_in_order() {
        let mut mock = MockTransport::new()
            .with_reply(vec![1])
            .with_reply(vec![2, 3, 4]);
        assert_eq!(mock.receive(8, Duration::ZERO).unwrap(), Some(vec![1]));
        assert_eq!(mock.receive(2, Duration::ZERO).unwrap(), Some(vec![2, 3]));
        assert_eq!(mock.receive(8, Duration::ZERO).unwrap(), Some(vec![4]));
        assert_eq!(mock.receive(8, Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn test_partial_reads_keep_remainder_queued() {
        let mut mock = MockTransport::new()
            .with_reply((0..10).collect())
            .with_reply(vec![99]);
        assert_eq!(mock.receive(4, Duration::ZERO).unwrap(), Some(vec![0, 1, 2, 3]));
        assert_eq!(mock.receive(4, Duration::ZERO).unwrap(), Some(vec![4, 5, 6, 7]));
        assert_eq!(mock.receive(4, Duration::ZERO).unwrap(), Some(vec![8, 9]));
        assert_eq!(mock.receive(4, Duration::ZERO).unwrap(), Some(vec![99]));
        assert_eq!(mock.receive(4, Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn test_fail_rule() {
        let mut mock = MockTransport::new().fail_when(|frames, _| frames.len() == 2);
        let probe = mock.probe();
        mock.send(b"a").unwrap();
        mock.send(b"b").unwrap();
        let err = mock.send(b"c").unwrap_err();
        assert_eq!(err.to_string(), "Write failed: simulated write failure");
        assert_eq!(probe.frames().len(), 2);
    }

    #[test]
    fn test_closed_transport_rejects_io() {
        let mut mock = MockTransport::new();
        mock.close().unwrap();
        mock.close().unwrap();
        assert!(matches!(mock.send(b"x"), Err(TransportError::Closed)));
        assert_eq!(mock.probe().close_calls(), 2);
    }
}
