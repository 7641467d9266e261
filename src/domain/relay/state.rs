//! Per-conversation streaming state.
//!
//! One producer appends to the buffer and eventually finishes it; any number
//! of pollers read snapshots. At most one poller may park on the
//! notification channel at a time.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{ConversationId, RelayError};

/// Point-in-time view of a conversation for a poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content: String,
    pub is_visited: bool,
    pub is_done: bool,
}

/// How an [`ConversationState::attach_and_wait`] call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A chunk was appended while attached.
    Chunk(String),
    /// The producer finished (or had already finished).
    Closed,
    /// Nothing happened before the timeout.
    TimedOut,
}

struct Inner {
    buffer: String,
    is_visited: bool,
    is_done: bool,
    poll_count: u32,
    sender: Option<mpsc::UnboundedSender<String>>,
    receiver: Option<mpsc::UnboundedReceiver<String>>,
}

/// Streaming state of one conversation, guarded by its own mutex.
pub struct ConversationState {
    id: ConversationId,
    question: String,
    created_at: Instant,
    inner: Mutex<Inner>,
}

impl ConversationState {
    pub(super) fn new(id: ConversationId, question: String) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            id,
            question,
            created_at: Instant::now(),
            inner: Mutex::new(Inner {
                buffer: String::new(),
                is_visited: false,
                is_done: false,
                poll_count: 0,
                sender: Some(sender),
                receiver: Some(receiver),
            }),
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// Time since the conversation was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Appends a chunk, nudging the attached poller if there is one.
    ///
    /// Ignored once the conversation is done, so the buffer only ever grows
    /// while the producer is live.
    pub fn append_chunk(&self, chunk: &str) {
        let mut inner = self.lock();
        if inner.is_done {
            return;
        }
        inner.buffer.push_str(chunk);
        if inner.is_visited {
            if let Some(sender) = &inner.sender {
                // Best effort; the poller re-reads the buffer anyway.
                let _ = sender.send(chunk.to_string());
            }
        }
    }

    /// Marks the conversation done and closes the notification channel.
    ///
    /// Safe to call more than once.
    pub fn finish(&self) {
        let mut inner = self.lock();
        inner.is_done = true;
        inner.sender.take();
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            content: inner.buffer.clone(),
            is_visited: inner.is_visited,
            is_done: inner.is_done,
        }
    }

    pub fn is_done(&self) -> bool {
        self.lock().is_done
    }

    /// Counts a poll and returns the running total, including this one.
    pub fn record_poll(&self) -> u32 {
        let mut inner = self.lock();
        inner.poll_count += 1;
        inner.poll_count
    }

    /// Parks until a chunk arrives, the producer finishes, or `timeout`
    /// elapses.
    ///
    /// `is_visited` is set for the duration of the wait and cleared on every
    /// exit path, including cancellation of the returned future.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::PollerAlreadyAttached` if another poller is
    /// already waiting on this conversation.
    pub async fn attach_and_wait(&self, timeout: Duration) -> Result<WaitOutcome, RelayError> {
        let receiver = {
            let mut inner = self.lock();
            if inner.is_done {
                return Ok(WaitOutcome::Closed);
            }
            if inner.is_visited {
                return Err(RelayError::PollerAlreadyAttached(self.id));
            }
            let mut receiver = inner
                .receiver
                .take()
                .ok_or(RelayError::PollerAlreadyAttached(self.id))?;
            // Nudges left over from an earlier attachment are already in the buffer.
            while receiver.try_recv().is_ok() {}
            inner.is_visited = true;
            receiver
        };

        let mut attachment = Attachment {
            state: self,
            receiver: Some(receiver),
        };
        let Some(receiver) = attachment.receiver.as_mut() else {
            return Ok(WaitOutcome::Closed);
        };

        let outcome = match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(chunk)) => WaitOutcome::Chunk(chunk),
            Ok(None) => WaitOutcome::Closed,
            Err(_) => WaitOutcome::TimedOut,
        };
        Ok(outcome)
    }

    /// Waits until the producer finishes or `deadline` passes, and returns
    /// the final snapshot.
    pub async fn wait_until_done(&self, deadline: Instant) -> Result<Snapshot, RelayError> {
        loop {
            let now = Instant::now();
            if self.is_done() || now >= deadline {
                return Ok(self.snapshot());
            }
            if self.attach_and_wait(deadline - now).await? == WaitOutcome::TimedOut {
                return Ok(self.snapshot());
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the buffer half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationState")
            .field("id", &self.id)
            .field("question", &self.question)
            .finish_non_exhaustive()
    }
}

/// Clears `is_visited` and hands the receiver back when a wait ends.
struct Attachment<'a> {
    state: &'a ConversationState,
    receiver: Option<mpsc::UnboundedReceiver<String>>,
}

impl Drop for Attachment<'_> {
    fn drop(&mut self) {
        let mut inner = self.state.lock();
        inner.is_visited = false;
        if let Some(receiver) = self.receiver.take() {
            inner.receiver = Some(receiver);
        }
    }
}
