//! Mock answer generator for testing.
//!
//! Scripts are consumed in order; once exhausted every request is answered
//! with an empty, immediately finished stream.
//!
//! # Example
//!
//! ```ignore
//! let generator = MockAnswerGenerator::new()
//!     .with_answer(&["Hi", " there"])
//!     .with_delay(Duration::from_millis(10));
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::ports::{AnswerEvent, AnswerGenerator, AnswerRequest, GenerationError};

/// One scripted reaction to a `generate` call.
#[derive(Debug, Clone)]
pub enum MockScript {
    /// Emit these events, then close the stream.
    Events(Vec<AnswerEvent>),
    /// Refuse the request outright.
    Fail(GenerationError),
    /// Emit these events, then keep the stream open until the consumer leaves.
    Stall(Vec<AnswerEvent>),
}

#[derive(Debug, Clone, Default)]
pub struct MockAnswerGenerator {
    scripts: Arc<Mutex<VecDeque<MockScript>>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<AnswerRequest>>>,
}

impl MockAnswerGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams each chunk as a data event, then `done`.
    pub fn with_answer(self, chunks: &[&str]) -> Self {
        let mut events: Vec<AnswerEvent> = chunks.iter().map(|c| AnswerEvent::data(*c)).collect();
        events.push(AnswerEvent::done());
        self.with_script(MockScript::Events(events))
    }

    pub fn with_failure(self, error: GenerationError) -> Self {
        self.with_script(MockScript::Fail(error))
    }

    /// Streams the chunks and never finishes.
    pub fn with_stall(self, chunks: &[&str]) -> Self {
        let events = chunks.iter().map(|c| AnswerEvent::data(*c)).collect();
        self.with_script(MockScript::Stall(events))
    }

    pub fn with_script(self, script: MockScript) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    /// Pause before every emitted event.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<AnswerRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn next_script(&self) -> MockScript {
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockScript::Events(vec![AnswerEvent::done()]))
    }
}

#[async_trait]
impl AnswerGenerator for MockAnswerGenerator {
    async fn generate(
        &self,
        request: AnswerRequest,
    ) -> Result<mpsc::Receiver<AnswerEvent>, GenerationError> {
        self.calls.lock().unwrap().push(request);

        let (events, stall) = match self.next_script() {
            MockScript::Fail(error) => return Err(error),
            MockScript::Events(events) => (events, false),
            MockScript::Stall(events) => (events, true),
        };

        let delay = self.delay;
        let (tx, rx) = mpsc::channel(events.len().max(1));
        tokio::spawn(async move {
            for event in events {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if stall {
                tx.closed().await;
            }
        });

        Ok(rx)
    }
}
