//! Running transformations off the calling thread.
//!
//! Converters block until their external tool exits. [`TransformTask`] moves
//! that wait onto a worker provided by a [`TaskSubmitter`] and delivers the
//! result over a channel.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::collab::TaskSubmitter;
use crate::error::TransformerResult;
use crate::registry::TransformerRef;
use crate::transformer::{Operation, Outcome};

/// State of a task polled with [`TransformTask::try_result`].
#[derive(Debug)]
pub enum TaskPoll {
    /// Still running.
    Pending,
    /// Finished with this result.
    Ready(TransformerResult<Outcome>),
    /// The worker went away without sending a result.
    Lost,
}

/// Handle to a transformation running on a worker.
#[derive(Debug)]
pub struct TransformTask {
    transformer_id: String,
    result: Receiver<TransformerResult<Outcome>>,
}

impl TransformTask {
    /// Runs `operation` on `transformer` through `submitter`.
    pub fn submit(
        submitter: &dyn TaskSubmitter,
        transformer: TransformerRef,
        operation: Operation,
    ) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let transformer_id = transformer.id().to_string();
        tracing::debug!(id = %transformer_id, operation = operation.kind(), "submitting transform");

        submitter.submit(Box::new(move || {
            let result = transformer.transform(operation);
            // The receiver may have been dropped; nobody wants the result then.
            let _ = tx.send(result);
        }))?;

        Ok(Self {
            transformer_id,
            result: rx,
        })
    }

    /// Id of the transformer doing the work.
    pub fn transformer_id(&self) -> &str {
        &self.transformer_id
    }

    /// Blocks until the result arrives. `None` if the worker died first.
    pub fn wait(self) -> Option<TransformerResult<Outcome>> {
        self.result.recv().ok()
    }

    /// Blocks for at most `timeout`. Gives the task back if it has not
    /// finished yet.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Option<TransformerResult<Outcome>>, Self> {
        match self.result.recv_timeout(timeout) {
            Ok(result) => Ok(Some(result)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }

    /// Checks for a result without blocking.
    pub fn try_result(&self) -> TaskPoll {
        match self.result.try_recv() {
            Ok(result) => TaskPoll::Ready(result),
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => TaskPoll::Lost,
        }
    }
}
