use crate::{
    models::TransferIntent,
    services::{
        query_responder::{QueryError, QueryResponder},
        transfer_executor::{TransferError, TransferExecutor, TransferReceipt},
    },
};
use std::sync::Mutex;

/// Executor double that records every intent it is asked to run.
pub struct FakeExecutor {
    outcome: Result<TransferReceipt, TransferError>,
    pub calls: Mutex<Vec<TransferIntent>>,
}

impl FakeExecutor {
    pub fn succeeding(tx_hash: &str) -> Self {
        Self::with_outcome(Ok(TransferReceipt {
            tx_hash: tx_hash.to_string(),
        }))
    }

    pub fn with_outcome(outcome: Result<TransferReceipt, TransferError>) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TransferExecutor for FakeExecutor {
    async fn execute(&self, intent: &TransferIntent) -> Result<TransferReceipt, TransferError> {
        self.calls.lock().unwrap().push(intent.clone());
        self.outcome.clone()
    }
}

/// Responder double that replies with a fixed outcome and records prompts.
pub struct FakeResponder {
    outcome: Result<String, QueryError>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeResponder {
    pub fn replying(reply: &str) -> Self {
        Self::with_outcome(Ok(reply.to_string()))
    }

    pub fn with_outcome(outcome: Result<String, QueryError>) -> Self {
        Self {
            outcome,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl QueryResponder for FakeResponder {
    async fn ask(&self, input: &str) -> Result<String, QueryError> {
        self.prompts.lock().unwrap().push(input.to_string());
        self.outcome.clone()
    }
}
