//! Nullable messaging — record messages without sending them.

use crate::{locked, FailureQueue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use veriflow_session::{CollaboratorError, MessagingChannel};
use veriflow_types::{ChatMessage, MessageId, RequestId, Sender, Timestamp};

const INBOX_CAPACITY: usize = 32;

/// A chat channel that records outgoing messages and lets tests play the
/// attester's side.
#[derive(Default)]
pub struct NullMessaging {
    /// All messages "sent" by the subject.
    sent: Mutex<Vec<(RequestId, ChatMessage)>>,
    /// Where attester replies for each request are delivered.
    inboxes: Mutex<HashMap<RequestId, mpsc::Sender<ChatMessage>>>,
    delivered: Mutex<usize>,
    failures: FailureQueue,
}

impl NullMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send or subscribe fail with `error`.
    pub fn fail_next(&self, error: CollaboratorError) {
        self.failures.push(error);
    }

    /// Deliver an attester reply. Returns `false` if nobody subscribed to
    /// this request or the inbox is full.
    pub fn deliver(&self, request: &RequestId, text: impl Into<String>) -> bool {
        let inboxes = locked(&self.inboxes);
        let Some(tx) = inboxes.get(request) else {
            return false;
        };
        let mut delivered = locked(&self.delivered);
        *delivered += 1;
        let message = ChatMessage {
            id: MessageId::new(format!("incoming-{}", *delivered)),
            sender: Sender::Attester,
            text: text.into(),
            sent_at: Timestamp::EPOCH,
        };
        tx.try_send(message).is_ok()
    }

    /// Get all sent messages (for assertions).
    pub fn sent(&self) -> Vec<(RequestId, ChatMessage)> {
        locked(&self.sent).clone()
    }
}

#[async_trait]
impl MessagingChannel for NullMessaging {
    async fn send_message(
        &self,
        request: &RequestId,
        message: &ChatMessage,
    ) -> Result<(), CollaboratorError> {
        self.failures.next()?;
        locked(&self.sent).push((request.clone(), message.clone()));
        Ok(())
    }

    async fn subscribe(
        &self,
        request: &RequestId,
    ) -> Result<mpsc::Receiver<ChatMessage>, CollaboratorError> {
        self.failures.next()?;
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        locked(&self.inboxes).insert(request.clone(), tx);
        Ok(rx)
    }
}
