//! Approval reconciler: applies reviewer decisions to pending actions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::engine::ValidationEngine;
use crate::error::Result;
use crate::model::{ActionStatus, Message, MessageStatus};
use crate::store::Store;

pub const REASON_REVIEWER_REJECTED: &str = "image rejected by reviewer";

pub struct ApprovalReconciler {
    store: Arc<dyn Store>,
    // One lock per message id: sibling decisions on a message are serialized,
    // decisions on different messages are not.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ApprovalReconciler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Approve one pending action. The message becomes `validated` once
    /// every action on it is approved.
    pub async fn approve(&self, approval_id: &str) -> Result<Message> {
        let message = self.decide(approval_id, ActionStatus::Approved).await?;
        info!(
            approval_id = approval_id,
            message_id = %message.id,
            status = ?message.status,
            "Approval granted"
        );
        Ok(message)
    }

    /// Reject one pending action. Sibling actions are left as they are;
    /// the message is rejected and recorded in the rejection log.
    pub async fn reject(&self, approval_id: &str) -> Result<Message> {
        let message = self.decide(approval_id, ActionStatus::Rejected).await?;
        info!(
            approval_id = approval_id,
            message_id = %message.id,
            "Approval rejected"
        );
        Ok(message)
    }

    async fn decide(&self, approval_id: &str, decision: ActionStatus) -> Result<Message> {
        let approval = self.store.get_approval(approval_id).await?;
        let _guard = self.lock_message(&approval.message_id).await;
        let mut message = self.store.get_message(&approval.message_id).await?;

        // An approval whose action is gone from the message (lost by an
        // older reject, or by a scan that failed before its final update)
        // is consumed and the message left as stored.
        let Some(action) = message.action_mut(approval_id) else {
            warn!(
                approval_id = approval_id,
                message_id = %message.id,
                "Approval has no matching action; discarding it"
            );
            self.store
                .resolve_approval(approval_id, &message, false)
                .await?;
            return Ok(message);
        };

        action.status = decision;
        let rejected = decision == ActionStatus::Rejected;
        if rejected {
            message.status = Some(MessageStatus::Rejected);
            message.reason = Some(REASON_REVIEWER_REJECTED.to_string());
        } else {
            ValidationEngine::settle(&mut message);
        }

        self.store
            .resolve_approval(approval_id, &message, rejected)
            .await?;
        Ok(message)
    }

    async fn lock_message(&self, message_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries only referenced by the map are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(message_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::tests::{FakeClassifier, engine_with};
    use crate::error::Error;
    use crate::model::{Action, Approval, SubmitMessage};
    use crate::probe::LinkClass;
    use crate::store::MemoryStore;

    const TWO_IMAGES: &str =
        "# Gallery\n![a](https://img.example/a.png)\n![b](https://img.example/b.png)";

    async fn awaiting(store: Arc<MemoryStore>, body: &str) -> Message {
        let engine = engine_with(
            store,
            FakeClassifier::new(&[
                ("https://img.example/a.png", LinkClass::Image),
                ("https://img.example/b.png", LinkClass::Image),
            ]),
        );
        engine
            .submit(SubmitMessage {
                id: "m1".into(),
                body: body.into(),
            })
            .await
            .unwrap()
            .message
    }

    #[tokio::test]
    async fn approving_only_action_validates() {
        let store = Arc::new(MemoryStore::new());
        let msg = awaiting(store.clone(), "# Pic\n![a](https://img.example/a.png)").await;
        let reconciler = ApprovalReconciler::new(store.clone());

        let updated = reconciler.approve(&msg.actions[0].id).await.unwrap();

        assert_eq!(updated.status, Some(MessageStatus::Validated));
        assert_eq!(updated.actions[0].status, ActionStatus::Approved);
        assert_eq!(store.get_message("m1").await.unwrap(), updated);
        assert!(store.get_all_approvals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_approval_keeps_waiting() {
        let store = Arc::new(MemoryStore::new());
        let msg = awaiting(store.clone(), TWO_IMAGES).await;
        let reconciler = ApprovalReconciler::new(store.clone());

        let updated = reconciler.approve(&msg.actions[0].id).await.unwrap();
        assert_eq!(updated.status, Some(MessageStatus::AwaitingApproval));
        assert_eq!(store.get_all_approvals().await.unwrap().len(), 1);

        let updated = reconciler.approve(&msg.actions[1].id).await.unwrap();
        assert_eq!(updated.status, Some(MessageStatus::Validated));
    }

    #[tokio::test]
    async fn reject_keeps_siblings() {
        let store = Arc::new(MemoryStore::new());
        let msg = awaiting(store.clone(), TWO_IMAGES).await;
        let reconciler = ApprovalReconciler::new(store.clone());

        let updated = reconciler.reject(&msg.actions[0].id).await.unwrap();

        assert_eq!(updated.status, Some(MessageStatus::Rejected));
        assert_eq!(updated.reason.as_deref(), Some(REASON_REVIEWER_REJECTED));
        assert_eq!(updated.actions.len(), 2);
        assert_eq!(updated.actions[0].status, ActionStatus::Rejected);
        assert_eq!(updated.actions[1].status, ActionStatus::Pending);

        assert!(store.get_approval(&msg.actions[0].id).await.is_err());
        let rejected = store.get_all_rejected().await.unwrap();
        assert_eq!(rejected, vec![updated.clone()]);
        // The sibling is still reviewable but can no longer validate the message.
        let after = reconciler.approve(&msg.actions[1].id).await.unwrap();
        assert_eq!(after.status, Some(MessageStatus::Rejected));
    }

    #[tokio::test]
    async fn unknown_approval_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = ApprovalReconciler::new(store);

        let err = reconciler.approve("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        let err = reconciler.reject("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn racing_decisions_resolve_once() {
        let store = Arc::new(MemoryStore::new());
        let msg = awaiting(store.clone(), "# Pic\n![a](https://img.example/a.png)").await;
        let reconciler = Arc::new(ApprovalReconciler::new(store.clone()));
        let id = msg.actions[0].id.clone();

        let (a, b) = tokio::join!(reconciler.approve(&id), reconciler.reject(&id));

        assert!(a.is_ok() ^ b.is_ok());
        let stored = store.get_message("m1").await.unwrap();
        if a.is_ok() {
            assert_eq!(stored.status, Some(MessageStatus::Validated));
            assert!(store.get_all_rejected().await.unwrap().is_empty());
        } else {
            assert_eq!(stored.status, Some(MessageStatus::Rejected));
        }
    }

    #[tokio::test]
    async fn concurrent_sibling_approvals_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let msg = awaiting(store.clone(), TWO_IMAGES).await;
        let reconciler = Arc::new(ApprovalReconciler::new(store.clone()));

        let (a, b) = tokio::join!(
            reconciler.approve(&msg.actions[0].id),
            reconciler.approve(&msg.actions[1].id)
        );
        a.unwrap();
        b.unwrap();

        let stored = store.get_message("m1").await.unwrap();
        assert!(stored.all_actions_approved());
        assert_eq!(stored.status, Some(MessageStatus::Validated));
    }

    #[tokio::test]
    async fn approval_without_matching_action_is_consumed() {
        let store = Arc::new(MemoryStore::new());
        let mut kept = Action::image_review("https://img.example/a.png");
        kept.status = ActionStatus::Rejected;
        let mut msg = Message::new("m1", "# Pic\nbody");
        msg.status = Some(MessageStatus::Rejected);
        msg.actions.push(kept);
        store.store_message(&msg).await.unwrap();

        let dropped = Approval::for_action(&Action::image_review("https://img.example/b.png"), "m1");
        let other = Approval::for_action(&Action::image_review("https://img.example/c.png"), "m1");
        store.store_approval(&dropped).await.unwrap();
        store.store_approval(&other).await.unwrap();

        let reconciler = ApprovalReconciler::new(store.clone());
        assert_eq!(reconciler.approve(&dropped.id).await.unwrap(), msg);
        assert_eq!(reconciler.reject(&other.id).await.unwrap(), msg);

        assert!(store.get_all_approvals().await.unwrap().is_empty());
        assert!(store.get_all_rejected().await.unwrap().is_empty());
        assert_eq!(store.get_message("m1").await.unwrap(), msg);
    }

    #[tokio::test]
    async fn busy_message_does_not_block_others() {
        let store = Arc::new(MemoryStore::new());
        let msg = awaiting(store.clone(), "# Pic\n![a](https://img.example/a.png)").await;
        let reconciler = ApprovalReconciler::new(store.clone());

        let _held = reconciler.lock_message("some-other-message").await;
        let updated = tokio::time::timeout(
            Duration::from_secs(1),
            reconciler.approve(&msg.actions[0].id),
        )
        .await
        .expect("decision on m1 waited on an unrelated message")
        .unwrap();
        assert_eq!(updated.status, Some(MessageStatus::Validated));
    }
}
