//! Storage port: backend-agnostic persistence for messages and approvals.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::model::{Approval, Message};

/// Persistence contract consumed by the validation engine and reconciler.
///
/// Inserts fail with [`DatabaseError::Duplicate`] when the id is taken;
/// updates, deletes and lookups fail with [`DatabaseError::NotFound`] when it
/// is absent. Every single-record operation is atomic per key.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Approvals ───────────────────────────────────────────────────

    /// Insert a new approval.
    async fn store_approval(&self, approval: &Approval) -> Result<(), DatabaseError>;

    /// Get an approval by id.
    async fn get_approval(&self, id: &str) -> Result<Approval, DatabaseError>;

    /// All outstanding approvals, in backend order.
    async fn get_all_approvals(&self) -> Result<Vec<Approval>, DatabaseError>;

    /// Delete an approval.
    async fn delete_approval(&self, id: &str) -> Result<(), DatabaseError>;

    // ── Rejections ──────────────────────────────────────────────────

    /// Record a rejected message, replacing any earlier record for the same id.
    async fn store_reject(&self, message: &Message) -> Result<(), DatabaseError>;

    /// All rejection records.
    async fn get_all_rejected(&self) -> Result<Vec<Message>, DatabaseError>;

    // ── Messages ────────────────────────────────────────────────────

    /// Insert a new message.
    async fn store_message(&self, message: &Message) -> Result<(), DatabaseError>;

    /// Get a message by id.
    async fn get_message(&self, id: &str) -> Result<Message, DatabaseError>;

    /// Replace an existing message.
    async fn update_message(&self, message: &Message) -> Result<(), DatabaseError>;

    /// All messages, in backend order.
    async fn get_all_messages(&self) -> Result<Vec<Message>, DatabaseError>;

    // ── Compound ────────────────────────────────────────────────────

    /// Consume an approval and fold its outcome into the owning message as
    /// one unit: delete the approval, replace the message, and when
    /// `record_reject` is set also upsert the message as a rejection record.
    ///
    /// Fails with `NotFound` and writes nothing if the approval is already
    /// gone, so at most one of several concurrent resolutions succeeds.
    async fn resolve_approval(
        &self,
        approval_id: &str,
        message: &Message,
        record_reject: bool,
    ) -> Result<(), DatabaseError>;
}
