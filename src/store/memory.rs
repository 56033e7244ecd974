//! In-memory backend: ordered maps of serialized records behind one lock.
//!
//! Records are kept in their JSON form and decoded on read, so this backend
//! exercises the same round-trip as the libSQL one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{decode, encode};
use crate::error::DatabaseError;
use crate::model::{Approval, Message};
use crate::store::traits::Store;

#[derive(Default)]
struct Tables {
    messages: BTreeMap<String, String>,
    approvals: BTreeMap<String, String>,
    rejected: BTreeMap<String, String>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode_all<T: serde::de::DeserializeOwned>(
    entity: &str,
    map: &BTreeMap<String, String>,
) -> Result<Vec<T>, DatabaseError> {
    map.values().map(|raw| decode(entity, raw)).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn store_approval(&self, approval: &Approval) -> Result<(), DatabaseError> {
        let data = encode("approval", approval)?;
        let mut tables = self.tables.write().await;
        if tables.approvals.contains_key(&approval.id) {
            return Err(DatabaseError::duplicate("approval", &approval.id));
        }
        tables.approvals.insert(approval.id.clone(), data);
        Ok(())
    }

    async fn get_approval(&self, id: &str) -> Result<Approval, DatabaseError> {
        let tables = self.tables.read().await;
        let raw = tables
            .approvals
            .get(id)
            .ok_or_else(|| DatabaseError::not_found("approval", id))?;
        decode("approval", raw)
    }

    async fn get_all_approvals(&self) -> Result<Vec<Approval>, DatabaseError> {
        let tables = self.tables.read().await;
        decode_all("approval", &tables.approvals)
    }

    async fn delete_approval(&self, id: &str) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables
            .approvals
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::not_found("approval", id))
    }

    async fn store_reject(&self, message: &Message) -> Result<(), DatabaseError> {
        let data = encode("rejected message", message)?;
        let mut tables = self.tables.write().await;
        tables.rejected.insert(message.id.clone(), data);
        Ok(())
    }

    async fn get_all_rejected(&self) -> Result<Vec<Message>, DatabaseError> {
        let tables = self.tables.read().await;
        decode_all("rejected message", &tables.rejected)
    }

    async fn store_message(&self, message: &Message) -> Result<(), DatabaseError> {
        let data = encode("message", message)?;
        let mut tables = self.tables.write().await;
        if tables.messages.contains_key(&message.id) {
            return Err(DatabaseError::duplicate("message", &message.id));
        }
        tables.messages.insert(message.id.clone(), data);
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Message, DatabaseError> {
        let tables = self.tables.read().await;
        let raw = tables
            .messages
            .get(id)
            .ok_or_else(|| DatabaseError::not_found("message", id))?;
        decode("message", raw)
    }

    async fn update_message(&self, message: &Message) -> Result<(), DatabaseError> {
        let data = encode("message", message)?;
        let mut tables = self.tables.write().await;
        match tables.messages.get_mut(&message.id) {
            Some(slot) => {
                *slot = data;
                Ok(())
            }
            None => Err(DatabaseError::not_found("message", &message.id)),
        }
    }

    async fn get_all_messages(&self) -> Result<Vec<Message>, DatabaseError> {
        let tables = self.tables.read().await;
        decode_all("message", &tables.messages)
    }

    async fn resolve_approval(
        &self,
        approval_id: &str,
        message: &Message,
        record_reject: bool,
    ) -> Result<(), DatabaseError> {
        let data = encode("message", message)?;
        let mut tables = self.tables.write().await;

        // Check everything before mutating anything.
        if !tables.approvals.contains_key(approval_id) {
            return Err(DatabaseError::not_found("approval", approval_id));
        }
        if !tables.messages.contains_key(&message.id) {
            return Err(DatabaseError::not_found("message", &message.id));
        }

        tables.approvals.remove(approval_id);
        if record_reject {
            tables.rejected.insert(message.id.clone(), data.clone());
        }
        tables.messages.insert(message.id.clone(), data);

        debug!(approval_id = approval_id, message_id = %message.id, "Approval resolved");
        Ok(())
    }
}
