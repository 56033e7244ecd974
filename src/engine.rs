//! Validation engine: drives a message through scanning to its outcome.
//!
//! Every observable transition is persisted as it happens:
//! 1. A new message is checkpointed as `pending` before any scanning.
//! 2. Banned words or a non-image external link write a rejection record.
//! 3. Each image link stores a pending approval.
//! 4. The final state replaces the `pending` checkpoint.
//!
//! Partial progress is never rolled back on a later failure.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{DatabaseError, Error, Result};
use crate::model::{Action, Approval, Message, MessageStatus, SubmitMessage};
use crate::oracle::BannedTermOracle;
use crate::probe::{LinkClass, LinkClassifier};
use crate::scanner::{self, Link};
use crate::store::Store;

pub const REASON_EXTERNAL_LINKS: &str = "contains external links";
pub const REASON_AWAITING_APPROVAL: &str = "contains image that require approval";

/// What a validation pass found. Both flags echo writes already committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    pub rejected: bool,
    pub approval_required: bool,
}

/// Caller-facing summary of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored,
    Rejected { reason: String },
    AwaitingApproval,
}

/// A validated submission and the verdict that produced its state.
#[derive(Debug, Clone)]
pub struct Submission {
    pub message: Message,
    pub verdict: Verdict,
}

impl Submission {
    /// Approval-required wins over rejection.
    pub fn outcome(&self) -> Outcome {
        if self.verdict.approval_required {
            Outcome::AwaitingApproval
        } else if self.verdict.rejected {
            Outcome::Rejected {
                reason: self.message.reason.clone().unwrap_or_default(),
            }
        } else {
            Outcome::Stored
        }
    }
}

/// Orchestrates scanner, oracle, link classifier and storage.
pub struct ValidationEngine {
    store: Arc<dyn Store>,
    oracle: Arc<dyn BannedTermOracle>,
    classifier: Arc<dyn LinkClassifier>,
}

impl ValidationEngine {
    pub fn new(
        store: Arc<dyn Store>,
        oracle: Arc<dyn BannedTermOracle>,
        classifier: Arc<dyn LinkClassifier>,
    ) -> Self {
        Self {
            store,
            oracle,
            classifier,
        }
    }

    /// Validate a freshly submitted message.
    ///
    /// Structural problems fail before anything is persisted; an id that is
    /// already stored fails with [`Error::DuplicateId`].
    pub async fn submit(&self, submit: SubmitMessage) -> Result<Submission> {
        if submit.id.trim().is_empty() {
            return Err(Error::MalformedContent("message id is required".into()));
        }
        let lines = scanner::parse_body(&submit.body)?;

        match self.store.get_message(&submit.id).await {
            Ok(_) => return Err(Error::DuplicateId(submit.id)),
            Err(DatabaseError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let mut message = Message::from(submit);
        let verdict = self.validate(&mut message, &lines).await?;
        let submission = Submission { message, verdict };

        match submission.outcome() {
            Outcome::AwaitingApproval => {
                info!(message_id = %submission.message.id, "Message requires approval")
            }
            Outcome::Rejected { ref reason } => {
                info!(message_id = %submission.message.id, reason = %reason, "Message rejected")
            }
            Outcome::Stored => info!(message_id = %submission.message.id, "Message validated"),
        }
        Ok(submission)
    }

    /// Run a message through validation. `lines` is the segmented body,
    /// heading first; it is ignored when the message already carries actions.
    pub async fn validate(&self, message: &mut Message, lines: &[String]) -> Result<Verdict> {
        if message.status.is_none() {
            message.status = Some(MessageStatus::Pending);
            self.store.store_message(message).await?;
        }

        if !message.actions.is_empty() {
            return self.reprocess(message).await;
        }

        let banned = self.oracle.fetch().await?;
        let banned = scanner::banned_set(&banned.words);

        let mut verdict = Verdict::default();
        let mut actions = Vec::new();
        message.status = Some(MessageStatus::Validated);

        for line in lines.iter().skip(1) {
            if let Some(words) = scanner::match_banned_words(line, &banned) {
                verdict.rejected = true;
                message.status = Some(MessageStatus::Rejected);
                message.reason = Some(format!("contains banned words: [{}]", words.join(",")));
                self.store.store_reject(message).await?;
                debug!(message_id = %message.id, words = ?words, "Banned words found");
                break;
            }

            if !scanner::has_link(line) {
                continue;
            }
            for link in scanner::extract_links(line).iter().filter(|l| l.is_external()) {
                if self.classify(link).await.is_image() {
                    let action = Action::image_review(&link.target);
                    self.store
                        .store_approval(&Approval::for_action(&action, &message.id))
                        .await?;
                    debug!(message_id = %message.id, action_id = %action.id, url = %link.target, "Image queued for approval");
                    actions.push(action);
                    verdict.approval_required = true;
                } else {
                    verdict.rejected = true;
                    message.status = Some(MessageStatus::Rejected);
                    message.reason = Some(REASON_EXTERNAL_LINKS.to_string());
                    self.store.store_reject(message).await?;
                }
            }
        }

        message.actions = actions;
        if verdict.approval_required {
            message.status = Some(MessageStatus::AwaitingApproval);
            message.reason = Some(REASON_AWAITING_APPROVAL.to_string());
        }

        self.store.update_message(message).await?;
        Ok(verdict)
    }

    /// Re-entry after a reviewer decision: never rescans the body. Moves the
    /// message to `validated` once every action is approved and persists it.
    /// Safe to call repeatedly.
    pub async fn reprocess(&self, message: &mut Message) -> Result<Verdict> {
        if Self::settle(message) {
            self.store.update_message(message).await?;
            info!(message_id = %message.id, "Message validated after review");
        }
        Ok(Verdict::default())
    }

    /// The reprocessing transition without persistence. Returns whether the
    /// message moved to `validated`.
    pub fn settle(message: &mut Message) -> bool {
        if !message.all_actions_approved() {
            return false;
        }
        message.status = Some(MessageStatus::Validated);
        message.reason = None;
        true
    }

    async fn classify(&self, link: &Link) -> LinkClass {
        let class = self.classifier.classify(&link.target).await;
        if let LinkClass::Failure(ref reason) = class {
            debug!(url = %link.target, reason = %reason, "Treating unprobeable link as non-image");
        }
        class
    }
}
