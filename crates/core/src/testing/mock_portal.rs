//! Mock complaint portal and object storage for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::submission::{
    ComplaintDraft, ComplaintPortal, ObjectStorage, PortalError, PreparedComplaint, StorageError,
};

/// Mock implementation of the ComplaintPortal trait.
///
/// Request numbers are issued sequentially as `311-1`, `311-2`, ...
/// Failures can be scripted per phase, and every draft, confirmation and
/// discard is recorded.
#[derive(Debug, Default)]
pub struct MockComplaintPortal {
    prepared: Arc<RwLock<Vec<ComplaintDraft>>>,
    confirmed: Arc<RwLock<Vec<String>>>,
    discarded: Arc<RwLock<Vec<String>>>,
    prepare_errors: Arc<RwLock<VecDeque<PortalError>>>,
    confirm_errors: Arc<RwLock<VecDeque<PortalError>>>,
    /// Remaining prepares with an attachment that will fail to attach.
    attachment_failures: Arc<RwLock<u32>>,
    next_number: Arc<RwLock<u32>>,
}

impl MockComplaintPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_prepare(&self, errors: Vec<PortalError>) {
        self.prepare_errors.write().await.extend(errors);
    }

    pub async fn fail_confirm(&self, error: PortalError) {
        self.confirm_errors.write().await.push_back(error);
    }

    /// Fail the next `count` attachment attempts.
    pub async fn fail_attachments(&self, count: u32) {
        *self.attachment_failures.write().await = count;
    }

    /// Every draft passed to `prepare`, in call order.
    pub async fn prepared_drafts(&self) -> Vec<ComplaintDraft> {
        self.prepared.read().await.clone()
    }

    /// Event ids whose complaint was confirmed.
    pub async fn confirmed_events(&self) -> Vec<String> {
        self.confirmed.read().await.clone()
    }

    pub async fn discarded_events(&self) -> Vec<String> {
        self.discarded.read().await.clone()
    }
}

#[async_trait]
impl ComplaintPortal for MockComplaintPortal {
    fn name(&self) -> &str {
        "mock"
    }

    async fn prepare(&self, draft: &ComplaintDraft) -> Result<PreparedComplaint, PortalError> {
        self.prepared.write().await.push(draft.clone());

        if let Some(error) = self.prepare_errors.write().await.pop_front() {
            return Err(error);
        }
        if draft.attachment.is_some() {
            let mut remaining = self.attachment_failures.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PortalError::AttachmentFailed("upload widget error".to_string()));
            }
        }

        Ok(PreparedComplaint {
            handle: format!("form-{}", draft.event_id),
            event_id: draft.event_id.clone(),
        })
    }

    async fn confirm(&self, prepared: &PreparedComplaint) -> Result<String, PortalError> {
        if let Some(error) = self.confirm_errors.write().await.pop_front() {
            return Err(error);
        }
        let mut next = self.next_number.write().await;
        *next += 1;
        self.confirmed.write().await.push(prepared.event_id.clone());
        Ok(format!("311-{}", *next))
    }

    async fn discard(&self, prepared: &PreparedComplaint) -> Result<(), PortalError> {
        self.discarded.write().await.push(prepared.event_id.clone());
        Ok(())
    }
}

/// Mock implementation of the ObjectStorage trait.
#[derive(Debug)]
pub struct MockObjectStorage {
    base_url: String,
    uploads: Arc<RwLock<Vec<(String, PathBuf)>>>,
    next_error: Arc<RwLock<Option<StorageError>>>,
}

impl Default for MockObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self {
            base_url: "https://clips.test".to_string(),
            uploads: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn fail_next(&self, error: StorageError) {
        *self.next_error.write().await = Some(error);
    }

    /// Uploaded keys, in order.
    pub async fn uploaded_keys(&self) -> Vec<String> {
        self.uploads
            .read()
            .await
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn upload(&self, key: &str, path: &Path) -> Result<String, StorageError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if !tokio::fs::try_exists(path).await? {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            )));
        }
        self.uploads
            .write()
            .await
            .push((key.to_string(), path.to_path_buf()));
        Ok(format!("{}/{}", self.base_url, key))
    }
}
