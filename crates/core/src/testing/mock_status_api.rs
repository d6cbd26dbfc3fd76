//! Mock status API for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::event::ServiceRequestStatus;
use crate::resolution::{StatusApi, StatusApiError};

/// Mock implementation of the StatusApi trait.
///
/// Unknown request numbers get an empty (open) status.
#[derive(Debug, Default)]
pub struct MockStatusApi {
    statuses: Arc<RwLock<HashMap<String, ServiceRequestStatus>>>,
    requests: Arc<RwLock<Vec<String>>>,
    rate_limited: Arc<RwLock<u32>>,
    next_error: Arc<RwLock<Option<StatusApiError>>>,
}

impl MockStatusApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_status(&self, request_number: &str, status: ServiceRequestStatus) {
        self.statuses
            .write()
            .await
            .insert(request_number.to_string(), status);
    }

    /// Answer the next `count` requests with a rate-limit response.
    pub async fn rate_limit_next(&self, count: u32) {
        *self.rate_limited.write().await = count;
    }

    pub async fn fail_next(&self, error: StatusApiError) {
        *self.next_error.write().await = Some(error);
    }

    /// Every request number asked for, including rate-limited attempts.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl StatusApi for MockStatusApi {
    async fn get_status(&self, request_number: &str) -> Result<ServiceRequestStatus, StatusApiError> {
        self.requests.write().await.push(request_number.to_string());

        {
            let mut remaining = self.rate_limited.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StatusApiError::RateLimited);
            }
        }
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self
            .statuses
            .read()
            .await
            .get(request_number)
            .cloned()
            .unwrap_or_default())
    }
}
