use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use layout::{LayoutState, LayoutStore};
use shared::{
    error::ApiError,
    protocol::{
        DispatchResponse, LayoutAction, LayoutSnapshot, PreferenceSubmission, StoredPreference,
        SubmissionReceipt,
    },
};
use storage::{preference_object_key, ObjectStore, JSON_CONTENT_TYPE};
use tracing::{error, info, warn};

pub const SUBMISSION_OK_MESSAGE: &str = "Preferences submitted successfully";
pub const MISSING_FIELDS_MESSAGE: &str = "Name and period are required";
pub const STORAGE_FAILED_MESSAGE: &str = "Error saving preferences";

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn ObjectStore>,
    pub layout: SharedLayout,
}

impl ApiContext {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            layout: SharedLayout::default(),
        }
    }
}

/// Same format as a browser's `Date.toISOString()`.
pub fn submission_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn submit_preferences(
    ctx: &ApiContext,
    submission: PreferenceSubmission,
    now: DateTime<Utc>,
) -> Result<SubmissionReceipt, ApiError> {
    if submission.name.trim().is_empty() || submission.period.trim().is_empty() {
        return Err(ApiError::validation(MISSING_FIELDS_MESSAGE));
    }

    let key = preference_object_key(&submission.name, now);
    let timestamp = submission_timestamp(now);
    let record = StoredPreference {
        submission,
        timestamp: timestamp.clone(),
    };
    let body = serde_json::to_vec_pretty(&record).map_err(|e| {
        error!(%e, "failed to encode preference record");
        ApiError::internal(STORAGE_FAILED_MESSAGE)
    })?;

    ctx.store
        .put_object(&key, body, JSON_CONTENT_TYPE)
        .await
        .map_err(|error| {
            error!(%key, error = %format!("{error:#}"), "failed to save preferences");
            ApiError::storage(STORAGE_FAILED_MESSAGE)
        })?;

    info!(%key, period = %record.submission.period, "stored seating preferences");
    Ok(SubmissionReceipt {
        message: SUBMISSION_OK_MESSAGE.to_string(),
        key,
        timestamp,
    })
}

/// The editor's layout behind a lock, so HTTP handlers take turns as its
/// single writer.
#[derive(Clone, Default)]
pub struct SharedLayout {
    inner: Arc<Mutex<LayoutStore>>,
}

impl SharedLayout {
    pub fn new(state: LayoutState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LayoutStore::new(state))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LayoutStore> {
        // Actions replace the state whole, so a poisoned store is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("layout lock was poisoned; continuing with last committed state");
            poisoned.into_inner()
        })
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        self.lock().snapshot()
    }

    pub fn dispatch(&self, action: &LayoutAction) -> DispatchResponse {
        let mut store = self.lock();
        let outcome = store.dispatch(action);
        if outcome.is_accepted() {
            info!(action = action.kind(), "layout updated");
        }
        DispatchResponse {
            outcome,
            layout: store.snapshot(),
        }
    }
}
