//! Per-session conversation state: one remote thread per assistant and the
//! files uploaded for it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{service::AssistantService, ApiResponseOrError};

/// Identity of one user session. Everything a [`ThreadStore`] remembers is
/// scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionContext {
    session_id: String,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Id assigned by the remote file store.
    pub file_id: String,
    /// Identity of the file on the presenting side, used to spot re-uploads.
    pub local_file_id: String,
    pub assistant_id: String,
    pub thread_id: String,
}

#[derive(Debug, Default)]
struct Inner {
    threads: HashMap<String, String>,
    files: HashMap<String, BTreeMap<String, UploadedFile>>,
    upload_slots: HashMap<(String, String), Arc<Mutex<()>>>,
}

/// Maps each assistant to the thread this session talks to it on, and keeps
/// the set of files attached to that conversation.
#[derive(Debug)]
pub struct ThreadStore {
    context: SessionContext,
    inner: Mutex<Inner>,
}

impl ThreadStore {
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The thread bound to `assistant_id`, created on first use.
    pub async fn get_or_create_thread(
        &self,
        service: &dyn AssistantService,
        assistant_id: &str,
    ) -> ApiResponseOrError<String> {
        let mut inner = self.inner.lock().await;
        self.ensure_thread(&mut inner, service, assistant_id).await
    }

    async fn ensure_thread(
        &self,
        inner: &mut Inner,
        service: &dyn AssistantService,
        assistant_id: &str,
    ) -> ApiResponseOrError<String> {
        if let Some(thread_id) = inner.threads.get(assistant_id) {
            return Ok(thread_id.clone());
        }

        let thread = service.create_thread().await?;
        log::info!(
            "Session {} bound assistant {} to new thread {}",
            self.context.id(),
            assistant_id,
            thread.id
        );
        inner
            .threads
            .insert(assistant_id.to_string(), thread.id.clone());
        Ok(thread.id)
    }

    /// The thread bound to `assistant_id`, if one was created already.
    pub async fn thread_id(&self, assistant_id: &str) -> Option<String> {
        self.inner.lock().await.threads.get(assistant_id).cloned()
    }

    /// Records that `local_file_id` was uploaded as `remote_file_id` for the
    /// assistant, creating the thread first if needed. Returns `false` when
    /// the local file was already tracked; the first record is kept.
    pub async fn track_uploaded_file(
        &self,
        service: &dyn AssistantService,
        assistant_id: &str,
        local_file_id: &str,
        remote_file_id: &str,
    ) -> ApiResponseOrError<bool> {
        let mut inner = self.inner.lock().await;
        let thread_id = self.ensure_thread(&mut inner, service, assistant_id).await?;

        let files = inner.files.entry(assistant_id.to_string()).or_default();
        if files.contains_key(local_file_id) {
            return Ok(false);
        }

        files.insert(
            local_file_id.to_string(),
            UploadedFile {
                file_id: remote_file_id.to_string(),
                local_file_id: local_file_id.to_string(),
                assistant_id: assistant_id.to_string(),
                thread_id,
            },
        );
        log::debug!("Tracking file {remote_file_id} for assistant {assistant_id}");
        Ok(true)
    }

    /// Serialises uploads of one local file for one assistant. Hold the guard
    /// from the duplicate check until the file is tracked.
    pub async fn lock_upload(&self, assistant_id: &str, local_file_id: &str) -> OwnedMutexGuard<()> {
        let slot = self
            .inner
            .lock()
            .await
            .upload_slots
            .entry((assistant_id.to_string(), local_file_id.to_string()))
            .or_default()
            .clone();
        slot.lock_owned().await
    }

    pub async fn is_already_uploaded(&self, assistant_id: &str, local_file_id: &str) -> bool {
        self.uploaded_file(assistant_id, local_file_id)
            .await
            .is_some()
    }

    pub async fn uploaded_file(
        &self,
        assistant_id: &str,
        local_file_id: &str,
    ) -> Option<UploadedFile> {
        self.inner
            .lock()
            .await
            .files
            .get(assistant_id)
            .and_then(|files| files.get(local_file_id))
            .cloned()
    }

    /// Remote ids of every file tracked for the assistant.
    pub async fn attached_file_ids(&self, assistant_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .await
            .files
            .get(assistant_id)
            .map(|files| files.values().map(|file| file.file_id.clone()).collect())
            .unwrap_or_default()
    }
}
