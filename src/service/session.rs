//! Edit sessions and the editor handoff slot
//!
//! A session holds one editable image and its mask. Long-running tools claim
//! the session through a `ProcessingGuard`; while the guard is alive every
//! other mutation is rejected with `Busy`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{EditableImage, Mask};
use crate::error::{EditorError, EditorResult};

use super::types::SessionInfo;

/// One open editor
pub struct EditSession {
    pub image: EditableImage,
    pub mask: Mask,
    processing: bool,
    last_access: Instant,
}

impl EditSession {
    fn new(image: RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        Self {
            image: EditableImage::new(image),
            mask: Mask::new(w, h),
            processing: false,
            last_access: Instant::now(),
        }
    }

    /// Swap the working buffer; the mask is recreated when the size changes
    pub fn replace_image(&mut self, image: RgbaImage) {
        if image.dimensions() != self.mask.dimensions() {
            self.mask = Mask::new(image.width(), image.height());
        }
        self.image.replace(image);
    }

    pub fn reset(&mut self) {
        self.image.reset();
        let (w, h) = self.image.dimensions();
        if self.mask.dimensions() != (w, h) {
            self.mask = Mask::new(w, h);
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    fn info(&self, id: &str) -> SessionInfo {
        SessionInfo {
            id: id.to_string(),
            width: self.image.width(),
            height: self.image.height(),
            modified: self.image.is_modified(),
            mask_coverage: self.mask.coverage(),
        }
    }
}

type SessionMap = Arc<Mutex<HashMap<String, EditSession>>>;

/// Exclusive claim on a session for the duration of one tool run.
///
/// Dropping the guard releases the claim on every exit path.
pub struct ProcessingGuard {
    sessions: SessionMap,
    id: String,
}

impl ProcessingGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy of the working buffer and mask at claim time
    pub fn snapshot(&self) -> EditorResult<(RgbaImage, Mask)> {
        let sessions = self.sessions.lock();
        let session = sessions
            .get(&self.id)
            .ok_or_else(|| session_not_found(&self.id))?;
        Ok((session.image.current().clone(), session.mask.clone()))
    }

    /// Copy of the mask alone
    pub fn mask(&self) -> EditorResult<Mask> {
        let sessions = self.sessions.lock();
        let session = sessions
            .get(&self.id)
            .ok_or_else(|| session_not_found(&self.id))?;
        Ok(session.mask.clone())
    }

    /// Apply the tool result while still holding the claim
    pub fn commit<F>(&self, f: F) -> EditorResult<SessionInfo>
    where
        F: FnOnce(&mut EditSession),
    {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&self.id)
            .ok_or_else(|| session_not_found(&self.id))?;
        f(session);
        session.last_access = Instant::now();
        Ok(session.info(&self.id))
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if let Some(session) = self.sessions.lock().get_mut(&self.id) {
            session.processing = false;
        }
    }
}

fn session_not_found(id: &str) -> EditorError {
    EditorError::not_found(format!("Edit session not found: {}", id))
}

/// Single-use carrier passing an image from the generator or gallery to the editor
#[derive(Default)]
pub struct HandoffStore {
    items: Mutex<HashMap<String, (RgbaImage, Instant)>>,
}

impl HandoffStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, image: RgbaImage) -> String {
        let token = Uuid::new_v4().to_string();
        self.items.lock().insert(token.clone(), (image, Instant::now()));
        token
    }

    /// Take the payload; a token can be redeemed once
    pub fn take(&self, token: &str) -> EditorResult<RgbaImage> {
        self.items
            .lock()
            .remove(token)
            .map(|(image, _)| image)
            .ok_or_else(|| EditorError::not_found("Handoff not found or already used"))
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_older_than(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|_, (_, created)| now.duration_since(*created) < max_age);
        before - items.len()
    }
}

/// All open sessions plus pending handoffs
pub struct SessionStore {
    sessions: SessionMap,
    handoffs: HandoffStore,
    idle_timeout: Duration,
    shutdown: Notify,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            handoffs: HandoffStore::new(),
            idle_timeout,
            shutdown: Notify::new(),
        }
    }

    pub fn handoffs(&self) -> &HandoffStore {
        &self.handoffs
    }

    pub fn create(&self, image: RgbaImage) -> SessionInfo {
        let id = Uuid::new_v4().to_string();
        let session = EditSession::new(image);
        let info = session.info(&id);
        self.sessions.lock().insert(id.clone(), session);
        debug!("Opened edit session {} ({}x{})", id, info.width, info.height);
        info
    }

    pub fn info(&self, id: &str) -> EditorResult<SessionInfo> {
        self.read(id, |s| s.info(id))
    }

    /// Read-only access; allowed while a tool is processing
    pub fn read<T, F>(&self, id: &str, f: F) -> EditorResult<T>
    where
        F: FnOnce(&EditSession) -> T,
    {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(id).ok_or_else(|| session_not_found(id))?;
        session.last_access = Instant::now();
        Ok(f(session))
    }

    /// Short synchronous mutation; rejected while a tool is processing
    pub fn update<T, F>(&self, id: &str, f: F) -> EditorResult<T>
    where
        F: FnOnce(&mut EditSession) -> EditorResult<T>,
    {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(id).ok_or_else(|| session_not_found(id))?;
        if session.processing {
            return Err(EditorError::Busy);
        }
        session.last_access = Instant::now();
        f(session)
    }

    /// Claim a session for a long-running tool
    pub fn begin(&self, id: &str) -> EditorResult<ProcessingGuard> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(id).ok_or_else(|| session_not_found(id))?;
        if session.processing {
            return Err(EditorError::Busy);
        }
        session.processing = true;
        session.last_access = Instant::now();
        Ok(ProcessingGuard {
            sessions: self.sessions.clone(),
            id: id.to_string(),
        })
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop idle sessions and stale handoffs; busy sessions are kept
    pub fn cleanup_idle(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut sessions = self.sessions.lock();
            let before = sessions.len();
            sessions.retain(|_, s| {
                s.processing || now.duration_since(s.last_access) < self.idle_timeout
            });
            before - sessions.len()
        };
        let purged = self.handoffs.purge_older_than(self.idle_timeout);

        if removed > 0 || purged > 0 {
            info!("Expired {} idle session(s), {} handoff(s)", removed, purged);
        }
        removed
    }

    /// Start the background cleanup task
    pub async fn start_cleanup_task(self: Arc<Self>) {
        let check_interval = self
            .idle_timeout
            .clamp(Duration::from_secs(1), Duration::from_secs(60));

        loop {
            tokio::select! {
                _ = tokio::time::sleep(check_interval) => {
                    debug!("Running session cleanup check");
                    self.cleanup_idle();
                }
                _ = self.shutdown.notified() => {
                    info!("Session cleanup task shutting down");
                    break;
                }
            }
        }
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}
