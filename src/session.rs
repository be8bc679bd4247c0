//! The single active video session.
//!
//! A [`Session`] is an immutable snapshot. [`SessionStore`] publishes a new
//! snapshot by swapping one pointer, so a reader holding an `Arc<Session>`
//! always sees one consistent video, never a mix of two.

use crate::error::{Result, SpolError};
use crate::index::EmbeddingIndex;
use crate::segments::SegmentCollection;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// Where the session's video came from.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRef {
    /// Filename as uploaded by the client.
    pub filename: String,
    /// Name of the stored copy inside the upload directory.
    pub stored_name: String,
    /// Full path of the stored copy.
    #[serde(skip)]
    pub path: PathBuf,
    /// Duration in seconds as reported by transcription.
    pub duration_seconds: f64,
}

/// Segments and index of one processed video.
#[derive(Debug)]
pub struct Session {
    version: u64,
    segments: SegmentCollection,
    index: EmbeddingIndex,
    video: VideoRef,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn segments(&self) -> &SegmentCollection {
        &self.segments
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn video(&self) -> &VideoRef {
        &self.video
    }
}

/// Externally visible state of the store.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// No video processed yet.
    Empty,
    /// A session is loaded.
    Ready {
        version: u64,
        segments_count: usize,
        video_filename: String,
        created_at: DateTime<Utc>,
    },
}

/// Proof that the caller holds the build slot. Dropping it frees the slot.
pub struct BuildPermit {
    _guard: OwnedMutexGuard<()>,
}

/// Holder of the current session snapshot.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<Arc<Session>>>,
    build_lock: Arc<Mutex<()>>,
    next_version: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Session>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The current snapshot, or [`SpolError::NoSession`].
    pub fn require(&self) -> Result<Arc<Session>> {
        self.snapshot().ok_or(SpolError::NoSession)
    }

    pub fn status(&self) -> SessionStatus {
        match self.snapshot() {
            None => SessionStatus::Empty,
            Some(session) => SessionStatus::Ready {
                version: session.version,
                segments_count: session.segments.len(),
                video_filename: session.video.filename.clone(),
                created_at: session.created_at,
            },
        }
    }

    /// Claim the single build slot without waiting.
    ///
    /// Returns [`SpolError::Busy`] while another build holds it.
    pub fn try_begin_build(&self) -> Result<BuildPermit> {
        self.build_lock
            .clone()
            .try_lock_owned()
            .map(|guard| BuildPermit { _guard: guard })
            .map_err(|_| SpolError::Busy)
    }

    /// Replace the current session with a fully built one.
    ///
    /// Requires the build permit so that only one build can publish at a time.
    pub fn publish(
        &self,
        _permit: &BuildPermit,
        segments: SegmentCollection,
        index: EmbeddingIndex,
        video: VideoRef,
    ) -> Arc<Session> {
        let session = Arc::new(Session {
            version: self.next_version.fetch_add(1, Ordering::SeqCst) + 1,
            segments,
            index,
            video,
            created_at: Utc::now(),
        });

        let mut current = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = Some(session.clone());
        drop(current);

        info!(
            version = session.version,
            segments = session.segments.len(),
            "Published session for {}",
            session.video.filename
        );
        session
    }
}
