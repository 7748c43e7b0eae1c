//! Image records and their processing status.

use serde::{Deserialize, Serialize};

/// The `kind` tag an image must carry to be picked up by the recognition pipeline.
pub const RECOGNIZE_KIND: &str = "recognize";

/// Processing status of an image.
///
/// Persisted as a small signed integer; the numeric values are part of the
/// stored format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageStatus {
    New,
    Queued,
    Processing,
    Done,   // terminal
    Failed, // terminal
}

impl ImageStatus {
    pub fn as_i32(&self) -> i32 {
        match self {
            ImageStatus::New => 0,
            ImageStatus::Queued => 1,
            ImageStatus::Done => 2,
            ImageStatus::Processing => 3,
            ImageStatus::Failed => -1,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(ImageStatus::New),
            1 => Some(ImageStatus::Queued),
            2 => Some(ImageStatus::Done),
            3 => Some(ImageStatus::Processing),
            -1 => Some(ImageStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::New => "NEW",
            ImageStatus::Queued => "QUEUED",
            ImageStatus::Processing => "PROCESSING",
            ImageStatus::Done => "DONE",
            ImageStatus::Failed => "FAILED",
        }
    }
}

/// An uploaded image.
///
/// Upload metadata (`url`, `user_id`, `filename`, `size`, `mimetype`) belongs to
/// the upload collaborator; the recognition pipeline only mutates `status` and
/// `species_document_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub url: String,
    pub kind: Option<String>,
    pub status: ImageStatus,
    /// Set only when `status` is `Done`.
    pub species_document_id: Option<String>,
    pub user_id: Option<String>,
    pub filename: Option<String>,
    pub size: Option<i64>,
    pub mimetype: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Image {
    /// A freshly uploaded image, not yet requested for recognition.
    pub fn new(url: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Image {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            kind: None,
            status: ImageStatus::New,
            species_document_id: None,
            user_id: None,
            filename: None,
            size: None,
            mimetype: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Same as [`Image::new`], already tagged and queued for recognition.
    pub fn queued_for_recognition(url: impl Into<String>) -> Self {
        Image {
            kind: Some(RECOGNIZE_KIND.to_string()),
            status: ImageStatus::Queued,
            ..Image::new(url)
        }
    }

    pub fn mark_done(&mut self, species_document_id: impl Into<String>) {
        self.status = ImageStatus::Done;
        self.species_document_id = Some(species_document_id.into());
    }

    pub fn mark_failed(&mut self) {
        self.status = ImageStatus::Failed;
        self.species_document_id = None;
    }
}

/// What a recognition request did to an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum QueueRequestResult {
    /// NEW image moved to QUEUED.
    Queued,
    /// FAILED image moved back to QUEUED.
    Requeued,
    /// Image was already waiting or being processed; nothing changed.
    AlreadyQueued { status: ImageStatus },
    /// Image was already recognized.
    AlreadyDone {
        #[serde(rename = "speciesDocumentId")]
        species_document_id: String,
    },
    NotFound,
}

/// Number of images in each status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageStatusCounts {
    pub new: usize,
    pub queued: usize,
    pub processing: usize,
    pub done: usize,
    pub failed: usize,
}

impl ImageStatusCounts {
    pub fn add(&mut self, status: ImageStatus, count: usize) {
        match status {
            ImageStatus::New => self.new += count,
            ImageStatus::Queued => self.queued += count,
            ImageStatus::Processing => self.processing += count,
            ImageStatus::Done => self.done += count,
            ImageStatus::Failed => self.failed += count,
        }
    }
}
