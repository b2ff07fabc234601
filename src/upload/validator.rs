//! Validation and storage of uploaded image batches.
//!
//! Files are processed strictly in the order received. The first file that
//! fails (bad name, disallowed extension or content, storage failure) stops
//! the batch; files stored before it stay stored.

use std::sync::Arc;

use image::ImageFormat;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::sanitize::sanitize_filename;
use crate::error::UploadError;
use crate::model::{GalleryId, Image};
use crate::storage::ImageStore;

/// Number of leading bytes inspected to detect the content type.
pub const SNIFF_LEN: usize = 512;

/// Extensions accepted when no other policy is configured.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["png", "gif", "jpeg", "jpg"];

// =============================================================================
// Upload Policy
// =============================================================================

/// Allowlist of image extensions, and the content formats they stand for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    extensions: Vec<String>,
}

impl UploadPolicy {
    /// Build a policy from a list of extensions.
    ///
    /// Each extension must name a known image format. Case and a leading dot
    /// are ignored.
    pub fn new<I, S>(extensions: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
            if ext.is_empty() {
                continue;
            }
            if ImageFormat::from_extension(&ext).is_none() {
                return Err(format!("'{}' is not a known image extension", ext));
            }
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }

        if normalized.is_empty() {
            return Err("at least one image extension must be allowed".to_string());
        }

        Ok(Self {
            extensions: normalized,
        })
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether a lower-cased extension is allowed.
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|allowed| allowed == ext)
    }

    /// Whether sniffed content of `format` is allowed.
    pub fn allows_format(&self, format: ImageFormat) -> bool {
        self.extensions
            .iter()
            .any(|ext| ImageFormat::from_extension(ext) == Some(format))
    }

    /// The allowlist as prose: "png, gif, jpeg and jpg".
    pub fn describe(&self) -> String {
        match self.extensions.split_last() {
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
            None => String::new(),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

// =============================================================================
// Batch Types
// =============================================================================

/// One uploaded file: the client-supplied name and its byte stream.
///
/// The stream is owned by the value and released when the file has been
/// processed or the batch it belongs to is dropped.
#[derive(Debug)]
pub struct IncomingFile<R> {
    pub raw_filename: String,
    pub stream: R,
}

impl<R> IncomingFile<R> {
    pub fn new(raw_filename: impl Into<String>, stream: R) -> Self {
        Self {
            raw_filename: raw_filename.into(),
            stream,
        }
    }
}

/// Result for one attempted file.
#[derive(Debug)]
pub enum UploadOutcome {
    Stored(Image),
    Rejected { filename: String, reason: UploadError },
}

/// Per-file outcomes of a batch, in input order.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub outcomes: Vec<UploadOutcome>,
    /// Files after the rejected one, which were never looked at.
    pub not_attempted: usize,
}

impl UploadReport {
    /// Images stored by this batch.
    pub fn stored(&self) -> impl Iterator<Item = &Image> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            UploadOutcome::Stored(image) => Some(image),
            UploadOutcome::Rejected { .. } => None,
        })
    }

    /// The error that stopped the batch, if any.
    pub fn rejection(&self) -> Option<&UploadError> {
        self.outcomes.iter().find_map(|outcome| match outcome {
            UploadOutcome::Rejected { reason, .. } => Some(reason),
            UploadOutcome::Stored(_) => None,
        })
    }

    /// Collapse into the stored images, or the error that stopped the batch.
    pub fn into_result(self) -> Result<Vec<Image>, UploadError> {
        let mut stored = Vec::with_capacity(self.outcomes.len());
        for outcome in self.outcomes {
            match outcome {
                UploadOutcome::Stored(image) => stored.push(image),
                UploadOutcome::Rejected { reason, .. } => return Err(reason),
            }
        }
        Ok(stored)
    }
}

// =============================================================================
// Upload Validator
// =============================================================================

/// Validates uploaded files and hands accepted ones to an [`ImageStore`].
#[derive(Clone)]
pub struct UploadValidator {
    policy: UploadPolicy,
    store: Arc<dyn ImageStore>,
}

impl UploadValidator {
    pub fn new(policy: UploadPolicy, store: Arc<dyn ImageStore>) -> Self {
        Self { policy, store }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Validate and store `files` for `gallery`, in order.
    ///
    /// Stops at the first failing file. Earlier files remain stored and later
    /// files are dropped unread.
    pub async fn accept_uploads<R>(
        &self,
        gallery: GalleryId,
        files: Vec<IncomingFile<R>>,
    ) -> UploadReport
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut report = UploadReport::default();
        let mut files = files.into_iter();

        for file in files.by_ref() {
            let raw_filename = file.raw_filename.clone();
            match self.accept_one(gallery, file).await {
                Ok(image) => {
                    debug!(gallery_id = %gallery, filename = %image.filename, "Upload stored");
                    report.outcomes.push(UploadOutcome::Stored(image));
                }
                Err(reason) => {
                    warn!(
                        gallery_id = %gallery,
                        filename = %raw_filename,
                        "Upload rejected: {}",
                        reason
                    );
                    report.outcomes.push(UploadOutcome::Rejected {
                        filename: raw_filename,
                        reason,
                    });
                    break;
                }
            }
        }

        report.not_attempted = files.len();
        if report.not_attempted > 0 {
            debug!(
                gallery_id = %gallery,
                skipped = report.not_attempted,
                "Upload batch stopped early"
            );
        }

        report
    }

    async fn accept_one<R>(&self, gallery: GalleryId, file: IncomingFile<R>) -> Result<Image, UploadError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let IncomingFile {
            raw_filename,
            mut stream,
        } = file;

        let filename = sanitize_filename(&raw_filename)?;
        let unsupported = || UploadError::UnsupportedContent {
            filename: raw_filename.clone(),
            allowed: self.policy.describe(),
        };

        match filename.extension() {
            Some(ext) if self.policy.allows_extension(&ext) => {}
            _ => return Err(unsupported()),
        }

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut stream)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await
            .map_err(|e| UploadError::Read {
                filename: raw_filename.clone(),
                message: e.to_string(),
            })?;

        match image::guess_format(&head) {
            Ok(format) if self.policy.allows_format(format) => {}
            _ => return Err(unsupported()),
        }

        let mut body = std::io::Cursor::new(head).chain(&mut stream);
        self.store
            .put(gallery, &filename, &mut body)
            .await
            .map_err(|source| UploadError::Storage {
                filename: raw_filename.clone(),
                source,
            })
    }
}
