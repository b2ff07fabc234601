use thiserror::Error;

/// Generic message shown to clients for every error without a public message.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

/// Errors returned by the storage collaborators (galleries, images, sessions).
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The requested row or object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other backend failure (I/O, connection, corrupted data)
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(err.to_string())
        } else {
            StorageError::Backend(err.to_string())
        }
    }
}

/// Errors produced while resolving and authorizing a path-supplied resource.
#[derive(Debug, Clone, Error)]
pub enum AccessError {
    /// The raw identifier is not a positive integer
    #[error("Invalid {resource} ID: {raw:?}")]
    InvalidId { resource: &'static str, raw: String },

    /// No entity exists with this identifier
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: u64 },

    /// An authorization predicate rejected the principal
    #[error("Access to {resource} {id} denied by predicate #{predicate}")]
    Forbidden {
        resource: &'static str,
        id: u64,
        predicate: usize,
    },

    /// The lookup collaborator failed for a reason other than absence
    #[error("Lookup of {resource} {id} failed: {source}")]
    Internal {
        resource: &'static str,
        id: u64,
        #[source]
        source: StorageError,
    },
}

/// Errors produced while validating and storing an upload batch.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The filename is empty once directory components are stripped
    #[error("Invalid filename: {raw:?}")]
    InvalidFilename { raw: String },

    /// Extension or sniffed content type is outside the allowlist
    #[error("{filename} has an invalid content type or extension. Only {allowed} files can be uploaded.")]
    UnsupportedContent { filename: String, allowed: String },

    /// Reading the uploaded stream failed
    #[error("Reading upload {filename} failed: {message}")]
    Read { filename: String, message: String },

    /// The storage collaborator refused the file
    #[error("Storing upload {filename} failed: {source}")]
    Storage {
        filename: String,
        #[source]
        source: StorageError,
    },
}

/// Errors related to loading and executing templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A fragment failed to parse, or an inheritance parent is missing
    #[error("Parsing template set {set}: {source}")]
    Parse {
        set: String,
        #[source]
        source: tera::Error,
    },

    /// A template set with this name is already loaded
    #[error("Template set {0} is already loaded")]
    DuplicateSet(String),

    /// A template set needs at least one fragment
    #[error("Template set {0} has no fragments")]
    Empty(String),

    /// The render data could not be turned into a template context
    #[error("Building render context: {0}")]
    Context(#[source] tera::Error),

    /// Execution of the entry fragment failed
    #[error("Executing template {template}: {source}")]
    Execute {
        template: String,
        #[source]
        source: tera::Error,
    },
}

/// Error taxonomy surfaced to HTTP clients.
///
/// Every component error converts into one of these five kinds. The server
/// layer maps each kind to a fixed status code; `Internal` details are only
/// logged, never returned.
#[derive(Debug, Clone, Error)]
pub enum GalleryError {
    /// Bad or absent identifier, absent entity, absent filename
    #[error("{0}")]
    NotFound(String),

    /// An authorization predicate failed
    #[error("{0}")]
    Forbidden(String),

    /// Malformed input with a message that is safe to show
    #[error("{0}")]
    InvalidInput(String),

    /// Upload content or extension outside the allowlist
    #[error("{0}")]
    UnsupportedContent(String),

    /// Storage, lookup or template failure (detail is server-side only)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Capability of errors that carry a message meant for end users.
///
/// Errors returning `None` are shown as [`GENERIC_ERROR_MESSAGE`].
pub trait PublicMessage: std::error::Error {
    fn public_message(&self) -> Option<String> {
        None
    }
}

impl PublicMessage for GalleryError {
    fn public_message(&self) -> Option<String> {
        match self {
            GalleryError::InvalidInput(message) | GalleryError::UnsupportedContent(message) => {
                Some(message.clone())
            }
            _ => None,
        }
    }
}

impl PublicMessage for StorageError {}
impl PublicMessage for TemplateError {}

impl From<StorageError> for GalleryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => GalleryError::NotFound(what),
            StorageError::Backend(message) => GalleryError::Internal(message),
        }
    }
}

impl From<AccessError> for GalleryError {
    fn from(err: AccessError) -> Self {
        match &err {
            AccessError::InvalidId { .. } => GalleryError::NotFound("Invalid ID".to_string()),
            AccessError::NotFound { resource, .. } => {
                GalleryError::NotFound(format!("{} not found", resource))
            }
            AccessError::Forbidden { resource, .. } => GalleryError::Forbidden(format!(
                "You are not authorized to edit this {}",
                resource.to_lowercase()
            )),
            AccessError::Internal { .. } => GalleryError::Internal(err.to_string()),
        }
    }
}

impl From<UploadError> for GalleryError {
    fn from(err: UploadError) -> Self {
        match &err {
            UploadError::InvalidFilename { .. } => {
                GalleryError::InvalidInput("Uploaded files must have a filename".to_string())
            }
            UploadError::UnsupportedContent { .. } => {
                GalleryError::UnsupportedContent(err.to_string())
            }
            UploadError::Read { .. } | UploadError::Storage { .. } => {
                GalleryError::Internal(err.to_string())
            }
        }
    }
}

impl From<TemplateError> for GalleryError {
    fn from(err: TemplateError) -> Self {
        GalleryError::Internal(err.to_string())
    }
}
