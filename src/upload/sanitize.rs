//! Reduction of untrusted filenames to a safe base name.

use std::fmt;

use crate::error::UploadError;

/// A filename with every directory component removed.
///
/// Only [`sanitize_filename`] constructs values of this type, so storage code
/// that takes a `SafeFilename` never sees separators, `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SafeFilename(String);

impl SafeFilename {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.0.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for SafeFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeFilename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip directory components from `raw` and return the final element.
///
/// Both `/` and `\` separate components. `.` segments are dropped and `..`
/// removes the preceding element, so `"../../etc/passwd"` becomes `"passwd"`
/// and `"a/b/.."` becomes `"a"`. An empty result, or a name containing NUL,
/// is [`UploadError::InvalidFilename`].
pub fn sanitize_filename(raw: &str) -> Result<SafeFilename, UploadError> {
    let invalid = || UploadError::InvalidFilename {
        raw: raw.to_string(),
    };

    if raw.contains('\0') {
        return Err(invalid());
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(|c| c == '/' || c == '\\') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    match segments.pop() {
        Some(name) => Ok(SafeFilename(name.to_string())),
        None => Err(invalid()),
    }
}
