use bytes::Bytes;
use tracing::debug;

/// Audio extensions accepted for upload. Compared case-sensitively.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["wav", "mp3", "mp4", "flac"];

/// A file as handed over by the client, before validation
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// Original filename including extension
    pub name: String,
    /// Client-reported content type
    pub mime_type: String,
    /// File contents
    pub payload: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, payload: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            payload,
        }
    }
}

/// One user-selected file pending submission
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    name: String,
    mime_type: String,
    extension: String,
    payload: Bytes,
    is_valid: bool,
}

impl UploadCandidate {
    /// Build a candidate, deriving the extension and validity once
    pub fn from_selected(file: SelectedFile) -> Self {
        let extension = file_extension(&file.name).to_string();
        let is_valid = is_accepted_extension(&extension);

        Self {
            name: file.name,
            mime_type: file.mime_type,
            extension,
            payload: file.payload,
            is_valid,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Shared handle to the file bytes; cloning does not copy the contents
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }
}

/// Result of validating one file selection
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Candidates whose extension is on the allow-list
    pub accepted: Vec<UploadCandidate>,
    /// Names of files that were rejected
    pub rejected: Vec<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}

/// Partition a file selection into accepted candidates and rejected filenames.
///
/// Only the filename suffix is inspected; file contents are never read.
pub fn validate_selection(files: impl IntoIterator<Item = SelectedFile>) -> Selection {
    let mut selection = Selection::default();

    for file in files {
        let candidate = UploadCandidate::from_selected(file);
        if candidate.is_valid() {
            selection.accepted.push(candidate);
        } else {
            debug!(
                file_name = %candidate.name(),
                extension = %candidate.extension(),
                "Rejected file with unsupported extension"
            );
            selection.rejected.push(candidate.name);
        }
    }

    selection
}

/// Suffix after the last `.`; the whole name when there is none
fn file_extension(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn is_accepted_extension(extension: &str) -> bool {
    ACCEPTED_EXTENSIONS.contains(&extension)
}
