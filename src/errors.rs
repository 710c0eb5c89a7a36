use strum::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeErrorType {
    /// Stored bytes are not a readable raster image
    Decode,
    /// Resized pixels could not be serialized into the target format
    Encode,
    /// Permission denied, bad path, failed write/move/delete
    FileSystem,
    /// Record store failed to load or save an owner record
    Persistence,
}

impl NormalizeErrorType {
    pub fn default_detail(&self) -> String {
        match &self {
            NormalizeErrorType::Decode => "Stored file is not a supported image".to_string(),
            NormalizeErrorType::Encode => "Failed to encode image".to_string(),
            NormalizeErrorType::FileSystem => "Media storage operation failed".to_string(),
            NormalizeErrorType::Persistence => "Record store operation failed".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{err_type} error: {detail}")]
pub struct NormalizeError {
    pub err_type: NormalizeErrorType,
    pub detail: String,
}

impl NormalizeError {
    pub fn new(err_type: NormalizeErrorType, detail: Option<String>) -> Self {
        let detail = detail.unwrap_or(err_type.default_detail());
        NormalizeError { err_type, detail }
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::new(NormalizeErrorType::Decode, Some(detail.into()))
    }

    pub fn encode(detail: impl Into<String>) -> Self {
        Self::new(NormalizeErrorType::Encode, Some(detail.into()))
    }

    pub fn file_system(detail: impl Into<String>) -> Self {
        Self::new(NormalizeErrorType::FileSystem, Some(detail.into()))
    }

    pub fn persistence(detail: impl Into<String>) -> Self {
        Self::new(NormalizeErrorType::Persistence, Some(detail.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_detail_is_used_when_missing() {
        let err = NormalizeError::new(NormalizeErrorType::Decode, None);
        assert_eq!(err.detail, "Stored file is not a supported image");
        assert_eq!(
            err.to_string(),
            "Decode error: Stored file is not a supported image"
        );
    }

    #[test]
    fn explicit_detail_wins() {
        let err = NormalizeError::file_system("permission denied: a.jpg");
        assert_eq!(err.err_type, NormalizeErrorType::FileSystem);
        assert_eq!(
            err.to_string(),
            "FileSystem error: permission denied: a.jpg"
        );
    }
}
