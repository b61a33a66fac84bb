//! Upload endpoint kinds (`POST /upload/{image,audio,pdf}`).

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Image,
    Audio,
    Pdf,
}

impl UploadKind {
    /// Path segment under `/upload/`.
    pub fn as_str(self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Audio => "audio",
            UploadKind::Pdf => "pdf",
        }
    }

    /// Guess the kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "gif" => Some(UploadKind::Image),
            "mp3" | "wav" | "ogg" | "m4a" | "webm" => Some(UploadKind::Audio),
            "pdf" => Some(UploadKind::Pdf),
            _ => None,
        }
    }

    /// MIME type sent with the multipart part.
    pub fn mime_for(self, path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match (self, ext.as_str()) {
            (UploadKind::Image, "png") => "image/png",
            (UploadKind::Image, "webp") => "image/webp",
            (UploadKind::Image, "gif") => "image/gif",
            (UploadKind::Image, _) => "image/jpeg",
            (UploadKind::Audio, "wav") => "audio/wav",
            (UploadKind::Audio, "ogg") => "audio/ogg",
            (UploadKind::Audio, "m4a") => "audio/mp4",
            (UploadKind::Audio, "webm") => "audio/webm",
            (UploadKind::Audio, _) => "audio/mpeg",
            (UploadKind::Pdf, _) => "application/pdf",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of the upload endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(UploadKind::from_path(Path::new("proof.JPG")), Some(UploadKind::Image));
        assert_eq!(UploadKind::from_path(Path::new("memo.ogg")), Some(UploadKind::Audio));
        assert_eq!(UploadKind::from_path(Path::new("bl.pdf")), Some(UploadKind::Pdf));
        assert_eq!(UploadKind::from_path(Path::new("archive.zip")), None);
        assert_eq!(UploadKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(UploadKind::Image.mime_for(Path::new("a.png")), "image/png");
        assert_eq!(UploadKind::Image.mime_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(UploadKind::Pdf.mime_for(Path::new("a.pdf")), "application/pdf");
    }
}
