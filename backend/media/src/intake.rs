//! Upload intake: turns user-selected files into accepted images.
//!
//! No network call happens here; accepted images are handed to the session,
//! which creates problem items and starts one resolver per item.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use studysnap_core::{ImageReference, ProblemItem, SnapError, Subject};

use crate::encode::preview_uri;
use crate::mime_detect::{detect_mime_type, is_image, normalize_mime};

/// A file as handed over by the user, before any filtering.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    /// Declared media type; detected from the extension when absent
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, mime_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, None, bytes))
    }

    /// The media type intake judges this file by.
    pub fn declared_type(&self) -> String {
        match self.mime_type.as_deref().map(normalize_mime) {
            Some(mime) if !mime.is_empty() => mime,
            _ => detect_mime_type(Path::new(&self.file_name)).to_string(),
        }
    }
}

/// An image that passed intake, ready to become a problem item.
#[derive(Debug, Clone)]
pub struct AcceptedImage {
    pub reference: ImageReference,
    pub bytes: Bytes,
}

impl AcceptedImage {
    pub fn file_name(&self) -> &str {
        &self.reference.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.reference.mime_type
    }

    /// A new `Analyzing` item referencing this image.
    pub fn to_item(&self, subject: Subject, created_at: DateTime<Utc>) -> ProblemItem {
        ProblemItem::new(self.reference.clone(), subject, created_at)
    }
}

/// How a selection of files is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntakeMode {
    /// Non-images are dropped silently
    #[default]
    Batch,
    /// Only the first file counts; a non-image is rejected
    Single,
}

impl fmt::Display for IntakeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntakeMode::Batch => write!(f, "batch"),
            IntakeMode::Single => write!(f, "single"),
        }
    }
}

impl FromStr for IntakeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(IntakeMode::Batch),
            "single" => Ok(IntakeMode::Single),
            other => Err(format!("unknown intake mode: {}", other)),
        }
    }
}

/// Filters a selection of files down to accepted images.
#[derive(Debug, Clone, Default)]
pub struct UploadIntake {
    mode: IntakeMode,
    with_previews: bool,
}

impl UploadIntake {
    pub fn new(mode: IntakeMode) -> Self {
        Self {
            mode,
            with_previews: false,
        }
    }

    /// Attach a `data:` preview to each accepted image.
    pub fn with_previews(mut self, enabled: bool) -> Self {
        self.with_previews = enabled;
        self
    }

    pub fn mode(&self) -> IntakeMode {
        self.mode
    }

    pub fn accept(&self, files: Vec<UploadedFile>) -> Result<Vec<AcceptedImage>, SnapError> {
        if files.is_empty() {
            return Err(SnapError::NoFiles);
        }

        let selected = files.len();
        let accepted = match self.mode {
            IntakeMode::Batch => files
                .into_iter()
                .filter_map(|file| {
                    let mime = file.declared_type();
                    if is_image(&mime) {
                        Some(self.to_accepted(file, mime))
                    } else {
                        debug!(file = %file.file_name, mime = %mime, "Dropping non-image file");
                        None
                    }
                })
                .collect::<Vec<_>>(),
            IntakeMode::Single => {
                let Some(file) = files.into_iter().next() else {
                    return Err(SnapError::NoFiles);
                };
                let mime = file.declared_type();
                if !is_image(&mime) {
                    return Err(SnapError::NotAnImage {
                        file_name: file.file_name,
                    });
                }
                vec![self.to_accepted(file, mime)]
            }
        };

        info!(
            mode = %self.mode,
            selected,
            accepted = accepted.len(),
            "Upload intake finished"
        );
        Ok(accepted)
    }

    fn to_accepted(&self, file: UploadedFile, mime_type: String) -> AcceptedImage {
        let preview = if self.with_previews {
            preview_uri(&mime_type, &file.bytes)
        } else {
            String::new()
        };
        AcceptedImage {
            reference: ImageReference {
                file_name: file.file_name,
                mime_type,
                size_bytes: file.bytes.len(),
                preview_uri: preview,
            },
            bytes: file.bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: Option<&str>) -> UploadedFile {
        UploadedFile::new(name, mime.map(String::from), vec![1u8, 2, 3])
    }

    #[test]
    fn batch_drops_non_images() {
        let intake = UploadIntake::new(IntakeMode::Batch);
        let accepted = intake
            .accept(vec![
                file("a.png", Some("image/png")),
                file("b.jpg", Some("image/jpeg")),
                file("not-an-image.txt", Some("text/plain")),
            ])
            .unwrap();
        let names: Vec<_> = accepted.iter().map(|a| a.file_name()).collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn batch_of_only_non_images_is_empty_not_error() {
        let intake = UploadIntake::default();
        let accepted = intake.accept(vec![file("notes.txt", None)]).unwrap();
        assert!(accepted.is_empty());
    }

    #[test]
    fn empty_selection_is_error() {
        let intake = UploadIntake::default();
        assert!(matches!(intake.accept(vec![]), Err(SnapError::NoFiles)));
    }

    #[test]
    fn declared_type_wins_over_extension() {
        let intake = UploadIntake::default();
        let accepted = intake
            .accept(vec![file("scan.bin", Some("image/webp")), file("photo.png", Some("text/plain"))])
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].mime_type(), "image/webp");
    }

    #[test]
    fn missing_type_falls_back_to_extension() {
        let intake = UploadIntake::default();
        let accepted = intake.accept(vec![file("photo.JPEG", None)]).unwrap();
        assert_eq!(accepted[0].mime_type(), "image/jpeg");
        assert_eq!(accepted[0].reference.size_bytes, 3);
    }

    #[test]
    fn single_rejects_non_image() {
        let intake = UploadIntake::new(IntakeMode::Single);
        let err = intake
            .accept(vec![file("essay.pdf", None), file("a.png", None)])
            .unwrap_err();
        match err {
            SnapError::NotAnImage { file_name } => assert_eq!(file_name, "essay.pdf"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn single_takes_first_file_only() {
        let intake = UploadIntake::new(IntakeMode::Single);
        let accepted = intake
            .accept(vec![file("a.png", None), file("b.png", None)])
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].file_name(), "a.png");
    }

    #[test]
    fn previews_are_opt_in() {
        let plain = UploadIntake::default().accept(vec![file("a.png", None)]).unwrap();
        assert!(plain[0].reference.preview_uri.is_empty());

        let with = UploadIntake::default()
            .with_previews(true)
            .accept(vec![file("a.png", None)])
            .unwrap();
        assert_eq!(with[0].reference.preview_uri, "data:image/png;base64,AQID");
    }

    #[test]
    fn accepted_image_becomes_analyzing_item() {
        let accepted = UploadIntake::default().accept(vec![file("a.png", None)]).unwrap();
        let item = accepted[0].to_item(Subject::Math, Utc::now());
        assert_eq!(item.status, studysnap_core::ProblemStatus::Analyzing);
        assert_eq!(item.subject, Subject::Math);
        assert_eq!(item.image.file_name, "a.png");
    }

    #[test]
    fn intake_mode_parse() {
        assert_eq!("Single".parse::<IntakeMode>().unwrap(), IntakeMode::Single);
        assert!("many".parse::<IntakeMode>().is_err());
    }

    #[tokio::test]
    async fn from_path_reads_bytes() {
        let dir = std::env::temp_dir().join(format!("studysnap-intake-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("page.png");
        tokio::fs::write(&path, b"png!").await.unwrap();

        let uploaded = UploadedFile::from_path(&path).await.unwrap();
        assert_eq!(uploaded.file_name, "page.png");
        assert_eq!(uploaded.declared_type(), "image/png");
        assert_eq!(&uploaded.bytes[..], b"png!");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
