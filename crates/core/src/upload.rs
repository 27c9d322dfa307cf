//! Upload Coordinator
//!
//! Sends the user's local files to the service in a single request and, on
//! success, moves the flow to topic selection with the names the service
//! assigned. A failed upload never navigates; the user retries.

use crate::error::{ClientError, Result};
use crate::flow::Route;
use crate::models::{FileRefs, NoteFormat};
use crate::resource::Resource;
use crate::service::TutorService;
use std::path::Path;
use tracing::{info, instrument, warn};

pub const UPLOAD_FAILED: &str = "Upload failed";

/// A file read from local disk, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Reads a file from disk, keeping only its final path component as the name.
    pub async fn read(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ClientError::precondition(format!("'{}' is not a file name", path.display()))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::precondition(format!("Could not read '{}': {}", path.display(), e))
        })?;
        Ok(Self::new(filename, bytes))
    }

    pub fn format(&self) -> NoteFormat {
        NoteFormat::from_filename(&self.filename)
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Default)]
pub struct UploadCoordinator {
    status: Resource<FileRefs>,
}

impl UploadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &Resource<FileRefs> {
        &self.status
    }

    /// Uploads every file in one request and returns the topic-selection route.
    #[instrument(skip_all, fields(count = files.len()))]
    pub async fn upload(
        &mut self,
        service: &dyn TutorService,
        files: Vec<LocalFile>,
    ) -> Result<Route> {
        if files.is_empty() {
            return Err(ClientError::precondition("Select at least one file to upload"));
        }
        if let Some(rejected) = files.iter().find(|f| !f.format().is_uploadable()) {
            return Err(ClientError::precondition(format!(
                "'{}' is not a supported note format (txt, md, csv, docx, jpg, jpeg, png, gif, webp)",
                rejected.filename
            )));
        }

        self.status = Resource::Loading;
        let result = service
            .upload_notes(files)
            .await
            .and_then(|names| {
                if names.is_empty() {
                    Err(ClientError::MalformedResponse(
                        "upload response listed no filenames".to_string(),
                    ))
                } else {
                    Ok(FileRefs::new(names))
                }
            });

        match result {
            Ok(file_refs) => {
                info!(files = ?file_refs.as_slice(), "Upload complete");
                self.status = Resource::Ready(file_refs.clone());
                Ok(Route::Topics { file_refs })
            }
            Err(e) => {
                warn!(error = %e, "Upload failed");
                self.status = Resource::Failed(e.user_message(UPLOAD_FAILED));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MockTutorService;
    use std::io::Write;

    #[tokio::test]
    async fn test_upload_navigates_with_server_names() {
        let mut service = MockTutorService::new();
        service
            .expect_upload_notes()
            .withf(|files| files.len() == 2 && files[0].filename == "notes.txt")
            .times(1)
            .returning(|_| Ok(vec!["notes.txt".to_string(), "table_1.csv".to_string()]));

        let mut coordinator = UploadCoordinator::new();
        let route = coordinator
            .upload(
                &service,
                vec![
                    LocalFile::new("notes.txt", b"hello".to_vec()),
                    LocalFile::new("table.csv", b"a,b".to_vec()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            route,
            Route::Topics {
                file_refs: FileRefs::new(vec!["notes.txt".into(), "table_1.csv".into()])
            }
        );
    }

    #[tokio::test]
    async fn test_upload_requires_files() {
        let service = MockTutorService::new();
        let mut coordinator = UploadCoordinator::new();

        let err = coordinator.upload(&service, vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_formats_locally() {
        let service = MockTutorService::new();
        let mut coordinator = UploadCoordinator::new();

        let err = coordinator
            .upload(&service, vec![LocalFile::new("scan.bmp", vec![1, 2])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("scan.bmp"));
    }

    #[tokio::test]
    async fn test_failed_upload_does_not_navigate() {
        let mut service = MockTutorService::new();
        service.expect_upload_notes().returning(|_| {
            Err(ClientError::Backend {
                status: 400,
                message: "No file part".to_string(),
            })
        });

        let mut coordinator = UploadCoordinator::new();
        let result = coordinator
            .upload(&service, vec![LocalFile::new("notes.md", b"# x".to_vec())])
            .await;

        assert!(result.is_err());
        assert_eq!(coordinator.status().error(), Some("No file part"));
    }

    #[tokio::test]
    async fn test_empty_filename_list_is_malformed() {
        let mut service = MockTutorService::new();
        service.expect_upload_notes().returning(|_| Ok(vec![]));

        let mut coordinator = UploadCoordinator::new();
        let err = coordinator
            .upload(&service, vec![LocalFile::new("notes.md", b"# x".to_vec())])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_read_local_file() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "Mitochondria are the powerhouse.").unwrap();

        let local = LocalFile::read(file.path()).await.unwrap();
        assert!(local.filename.ends_with(".txt"));
        assert_eq!(local.format(), NoteFormat::Txt);
        assert_eq!(local.size_bytes(), 32);
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let err = LocalFile::read(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
    }
}
