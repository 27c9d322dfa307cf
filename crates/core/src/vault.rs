//! Notes Vault
//!
//! Lists every uploaded note, shows the selected one through the content
//! renderer, and offers study mode for text notes.

use crate::error::{ClientError, Result};
use crate::flow::Route;
use crate::models::{FileRefs, NoteContent, UploadedFile};
use crate::render::{Rendered, render};
use crate::resource::{Resource, Ticket, Tracked};
use crate::service::TutorService;
use crate::study::StudyAnalysisView;
use tracing::{debug, instrument, warn};

pub const FILES_FAILED: &str = "Failed to load file list";
pub const NOTE_FAILED: &str = "Failed to load file content";

#[derive(Debug)]
pub struct NotesVault {
    file_refs: FileRefs,
    files: Resource<Vec<UploadedFile>>,
    selected: Option<String>,
    note: Tracked<NoteContent>,
    study: StudyAnalysisView,
}

impl NotesVault {
    pub fn new(file_refs: FileRefs, selected: Option<String>) -> Self {
        Self {
            file_refs,
            files: Resource::Idle,
            selected,
            note: Tracked::new(),
            study: StudyAnalysisView::new(),
        }
    }

    pub fn files(&self) -> &Resource<Vec<UploadedFile>> {
        &self.files
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn note(&self) -> &Resource<NoteContent> {
        self.note.state()
    }

    pub fn study(&self) -> &StudyAnalysisView {
        &self.study
    }

    /// Reloads the file list. Selects the first file if nothing is selected yet.
    #[instrument(skip_all)]
    pub async fn refresh(&mut self, service: &dyn TutorService) {
        self.files = Resource::Loading;
        let result = service.list_vault().await;
        if let Err(e) = &result {
            warn!(error = %e, "Failed to fetch vault files");
        }
        self.files = Resource::from_result(result, FILES_FAILED);

        if self.selected.is_none() {
            if let Some(first) = self.files.ready().and_then(|files| files.first()) {
                debug!(filename = %first.filename, "Selecting first file");
                self.selected = Some(first.filename.clone());
            }
        }
    }

    /// Changes the selection. Any loaded note, pending load, or analysis is dropped.
    pub fn select(&mut self, filename: impl Into<String>) {
        self.selected = Some(filename.into());
        self.note.reset();
        self.study.exit_study_mode();
    }

    /// Starts loading the selected note. Pair with [`Self::finish_load`].
    pub fn begin_load(&mut self) -> Option<(Ticket, String)> {
        let filename = self.selected.clone()?;
        Some((self.note.begin(), filename))
    }

    /// Applies a note load. Returns `false` if the selection changed meanwhile.
    pub fn finish_load(&mut self, ticket: Ticket, result: Result<NoteContent>) -> bool {
        self.note.settle(ticket, result, NOTE_FAILED)
    }

    /// Fetches the content of the selected note.
    #[instrument(skip_all, fields(selected = ?self.selected))]
    pub async fn load_selected(&mut self, service: &dyn TutorService) -> Result<()> {
        let Some((ticket, filename)) = self.begin_load() else {
            return Err(ClientError::precondition("No file selected"));
        };
        let result = service.fetch_note(&filename).await;
        let outcome = match &result {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(%filename, error = %e, "Failed to fetch note");
                Err(e.clone())
            }
        };
        self.finish_load(ticket, result);
        outcome
    }

    /// Analyzes the loaded note and enters study mode.
    pub async fn analyze(&mut self, service: &dyn TutorService) -> Result<()> {
        let Some(note) = self.note.ready() else {
            return Err(ClientError::precondition("Load a note before studying it"));
        };
        self.study.analyze(service, note).await
    }

    pub fn exit_study_mode(&mut self) {
        self.study.exit_study_mode();
    }

    /// The current note as it should be displayed.
    pub fn render(&self) -> Option<Rendered> {
        self.note
            .ready()
            .map(|note| render(note, self.study.is_active(), self.study.analysis()))
    }

    pub fn back(self) -> Route {
        Route::Topics {
            file_refs: self.file_refs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisResult, NoteFormat};
    use crate::render::Strategy;
    use crate::service::MockTutorService;

    fn listing() -> Vec<UploadedFile> {
        vec![
            UploadedFile {
                filename: "bio.md".to_string(),
                format: NoteFormat::Md,
                size_bytes: 2048,
            },
            UploadedFile {
                filename: "grades.csv".to_string(),
                format: NoteFormat::Csv,
                size_bytes: 120,
            },
        ]
    }

    fn note(filename: &str) -> NoteContent {
        NoteContent {
            filename: filename.to_string(),
            format: NoteFormat::from_filename(filename),
            content: "# Cells\nOsmosis is diffusion of water.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_refresh_selects_first_file() {
        let mut service = MockTutorService::new();
        service.expect_list_vault().times(1).returning(|| Ok(listing()));

        let mut vault = NotesVault::new(FileRefs::default(), None);
        vault.refresh(&service).await;

        assert_eq!(vault.files().ready().map(Vec::len), Some(2));
        assert_eq!(vault.selected(), Some("bio.md"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_existing_selection() {
        let mut service = MockTutorService::new();
        service.expect_list_vault().returning(|| Ok(listing()));

        let mut vault = NotesVault::new(FileRefs::default(), Some("grades.csv".to_string()));
        vault.refresh(&service).await;
        assert_eq!(vault.selected(), Some("grades.csv"));
    }

    #[tokio::test]
    async fn test_refresh_failure_fills_error_slot() {
        let mut service = MockTutorService::new();
        service
            .expect_list_vault()
            .returning(|| Err(ClientError::Transport("refused".to_string())));

        let mut vault = NotesVault::new(FileRefs::default(), None);
        vault.refresh(&service).await;
        assert_eq!(vault.files().error(), Some(FILES_FAILED));
        assert_eq!(vault.selected(), None);
    }

    #[tokio::test]
    async fn test_load_selected_renders_note() {
        let mut service = MockTutorService::new();
        service
            .expect_fetch_note()
            .withf(|filename| filename == "grades.csv")
            .times(1)
            .returning(|_| {
                Ok(NoteContent {
                    filename: "grades.csv".to_string(),
                    format: NoteFormat::Csv,
                    content: "name,grade\nAda,A".to_string(),
                })
            });

        let mut vault = NotesVault::new(FileRefs::default(), Some("grades.csv".to_string()));
        vault.load_selected(&service).await.unwrap();

        let rendered = vault.render().unwrap();
        assert_eq!(rendered.strategy(), Strategy::Table);
    }

    #[tokio::test]
    async fn test_load_without_selection_is_rejected() {
        let service = MockTutorService::new();
        let mut vault = NotesVault::new(FileRefs::default(), None);
        let err = vault.load_selected(&service).await.unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
    }

    #[test]
    fn test_stale_note_is_discarded_after_reselect() {
        let mut vault = NotesVault::new(FileRefs::default(), Some("bio.md".to_string()));
        let (stale, name) = vault.begin_load().unwrap();
        assert_eq!(name, "bio.md");

        vault.select("grades.csv");
        let (current, name) = vault.begin_load().unwrap();
        assert_eq!(name, "grades.csv");

        assert!(!vault.finish_load(stale, Ok(note("bio.md"))));
        assert!(vault.note().is_loading());

        assert!(vault.finish_load(current, Ok(note("grades.csv"))));
        assert_eq!(vault.note().ready().unwrap().filename, "grades.csv");
    }

    #[tokio::test]
    async fn test_study_mode_round_trip() {
        let mut service = MockTutorService::new();
        service.expect_fetch_note().returning(|name| Ok(note(name)));
        service.expect_analyze_note().times(1).returning(|_| {
            Ok(AnalysisResult {
                summary: "Cells move water.".to_string(),
                highlighted_markup: r#"<span class="highlight-definition">Osmosis</span>"#
                    .to_string(),
            })
        });

        let mut vault = NotesVault::new(FileRefs::default(), Some("bio.md".to_string()));
        vault.load_selected(&service).await.unwrap();
        assert_eq!(vault.render().unwrap().strategy(), Strategy::Literal);

        vault.analyze(&service).await.unwrap();
        assert_eq!(vault.render().unwrap().strategy(), Strategy::Study);

        vault.exit_study_mode();
        assert_eq!(vault.render().unwrap().strategy(), Strategy::Literal);
    }

    #[tokio::test]
    async fn test_select_turns_study_mode_off() {
        let mut service = MockTutorService::new();
        service.expect_fetch_note().returning(|name| Ok(note(name)));
        service.expect_analyze_note().returning(|_| {
            Ok(AnalysisResult {
                summary: String::new(),
                highlighted_markup: String::new(),
            })
        });

        let mut vault = NotesVault::new(FileRefs::default(), Some("bio.md".to_string()));
        vault.load_selected(&service).await.unwrap();
        vault.analyze(&service).await.unwrap();
        assert!(vault.study().is_active());

        vault.select("other.txt");
        assert!(!vault.study().is_active());
        assert!(vault.render().is_none());
    }

    #[tokio::test]
    async fn test_analyze_requires_loaded_note() {
        let service = MockTutorService::new();
        let mut vault = NotesVault::new(FileRefs::default(), Some("bio.md".to_string()));
        let err = vault.analyze(&service).await.unwrap_err();
        assert!(matches!(err, ClientError::Precondition(_)));
    }

    #[test]
    fn test_back_returns_to_topics() {
        let refs = FileRefs::new(vec!["bio.md".to_string()]);
        let vault = NotesVault::new(refs.clone(), None);
        assert_eq!(vault.back(), Route::Topics { file_refs: refs });
    }
}
