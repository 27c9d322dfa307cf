//! Console Driver
//!
//! Owns the current [`Route`] and runs one view at a time: upload, topics,
//! the teaching session, evaluation, and the vault. Input is read line by
//! line; lines starting with `/` are commands, anything else is an answer,
//! a topic, or a choice from a numbered list.

use crate::terminal;
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use teachit_core::error::ClientError;
use teachit_core::evaluation::EvaluationPresenter;
use teachit_core::flow::{EvaluationHandoff, Route};
use teachit_core::models::{FileRefs, Role, SessionHandle};
use teachit_core::resource::Resource;
use teachit_core::service::TutorService;
use teachit_core::session::{SessionController, SessionState};
use teachit_core::study::ANALYSIS_FAILED;
use teachit_core::topics::TopicSelector;
use teachit_core::upload::{LocalFile, UPLOAD_FAILED, UploadCoordinator};
use teachit_core::vault::NotesVault;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

const QUIT: &str = "/quit";
const START_FAILED: &str = "Failed to start session";

pub struct Console<R, W> {
    service: Arc<dyn TutorService>,
    input: R,
    output: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(service: Arc<dyn TutorService>, input: R, output: W) -> Self {
        Self {
            service,
            input,
            output,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs the whole learning flow for `files`, from upload to evaluation.
    pub async fn teach(&mut self, files: Vec<LocalFile>) -> Result<()> {
        let Some(mut route) = self.welcome(files).await? else {
            return Ok(());
        };
        loop {
            info!(view = route.name(), "Entering view");
            let next = match route {
                Route::Welcome => {
                    terminal::hint(
                        &mut self.output,
                        "All done. Run `teachit teach <FILES>` to start a new session.",
                    )?;
                    return Ok(());
                }
                Route::Topics { file_refs } => self.topics(file_refs).await?,
                Route::Vault {
                    file_refs,
                    selected,
                } => self.vault(file_refs, selected, false).await?,
                Route::Chat(handle) => self.chat(handle).await?,
                Route::Evaluate(handoff) => self.evaluate(handoff).await?,
            };
            match next {
                Some(next) => route = next,
                None => return Ok(()),
            }
        }
    }

    /// Opens the vault on its own, outside the learning flow.
    pub async fn browse(&mut self, selected: Option<String>, study: bool) -> Result<()> {
        self.vault(FileRefs::default(), selected, study).await?;
        Ok(())
    }

    /// Reads one line. `None` on end of input or `/quit`.
    async fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{} ", label)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .await
            .context("Failed to read input")?;
        if read == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        if line.trim() == QUIT {
            return Ok(None);
        }
        Ok(Some(line))
    }

    async fn welcome(&mut self, files: Vec<LocalFile>) -> Result<Option<Route>> {
        let service = Arc::clone(&self.service);
        let mut coordinator = UploadCoordinator::new();
        terminal::heading(&mut self.output, "Upload")?;

        loop {
            writeln!(self.output, "Uploading {} file(s)...", files.len())?;
            match coordinator.upload(service.as_ref(), files.clone()).await {
                Ok(route) => return Ok(Some(route)),
                Err(e) if !e.is_retryable() => {
                    return Err(e).context("Cannot upload these files");
                }
                Err(_) => {
                    let message = coordinator.status().error().unwrap_or(UPLOAD_FAILED);
                    terminal::error(&mut self.output, message)?;
                    if self.prompt("Press Enter to retry:").await?.is_none() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn topics(&mut self, file_refs: FileRefs) -> Result<Option<Route>> {
        let service = Arc::clone(&self.service);
        let mut selector = TopicSelector::new(file_refs);
        terminal::heading(&mut self.output, "Choose a topic")?;
        selector.load_topics(service.as_ref()).await;

        let mut show = true;
        loop {
            if show {
                match selector.topics() {
                    Resource::Ready(topics) => terminal::topics(&mut self.output, topics)?,
                    Resource::Failed(message) => terminal::error(&mut self.output, message)?,
                    Resource::Idle | Resource::Loading => {}
                }
                terminal::hint(
                    &mut self.output,
                    "Enter a number or type your own topic. /vault opens your notes, /reload asks again.",
                )?;
                show = false;
            }

            let Some(line) = self.prompt("topic>").await? else {
                return Ok(None);
            };
            let line = line.trim();
            let result = match line {
                "" => continue,
                "/reload" => {
                    selector.load_topics(service.as_ref()).await;
                    show = true;
                    continue;
                }
                "/vault" => return Ok(Some(selector.open_vault())),
                _ => {
                    let listed = line
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|index| selector.topics().ready()?.get(index).cloned());
                    match listed {
                        Some(topic) => selector.select_topic(service.as_ref(), &topic).await,
                        None => selector.select_custom_topic(service.as_ref(), line).await,
                    }
                }
            };
            match result {
                Ok(route) => return Ok(Some(route)),
                Err(e) => terminal::error(&mut self.output, &e.user_message(START_FAILED))?,
            }
        }
    }

    /// Prints teacher messages added since `shown` and returns the new count.
    fn show_new_messages(
        &mut self,
        controller: &SessionController,
        shown: usize,
    ) -> Result<usize> {
        let messages = controller.messages();
        for message in messages.iter().skip(shown).filter(|m| m.role == Role::Teacher) {
            terminal::message(&mut self.output, message)?;
        }
        Ok(messages.len())
    }

    fn show_last_error(&mut self, controller: &SessionController) -> Result<()> {
        if let Some(e) = controller.last_error() {
            terminal::error(&mut self.output, &e.user_message("Something went wrong"))?;
        }
        Ok(())
    }

    async fn chat(&mut self, handle: SessionHandle) -> Result<Option<Route>> {
        let service = Arc::clone(&self.service);
        terminal::heading(&mut self.output, &format!("Teach me: {}", handle.topic))?;
        terminal::hint(
            &mut self.output,
            "Answer as if you were the teacher. /quit leaves the session.",
        )?;

        let mut controller = SessionController::new(handle);
        let mut shown = 0;
        loop {
            if controller.state() == SessionState::Uninitialized
                && controller.start(service.as_ref()).await.is_err()
            {
                self.show_last_error(&controller)?;
                if self.prompt("Press Enter to retry:").await?.is_none() {
                    return Ok(None);
                }
                continue;
            }
            shown = self.show_new_messages(&controller, shown)?;

            if controller.is_finished() {
                terminal::hint(
                    &mut self.output,
                    "/evaluate grades your explanations, /continue asks more questions.",
                )?;
                let Some(line) = self.prompt("done>").await? else {
                    return Ok(None);
                };
                match line.trim() {
                    "/evaluate" => match controller.exit_to_evaluation() {
                        Ok(route) => return Ok(Some(route)),
                        Err(unfinished) => controller = unfinished,
                    },
                    "/continue" => {
                        if controller.continue_session(service.as_ref()).await.is_err() {
                            self.show_last_error(&controller)?;
                        }
                    }
                    _ => {}
                }
                continue;
            }

            let Some(line) = self.prompt("you>").await? else {
                return Ok(None);
            };
            if matches!(line.trim(), "/evaluate" | "/continue") {
                terminal::hint(&mut self.output, "Finish the current questions first.")?;
                continue;
            }
            if controller
                .submit_answer(service.as_ref(), &line)
                .await
                .is_err()
            {
                self.show_last_error(&controller)?;
            }
        }
    }

    async fn evaluate(&mut self, handoff: EvaluationHandoff) -> Result<Option<Route>> {
        let service = Arc::clone(&self.service);
        let mut presenter = EvaluationPresenter::new(handoff);
        terminal::heading(&mut self.output, "Evaluation")?;

        loop {
            if let Some(redirect) = presenter.fetch(service.as_ref()).await {
                return Ok(Some(redirect));
            }
            match presenter.result() {
                Resource::Ready(result) => {
                    terminal::evaluation(&mut self.output, result)?;
                    break;
                }
                Resource::Failed(message) => {
                    terminal::error(&mut self.output, message)?;
                    if self.prompt("Press Enter to retry:").await?.is_none() {
                        return Ok(None);
                    }
                }
                Resource::Idle | Resource::Loading => break,
            }
        }

        if self.prompt("Press Enter to finish:").await?.is_none() {
            return Ok(None);
        }
        Ok(Some(presenter.finish()))
    }

    async fn vault(
        &mut self,
        file_refs: FileRefs,
        selected: Option<String>,
        study: bool,
    ) -> Result<Option<Route>> {
        let service = Arc::clone(&self.service);
        let can_go_back = !file_refs.is_empty();
        let mut vault = NotesVault::new(file_refs, selected);
        terminal::heading(&mut self.output, "Notes vault")?;

        vault.refresh(service.as_ref()).await;
        self.show_files(&vault)?;
        if vault.selected().is_some() {
            self.open_note(&mut vault, service.as_ref()).await?;
        }
        if study {
            self.study(&mut vault, service.as_ref()).await?;
        }

        let help = if can_go_back {
            "Enter a number to open a note. /study analyzes it, /plain leaves study mode, /list refreshes, /back returns to topics."
        } else {
            "Enter a number to open a note. /study analyzes it, /plain leaves study mode, /list refreshes."
        };
        loop {
            terminal::hint(&mut self.output, help)?;
            let Some(line) = self.prompt("vault>").await? else {
                return Ok(None);
            };
            match line.trim() {
                "" => {}
                "/back" if can_go_back => return Ok(Some(vault.back())),
                "/list" => {
                    vault.refresh(service.as_ref()).await;
                    self.show_files(&vault)?;
                }
                "/study" => self.study(&mut vault, service.as_ref()).await?,
                "/plain" => {
                    vault.exit_study_mode();
                    self.show_note(&vault)?;
                }
                other => {
                    let picked = other
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|index| vault.files().ready()?.get(index))
                        .map(|file| file.filename.clone());
                    match picked {
                        Some(filename) => {
                            vault.select(filename);
                            self.open_note(&mut vault, service.as_ref()).await?;
                        }
                        None => {
                            let message = format!("Unknown choice '{}'", other);
                            terminal::error(&mut self.output, &message)?;
                        }
                    }
                }
            }
        }
    }

    fn show_files(&mut self, vault: &NotesVault) -> Result<()> {
        match vault.files() {
            Resource::Ready(files) => {
                terminal::vault_files(&mut self.output, files, vault.selected())?
            }
            Resource::Failed(message) => terminal::error(&mut self.output, message)?,
            Resource::Idle | Resource::Loading => {}
        }
        Ok(())
    }

    fn show_note(&mut self, vault: &NotesVault) -> Result<()> {
        if let Some(filename) = vault.selected() {
            terminal::heading(&mut self.output, filename)?;
        }
        if let Some(message) = vault.note().error() {
            terminal::error(&mut self.output, message)?;
        }
        if let Some(rendered) = vault.render() {
            terminal::rendered(&mut self.output, &rendered)?;
        }
        Ok(())
    }

    async fn open_note(
        &mut self,
        vault: &mut NotesVault,
        service: &dyn TutorService,
    ) -> Result<()> {
        if let Err(ClientError::Precondition(message)) = vault.load_selected(service).await {
            terminal::error(&mut self.output, &message)?;
            return Ok(());
        }
        self.show_note(vault)
    }

    async fn study(&mut self, vault: &mut NotesVault, service: &dyn TutorService) -> Result<()> {
        match vault.analyze(service).await {
            Ok(()) => self.show_note(vault),
            Err(ClientError::Precondition(message)) => {
                terminal::error(&mut self.output, &message)?;
                Ok(())
            }
            Err(_) => {
                let message = vault.study().error().unwrap_or(ANALYSIS_FAILED);
                terminal::error(&mut self.output, message)?;
                Ok(())
            }
        }
    }
}
