use async_trait::async_trait;
use http::StatusCode;
use tracing::{debug, info, instrument};

use super::Game;
use crate::{
    decode,
    error::{ClientError, ClientResult, Operation},
    model::{Guess, QuestionAnswer, Reply, StepOutcome},
    session::{SessionCore, SessionCursor, SessionState},
    theme::Theme,
    transport::Transport,
};

const CANCEL_ANSWER: &str = "-1";

/// Session client for the form-posting protocol. The game starts from an
/// HTML page and every later step is a flat JSON object.
#[derive(Debug)]
pub struct LegacyClient {
    transport: Transport,
    theme: Theme,
    child_mode: bool,
    core: SessionCore,
}

impl LegacyClient {
    #[instrument(skip(transport))]
    pub async fn start(
        transport: Transport,
        theme: Theme,
        child_mode: bool,
    ) -> ClientResult<Self> {
        let operation = Operation::StartGame;
        let form = [
            ("sid", theme.subject_id.clone()),
            ("cm", child_mode.to_string()),
        ];

        let page = transport
            .post_form(operation, &transport.url("/game"), &form)
            .await?;
        let cursor = decode::parse_game_page(operation, &page)?;
        info!("Started legacy session {}", cursor.session);

        Ok(Self {
            transport,
            theme,
            child_mode,
            core: SessionCore::new(cursor),
        })
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub async fn reply(&mut self, reply: Reply) -> ClientResult<StepOutcome> {
        self.select_option(reply.index()).await
    }

    fn answer_form(&self, answer: &str) -> [(&'static str, String); 8] {
        let cursor = &self.core.cursor;
        [
            ("step", cursor.step.clone()),
            ("progression", cursor.progression.clone()),
            ("sid", self.theme.subject_id.clone()),
            ("cm", self.child_mode.to_string()),
            ("answer", answer.to_owned()),
            ("step_last_proposition", String::new()),
            ("session", cursor.session.clone()),
            ("signature", cursor.signature.clone()),
        ]
    }

    fn undo_form(&self) -> [(&'static str, String); 7] {
        let cursor = &self.core.cursor;
        [
            ("step", cursor.step.clone()),
            ("progression", cursor.progression.clone()),
            ("sid", self.theme.subject_id.clone()),
            ("cm", self.child_mode.to_string()),
            ("answer", CANCEL_ANSWER.to_owned()),
            ("session", cursor.session.clone()),
            ("signature", cursor.signature.clone()),
        ]
    }

    fn accept_form(&self, guess: &Guess) -> [(&'static str, String); 9] {
        let cursor = &self.core.cursor;
        [
            ("sid", self.theme.subject_id.clone()),
            ("pid", guess.id.clone()),
            ("identifiant", cursor.identifier.clone()),
            ("pflag_photo", "1".to_owned()),
            ("charac_name", guess.name.clone()),
            ("charac_desc", guess.description.clone()),
            ("session", cursor.session.clone()),
            ("signature", cursor.signature.clone()),
            ("step", cursor.step.clone()),
        ]
    }

    fn decline_form(&self) -> [(&'static str, String); 6] {
        let cursor = &self.core.cursor;
        [
            ("step", cursor.step.clone()),
            ("sid", self.theme.subject_id.clone()),
            ("cm", self.child_mode.to_string()),
            ("progression", cursor.progression.clone()),
            ("session", cursor.session.clone()),
            ("signature", cursor.signature.clone()),
        ]
    }
}

#[async_trait]
impl Game for LegacyClient {
    fn question(&self) -> &str {
        &self.core.cursor.question
    }

    fn options(&self) -> Vec<String> {
        Reply::labels()
    }

    #[instrument(skip(self))]
    async fn select_option(&mut self, index: usize) -> ClientResult<StepOutcome> {
        let operation = Operation::SubmitAnswer;
        self.core.ensure_questioning(operation)?;

        let reply = Reply::from_index(index).ok_or_else(|| {
            ClientError::state(operation, format!("answer index {index} is out of range"))
        })?;

        let url = self.transport.url("/answer");
        let body = self
            .transport
            .post_form(operation, &url, &self.answer_form(&reply.code()))
            .await?;
        let step = decode::decode_step(operation, &body)?;

        self.core
            .record_answer(operation, reply.as_ref().to_owned(), step)
    }

    #[instrument(skip(self))]
    async fn undo(&mut self) -> ClientResult<()> {
        let operation = Operation::Undo;
        self.core.ensure_active(operation)?;

        if self.core.state == SessionState::Answered {
            debug!("Withdrawing the held guess");
            self.core.withdraw();
            return Ok(());
        }

        if self.core.cursor.is_initial() {
            debug!("Nothing to undo at the first step");
            return Ok(());
        }

        let url = self.transport.url("/cancel_answer");
        let body = self
            .transport
            .post_form(operation, &url, &self.undo_form())
            .await?;
        let step = decode::decode_step(operation, &body)?;

        self.core.rewind(operation, step)
    }

    /// The legacy protocol has no ranking endpoint; the only known guess is
    /// the one the service proposed.
    async fn list_guesses(&mut self) -> ClientResult<Vec<Guess>> {
        Ok(self.core.held.iter().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn accept_answer(&mut self) -> ClientResult<()> {
        let operation = Operation::AcceptAnswer;
        let guess = self.core.ensure_answered(operation)?;

        let form = self.accept_form(guess);
        let status = self
            .transport
            .post_form_status(operation, &self.transport.url("/choice"), &form)
            .await?;

        if status != StatusCode::OK {
            return Err(ClientError::protocol(
                operation,
                format!("unexpected status {status}"),
            ));
        }

        self.core.finish();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn decline_answer(&mut self) -> ClientResult<()> {
        let operation = Operation::DeclineAnswer;
        self.core.ensure_answered(operation)?;

        let url = self.transport.url("/exclude");
        let body = self
            .transport
            .post_form(operation, &url, &self.decline_form())
            .await?;
        let step = decode::decode_step(operation, &body)?;

        self.core.resume(operation, step).map(|_| ())
    }

    fn progress(&self) -> f64 {
        self.core.cursor.progress()
    }

    fn history(&self) -> &[QuestionAnswer] {
        &self.core.history
    }

    fn state(&self) -> SessionState {
        self.core.state
    }

    fn answer(&self) -> Option<&Guess> {
        self.core.held.as_ref()
    }

    fn cursor(&self) -> &SessionCursor {
        &self.core.cursor
    }
}
