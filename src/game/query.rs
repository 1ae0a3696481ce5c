use std::collections::BTreeMap;

use async_trait::async_trait;
use http::StatusCode;
use tracing::{debug, info, instrument};

use super::Game;
use crate::{
    decode::{self, Step},
    error::{ClientError, ClientResult, Operation},
    model::{Guess, QuestionAnswer, Reply, StepOutcome},
    session::{SessionCore, SessionCursor, SessionState},
    theme::Theme,
    transport::{correlation_token, Transport},
};

const CANCEL_ANSWER: &str = "-1";

/// Query parameters, encoded in key order like the web client does.
type Params = BTreeMap<&'static str, String>;

/// Session client for the query-parameter protocol, where every response is
/// a JSONP payload.
#[derive(Debug)]
pub struct QueryClient {
    transport: Transport,
    theme: Theme,
    /// Parameters fixed for the lifetime of the session.
    base_params: Params,
    answers: Vec<String>,
    core: SessionCore,
}

impl QueryClient {
    #[instrument(skip(transport))]
    pub async fn start(
        transport: Transport,
        theme: Theme,
        child_mode: bool,
    ) -> ClientResult<Self> {
        let operation = Operation::StartGame;
        if theme.url.is_empty() {
            return Err(ClientError::state(
                operation,
                format!("theme `{}` has no web service url", theme.name),
            ));
        }

        let page = transport
            .get_page(operation, &transport.url("/game"))
            .await?;
        let bootstrap = decode::parse_bootstrap_page(operation, &page)?;

        let base_params = Params::from([
            ("childMod", child_mode.to_string()),
            ("constraint", "ETAT<>'AV'".to_owned()),
            ("frontaddr", bootstrap.frontaddr),
            ("partner", "1".to_owned()),
            ("player", "website-desktop".to_owned()),
            ("question_filter", "''".to_owned()),
            ("soft_constaint", "''".to_owned()),
            ("uid_ext_session", bootstrap.uid_ext_session.clone()),
            ("urlApiWs", theme.url.clone()),
        ]);

        let mut params = base_params.clone();
        params.insert("answer", String::new());
        params.insert("callback", correlation_token());

        let body = transport
            .get_xhr(operation, &transport.url("/new_session"), &params)
            .await?;
        let start = decode::decode_session(operation, &body)?;

        let cursor = SessionCursor {
            step: start.step.step.clone(),
            progression: start.step.progression.clone(),
            signature: start.signature,
            session: start.session,
            identifier: bootstrap.uid_ext_session,
            question: start.step.question.clone(),
        };
        cursor.validate(operation)?;
        info!("Started session {} on {}", cursor.session, theme.name);

        Ok(Self {
            transport,
            theme,
            base_params,
            answers: start.step.answers,
            core: SessionCore::new(cursor),
        })
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    fn params(&self, answer: &str) -> Params {
        let cursor = &self.core.cursor;
        let mut params = self.base_params.clone();

        params.insert("answer", answer.to_owned());
        params.insert("callback", correlation_token());
        params.insert("session", cursor.session.clone());
        params.insert("signature", cursor.signature.clone());
        params.insert("step", cursor.step.clone());

        params
    }

    fn ws_url(&self, path: &str) -> String {
        format!("{}/{path}", self.theme.url.trim_end_matches('/'))
    }

    fn remember_answers(&mut self, step: &Step) {
        if step.guess.is_none() {
            self.answers = step.answers.clone();
        }
    }
}

#[async_trait]
impl Game for QueryClient {
    fn question(&self) -> &str {
        &self.core.cursor.question
    }

    fn options(&self) -> Vec<String> {
        // Answer codes are the same in both protocols, so the fixed labels
        // still address the right options when the step carried none.
        if self.answers.is_empty() {
            Reply::labels()
        } else {
            self.answers.clone()
        }
    }

    #[instrument(skip(self))]
    async fn select_option(&mut self, index: usize) -> ClientResult<StepOutcome> {
        let operation = Operation::SubmitAnswer;
        self.core.ensure_questioning(operation)?;

        let label = self.options().into_iter().nth(index).ok_or_else(|| {
            ClientError::state(operation, format!("answer index {index} is out of range"))
        })?;

        let url = self.transport.url("/answer_api");
        let body = self
            .transport
            .get_xhr(operation, &url, &self.params(&index.to_string()))
            .await?;
        let step = decode::decode_step(operation, &body)?;

        let outcome = self.core.record_answer(operation, label, step.clone())?;
        self.remember_answers(&step);

        Ok(outcome)
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

        let body = self
            .transport
            .get_xhr(
                operation,
                &self.ws_url("cancel_answer"),
                &self.params(CANCEL_ANSWER),
            )
            .await?;
        let step = decode::decode_step(operation, &body)?;

        self.core.rewind(operation, step.clone())?;
        self.answers = step.answers;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_guesses(&mut self) -> ClientResult<Vec<Guess>> {
        let operation = Operation::ListGuesses;
        self.core.ensure_active(operation)?;

        let body = self
            .transport
            .get_xhr(operation, &self.ws_url("list"), &self.params(""))
            .await?;
        let guesses = decode::decode_guesses(operation, &body)?;
        debug!("Service ranked {} guesses", guesses.len());

        Ok(guesses)
    }

    #[instrument(skip(self))]
    async fn accept_answer(&mut self) -> ClientResult<()> {
        let operation = Operation::AcceptAnswer;
        let guess = self.core.ensure_answered(operation)?;

        let mut params = self.params("");
        params.insert("element", guess.id.clone());

        let status = self
            .transport
            .get_xhr_status(operation, &self.ws_url("choice"), &params)
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

        let mut params = self.params(CANCEL_ANSWER);
        params.insert("forward_answer", "1".to_owned());

        let body = self
            .transport
            .get_xhr(operation, &self.ws_url("exclude"), &params)
            .await?;
        let step = decode::decode_step(operation, &body)?;

        self.core.resume(operation, step.clone())?;
        self.remember_answers(&step);

        Ok(())
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
