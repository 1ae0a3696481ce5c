use crate::{
    decode::Step,
    error::{ClientError, ClientResult, Operation},
    model::{Guess, QuestionAnswer, StepOutcome},
};

/// Step counter of a freshly started session.
pub const INITIAL_STEP: &str = "0";

/// Where a session stands in the remote state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Questioning,
    Answered,
    Terminated,
}

/// Tokens that accompany every request after the session was started.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionCursor {
    pub step: String,
    pub progression: String,
    pub signature: String,
    pub session: String,
    pub identifier: String,
    pub question: String,
}

impl SessionCursor {
    /// Errors on the first empty field. A cursor that fails this check must not be used.
    pub fn validate(&self, operation: Operation) -> ClientResult<()> {
        let fields = [
            ("step", &self.step),
            ("progression", &self.progression),
            ("signature", &self.signature),
            ("session", &self.session),
            ("identifier", &self.identifier),
            ("question", &self.question),
        ];

        match fields.iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(ClientError::protocol(
                operation,
                format!("{name} cannot be empty"),
            )),
            None => Ok(()),
        }
    }

    pub fn is_initial(&self) -> bool {
        self.step == INITIAL_STEP
    }

    /// The cursor after moving to `step`, checked before anything is replaced.
    pub fn advanced(&self, operation: Operation, step: &Step) -> ClientResult<Self> {
        let cursor = Self {
            step: step.step.clone(),
            progression: step.progression.clone(),
            question: step.question.clone(),
            ..self.clone()
        };
        cursor.validate(operation)?;

        Ok(cursor)
    }

    pub fn progress(&self) -> f64 {
        self.progression.trim().parse().unwrap_or(0.0)
    }
}

/// Cursor, history and held guess of one session. Both protocol variants
/// decode their responses into [`Step`]s and hand them over here, so the
/// state transitions are the same regardless of the wire format.
#[derive(Debug, Clone)]
pub(crate) struct SessionCore {
    pub cursor: SessionCursor,
    pub history: Vec<QuestionAnswer>,
    pub state: SessionState,
    pub held: Option<Guess>,
}

impl SessionCore {
    pub fn new(cursor: SessionCursor) -> Self {
        Self {
            cursor,
            history: Vec::new(),
            state: SessionState::Questioning,
            held: None,
        }
    }

    pub fn ensure_active(&self, operation: Operation) -> ClientResult<()> {
        match self.state {
            SessionState::Terminated => Err(ClientError::state(
                operation,
                "the session was already finished",
            )),
            _ => Ok(()),
        }
    }

    /// Answers are only taken while a question is pending. A held guess has
    /// to be accepted, declined or undone first.
    pub fn ensure_questioning(&self, operation: Operation) -> ClientResult<()> {
        match self.state {
            SessionState::Questioning => Ok(()),
            state => Err(ClientError::state(
                operation,
                format!("cannot answer while {state}"),
            )),
        }
    }

    pub fn ensure_answered(&self, operation: Operation) -> ClientResult<&Guess> {
        match (self.state, &self.held) {
            (SessionState::Answered, Some(guess)) => Ok(guess),
            (state, _) => Err(ClientError::state(
                operation,
                format!("no guess is held while {state}"),
            )),
        }
    }

    /// Applies the response to an answer and records it in the history.
    pub fn record_answer(
        &mut self,
        operation: Operation,
        answer: String,
        step: Step,
    ) -> ClientResult<StepOutcome> {
        let entry = QuestionAnswer {
            question: self.cursor.question.clone(),
            answer,
        };
        let outcome = self.apply(operation, step)?;
        self.history.push(entry);

        Ok(outcome)
    }

    /// Applies the response to an undo. An empty history stays empty.
    pub fn rewind(&mut self, operation: Operation, step: Step) -> ClientResult<()> {
        self.cursor = self.cursor.advanced(operation, &step)?;
        self.held = None;
        self.state = SessionState::Questioning;
        self.history.pop();

        Ok(())
    }

    /// Takes back the answer that produced the held guess. A proposition
    /// never moves the cursor, so there is nothing to ask the service.
    pub fn withdraw(&mut self) {
        self.held = None;
        self.state = SessionState::Questioning;
        self.history.pop();
    }

    /// Applies the response to a declined guess.
    pub fn resume(&mut self, operation: Operation, step: Step) -> ClientResult<StepOutcome> {
        self.apply(operation, step)
    }

    pub fn finish(&mut self) {
        self.state = SessionState::Terminated;
    }

    fn apply(&mut self, operation: Operation, step: Step) -> ClientResult<StepOutcome> {
        match step.guess {
            Some(mut guess) => {
                if guess.probability <= 0.0 {
                    guess.probability = self.cursor.progress();
                }
                tracing::info!("Service proposed `{}`", guess.name);
                self.held = Some(guess.clone());
                self.state = SessionState::Answered;

                Ok(StepOutcome::AnswerFound(guess))
            }
            None => {
                self.cursor = self.cursor.advanced(operation, &step)?;
                self.held = None;
                self.state = SessionState::Questioning;

                Ok(StepOutcome::Question(step.question))
            }
        }
    }
}
