pub mod legacy;
pub mod query;

use async_trait::async_trait;
use enum_dispatch::enum_dispatch;

use crate::{
    config::{ClientConfig, Protocol},
    error::{ClientError, ClientResult},
    model::{Guess, QuestionAnswer, StepOutcome},
    session::{SessionCursor, SessionState},
    theme::{ThemeRegistry, ThemeSelection},
    transport::Transport,
};

pub use legacy::LegacyClient;
pub use query::QueryClient;

/// One running game, whatever protocol it speaks.
///
/// Operations that talk to the service take `&mut self`: a session must not
/// be driven from two places at once. A failed call leaves the cursor as it
/// was before the call.
#[async_trait]
#[enum_dispatch]
pub trait Game: Send {
    /// The question currently asked.
    fn question(&self) -> &str;

    /// Answer labels for the current question, in wire order.
    fn options(&self) -> Vec<String>;

    /// Answers the current question with the option at `index`. Refused
    /// while a guess is held.
    async fn select_option(&mut self, index: usize) -> ClientResult<StepOutcome>;

    /// Takes back the most recent answer. A held guess is withdrawn locally,
    /// and at the first step there is nothing to take back.
    async fn undo(&mut self) -> ClientResult<()>;

    /// All guesses with a positive probability, as ranked by the service.
    async fn list_guesses(&mut self) -> ClientResult<Vec<Guess>>;

    /// The highest ranked guess.
    async fn guess(&mut self) -> ClientResult<Guess> {
        self.list_guesses()
            .await?
            .into_iter()
            .next()
            .ok_or(ClientError::NoGuess)
    }

    /// Accepts the held guess and ends the session.
    async fn accept_answer(&mut self) -> ClientResult<()>;

    /// Rejects the held guess and goes back to questioning.
    async fn decline_answer(&mut self) -> ClientResult<()>;

    fn progress(&self) -> f64;

    fn history(&self) -> &[QuestionAnswer];

    fn state(&self) -> SessionState;

    /// The guess proposed by the service, if any.
    fn answer(&self) -> Option<&Guess>;

    fn is_answered(&self) -> bool {
        self.answer().is_some()
    }

    fn cursor(&self) -> &SessionCursor;
}

#[enum_dispatch(Game)]
#[derive(Debug, strum::Display)]
pub enum GameSession {
    Legacy(LegacyClient),
    Query(QueryClient),
}

/// Everything needed to start a game besides the transport.
#[derive(Debug, Clone, Default)]
pub struct GameOptions {
    pub theme: ThemeSelection,
    pub child_mode: bool,
    pub protocol: Protocol,
    /// Used for the query protocol when the theme list is unavailable.
    pub default_ws_url: Option<String>,
}

impl GameOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            theme: config.theme.into(),
            child_mode: config.child_mode,
            protocol: config.protocol,
            default_ws_url: config.default_ws_url.clone(),
        }
    }
}

impl GameSession {
    /// Starts a session with the protocol named in `options`.
    ///
    /// Themes are looked up through `registry` only when needed; a failed
    /// lookup falls back to the built-in theme instead of failing the start.
    pub async fn start(
        transport: Transport,
        registry: &mut ThemeRegistry,
        options: &GameOptions,
    ) -> ClientResult<Self> {
        let default_ws_url = options.default_ws_url.as_deref();

        let session: GameSession = match options.protocol {
            Protocol::Legacy => {
                // The legacy protocol only needs the subject id.
                let theme = match &options.theme {
                    ThemeSelection::Kind(kind) => kind.fallback(default_ws_url),
                    selection => registry.select(selection, default_ws_url).await,
                };
                LegacyClient::start(transport, theme, options.child_mode)
                    .await?
                    .into()
            }
            Protocol::Query => {
                let theme = registry.select(&options.theme, default_ws_url).await;
                QueryClient::start(transport, theme, options.child_mode)
                    .await?
                    .into()
            }
        };

        Ok(session)
    }
}
