pub mod config;
pub mod decode;
pub mod error;
pub mod game;
pub mod model;
pub mod session;
pub mod theme;
pub mod transport;

pub use config::{ClientConfig, Language, Protocol};
pub use error::{ClientError, ClientResult, Operation};
pub use game::{Game, GameOptions, GameSession, LegacyClient, QueryClient};
pub use model::{Guess, QuestionAnswer, Reply, StepOutcome};
pub use session::{SessionCursor, SessionState};
pub use theme::{Theme, ThemeKind, ThemeRegistry, ThemeSelection};
pub use transport::Transport;
