use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{instrument, warn};

use crate::{
    decode,
    error::{ClientResult, Operation},
    transport::Transport,
};

/// A playable category as advertised by the landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(rename = "translated_theme_name")]
    pub name: String,
    /// Web service root that serves `list`, `cancel_answer` and friends.
    #[serde(rename = "urlWs")]
    pub url: String,
    #[serde(default)]
    pub subject_id: String,
}

/// The built-in categories and their subject ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ThemeKind {
    #[default]
    Characters,
    Objects,
    Animals,
}

impl ThemeKind {
    pub fn subject_id(self) -> &'static str {
        match self {
            ThemeKind::Characters => "1",
            ThemeKind::Objects => "2",
            ThemeKind::Animals => "14",
        }
    }

    /// A theme built without asking the service. `ws_url` may be empty,
    /// which is enough for the legacy protocol.
    pub fn fallback(self, ws_url: Option<&str>) -> Theme {
        Theme {
            name: self.to_string(),
            url: ws_url.unwrap_or_default().to_owned(),
            subject_id: self.subject_id().to_owned(),
        }
    }
}

/// How the caller picked a theme for a new game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeSelection {
    Kind(ThemeKind),
    /// Looked up by display name, case-insensitively.
    Named(String),
    Explicit(Theme),
}

impl Default for ThemeSelection {
    fn default() -> Self {
        Self::Kind(ThemeKind::default())
    }
}

impl From<ThemeKind> for ThemeSelection {
    fn from(kind: ThemeKind) -> Self {
        Self::Kind(kind)
    }
}

impl From<Theme> for ThemeSelection {
    fn from(theme: Theme) -> Self {
        Self::Explicit(theme)
    }
}

/// Caller-held cache of the service's themes, fetched on first use.
#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    transport: Transport,
    themes: Option<Vec<Theme>>,
}

impl ThemeRegistry {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            themes: None,
        }
    }

    /// A registry that never touches the network.
    pub fn preloaded(transport: Transport, themes: Vec<Theme>) -> Self {
        Self {
            transport,
            themes: Some(themes),
        }
    }

    #[instrument(skip(self))]
    pub async fn themes(&mut self) -> ClientResult<&[Theme]> {
        if self.themes.is_none() {
            let url = self.transport.url("/");
            let page = self.transport.get_page(Operation::ListThemes, &url).await?;
            let themes = decode::parse_theme_page(Operation::ListThemes, &page)?;
            tracing::debug!("Loaded {} themes", themes.len());

            self.themes = Some(themes);
        }

        Ok(self.themes.as_deref().unwrap_or_default())
    }

    /// Best-effort lookup. Failures are logged and yield `None`.
    pub async fn resolve(&mut self, name: &str) -> Option<Theme> {
        match self.themes().await {
            Ok(themes) => {
                let found = themes
                    .iter()
                    .find(|theme| theme.name.eq_ignore_ascii_case(name))
                    .cloned();
                if found.is_none() {
                    warn!("Theme `{name}` is not offered by the service");
                }
                found
            }
            Err(err) => {
                warn!("Could not resolve theme `{name}`: {err}");
                None
            }
        }
    }

    /// Turns a selection into a concrete theme, falling back to the built-in
    /// definitions when the service cannot be asked.
    pub async fn select(
        &mut self,
        selection: &ThemeSelection,
        default_ws_url: Option<&str>,
    ) -> Theme {
        match selection {
            ThemeSelection::Explicit(theme) => theme.clone(),
            ThemeSelection::Kind(kind) => match self.resolve(kind.as_ref()).await {
                Some(theme) => theme,
                None => kind.fallback(default_ws_url),
            },
            ThemeSelection::Named(name) => match self.resolve(name).await {
                Some(theme) => theme,
                None => {
                    let kind: ThemeKind = name.to_lowercase().parse().unwrap_or_default();
                    ThemeKind::fallback(kind, default_ws_url)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::Client;

    fn sample_themes() -> Vec<Theme> {
        vec![
            Theme {
                name: "Characters".to_owned(),
                url: "https://srv3.example/ws".to_owned(),
                subject_id: "1".to_owned(),
            },
            Theme {
                name: "Animals".to_owned(),
                url: "https://srv4.example/ws".to_owned(),
                subject_id: "14".to_owned(),
            },
        ]
    }

    fn registry() -> ThemeRegistry {
        let transport = Transport::with_client(Client::new(), "http://127.0.0.1:9");
        ThemeRegistry::preloaded(transport, sample_themes())
    }

    #[tokio::test]
    async fn resolve_ignores_case() {
        let theme = registry().resolve("aNiMaLs").await.unwrap();

        assert_eq!(theme.url, "https://srv4.example/ws");
    }

    #[tokio::test]
    async fn unknown_kind_falls_back() {
        let theme = registry()
            .select(&ThemeKind::Objects.into(), Some("https://default.example/ws"))
            .await;

        assert_eq!(
            theme,
            Theme {
                name: "objects".to_owned(),
                url: "https://default.example/ws".to_owned(),
                subject_id: "2".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn unknown_name_falls_back_to_characters() {
        let theme = registry()
            .select(&ThemeSelection::Named("Movies".to_owned()), None)
            .await;

        assert_eq!(theme.subject_id, "1");
        assert_eq!(theme.url, "");
    }
}
