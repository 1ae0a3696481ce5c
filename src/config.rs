use std::{env, str::FromStr, time::Duration};

use anyhow::Context;
use strum::{AsRefStr, Display, EnumString};

use crate::theme::ThemeKind;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64; rv:47.0) Gecko/20100101 Firefox/47.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
pub enum Language {
    #[default]
    #[strum(serialize = "en")]
    English,
    #[strum(serialize = "es")]
    Spanish,
    #[strum(serialize = "fr")]
    French,
    #[strum(serialize = "de")]
    German,
    #[strum(serialize = "it")]
    Italian,
    #[strum(serialize = "pt")]
    Portuguese,
}

/// Which wire protocol a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    /// Form posts answered with HTML pages and flat JSON objects.
    Legacy,
    /// Query parameters answered with JSONP payloads.
    #[default]
    Query,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub language: Language,
    /// Overrides the `https://{language}.akinator.com` host, mostly useful for tests.
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
    pub protocol: Protocol,
    pub child_mode: bool,
    pub theme: ThemeKind,
    /// Web service url used when the theme list cannot be fetched.
    pub default_ws_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            protocol: Protocol::default(),
            child_mode: false,
            theme: ThemeKind::default(),
            default_ws_url: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let timeout = match env::var("AKI_TIMEOUT_SECS") {
            Ok(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("invalid AKI_TIMEOUT_SECS `{secs}`"))?,
            ),
            Err(_) => defaults.timeout,
        };

        Ok(Self {
            language: parse_var("AKI_LANGUAGE")?.unwrap_or(defaults.language),
            base_url: env::var("AKI_BASE_URL").ok(),
            timeout,
            user_agent: env::var("AKI_USER_AGENT").unwrap_or(defaults.user_agent),
            protocol: parse_var("AKI_PROTOCOL")?.unwrap_or(defaults.protocol),
            child_mode: parse_var("AKI_CHILD_MODE")?.unwrap_or(defaults.child_mode),
            theme: parse_var("AKI_THEME")?.unwrap_or(defaults.theme),
            default_ws_url: env::var("AKI_DEFAULT_WS_URL").ok(),
        })
    }

    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => format!("https://{}.akinator.com", self.language),
        }
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .to_lowercase()
            .parse()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("invalid {name} `{value}`: {err}")),
        Err(_) => Ok(None),
    }
}
