use std::time::{SystemTime, UNIX_EPOCH};

use http::StatusCode;
use rand::{thread_rng, Rng};
use reqwest::{header::USER_AGENT, Client, RequestBuilder, Response};
use serde::Serialize;

use crate::{
    config::{ClientConfig, DEFAULT_USER_AGENT},
    error::{ClientError, ClientResult, Operation},
};

const XHR_HEADER: &str = "x-requested-with";
const XHR_VALUE: &str = "XMLHttpRequest";

/// HTTP plumbing shared by both session variants.
///
/// Every request carries the configured user agent. Timeouts and TLS are
/// whatever the wrapped [`Client`] was built with.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self::with_client(client, config.base_url()).user_agent(&config.user_agent))
    }

    /// Wraps an externally configured client, e.g. one with custom TLS roots.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_owned();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Plain browser-style page fetch.
    pub(crate) async fn get_page(&self, operation: Operation, url: &str) -> ClientResult<String> {
        let response = self.send(operation, self.client.get(url)).await?;
        tracing::info!("GET {}: {}", response.url(), response.status());

        read_success(operation, response).await
    }

    /// Form-encoded POST. The field order of `form` is kept on the wire.
    pub(crate) async fn post_form<F: Serialize + ?Sized>(
        &self,
        operation: Operation,
        url: &str,
        form: &F,
    ) -> ClientResult<String> {
        let response = self.send(operation, self.post_request(url, form)).await?;
        tracing::info!("POST {}: {}", response.url(), response.status());

        read_success(operation, response).await
    }

    /// Form-encoded POST where only the status matters.
    pub(crate) async fn post_form_status<F: Serialize + ?Sized>(
        &self,
        operation: Operation,
        url: &str,
        form: &F,
    ) -> ClientResult<StatusCode> {
        let response = self.send(operation, self.post_request(url, form)).await?;
        tracing::info!("POST {}: {}", response.url(), response.status());

        Ok(response.status())
    }

    /// XHR-flavoured GET used by the query protocol.
    pub(crate) async fn get_xhr<Q: Serialize + ?Sized>(
        &self,
        operation: Operation,
        url: &str,
        query: &Q,
    ) -> ClientResult<String> {
        let response = self.send(operation, self.xhr_request(url, query)).await?;
        tracing::info!("GET {}: {}", response.url(), response.status());

        read_success(operation, response).await
    }

    pub(crate) async fn get_xhr_status<Q: Serialize + ?Sized>(
        &self,
        operation: Operation,
        url: &str,
        query: &Q,
    ) -> ClientResult<StatusCode> {
        let response = self.send(operation, self.xhr_request(url, query)).await?;
        tracing::info!("GET {}: {}", response.url(), response.status());

        Ok(response.status())
    }

    fn post_request<F: Serialize + ?Sized>(&self, url: &str, form: &F) -> RequestBuilder {
        self.client.post(url).form(form)
    }

    fn xhr_request<Q: Serialize + ?Sized>(&self, url: &str, query: &Q) -> RequestBuilder {
        self.client
            .get(url)
            .query(query)
            .header(XHR_HEADER, XHR_VALUE)
    }

    async fn send(&self, operation: Operation, request: RequestBuilder) -> ClientResult<Response> {
        request
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|err| ClientError::transport(operation, err))
    }
}

async fn read_success(operation: Operation, response: Response) -> ClientResult<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ClientError::transport(operation, err))?;

    if !status.is_success() {
        tracing::warn!("{operation} failed with {status}: {body}");
        return Err(ClientError::protocol(
            operation,
            format!("unexpected status {status}"),
        ));
    }

    Ok(body)
}

/// A fresh JSONP callback name. The service echoes it back, and since it
/// differs on every call no intermediate cache can serve a stale step.
pub fn correlation_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let salt: u16 = thread_rng().gen();

    format!("jQuery{nanos}{salt:05}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn correlation_tokens_differ() {
        let first = correlation_token();
        let second = correlation_token();

        assert!(first.starts_with("jQuery"));
        assert!(first["jQuery".len()..].chars().all(|c| c.is_ascii_digit()));
        assert_ne!(first, second);
    }

    #[test]
    fn url_joins_base_and_path() {
        let transport = Transport::with_client(Client::new(), "http://localhost:8000/");

        assert_eq!(transport.url("/answer"), "http://localhost:8000/answer");
    }
}
