// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Feed download.
//!
//! Both the source feed and the app feed are plain YAML documents published
//! next to each other under the configured repository URL. Feed names are
//! resolved against that URL the way a browser resolves relative links, so
//! the repository URL should end with a slash.

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Name of the source feed below the repository URL.
pub const SOURCE_FEED: &str = "sourceconf.yaml";

/// Name of the app feed below the repository URL.
pub const APP_FEED: &str = "repo.yaml";

/// Resolve feed name against repository URL.
///
/// # Errors
///
/// - Return [`DownloadError::InvalidUrl`] if repository URL is malformed.
pub fn feed_url(repo_url: &str, feed: &str) -> Result<Url> {
    Url::parse(repo_url)
        .and_then(|base| base.join(feed))
        .map_err(|err| DownloadError::InvalidUrl {
            url: repo_url.into(),
            reason: err.to_string(),
        })
}

/// HTTP client for feeds.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Construct new downloader.
    ///
    /// Timeout bounds both connecting and waiting for further data, never
    /// the whole transfer.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::Client`] if HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("sadb/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(DownloadError::Client)?;

        Ok(Self { client })
    }

    /// Download document as text.
    ///
    /// Shows a progress bar on the terminal when verbose.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::Request`] if transfer fails.
    /// - Return [`DownloadError::Status`] if server does not answer with
    ///   success.
    /// - Return [`DownloadError::Empty`] if no data was received.
    /// - Return [`DownloadError::Encoding`] if data is not UTF-8.
    /// - Return [`DownloadError::Progress`] if progress bar cannot be styled.
    #[instrument(skip(self, url), fields(url = %url), level = "debug")]
    pub async fn fetch(&self, url: Url, verbose: bool) -> Result<String> {
        info!("download {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| DownloadError::Request {
                source: err,
                url: url.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bar = if verbose {
            let bar = ProgressBar::new(response.content_length().unwrap_or(0));
            let style = ProgressStyle::with_template(
                "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {bytes}/{total_bytes}",
            )?
            .progress_chars("-Cco.");
            bar.set_style(style);
            bar.set_message(url.to_string());
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| DownloadError::Request {
                source: err,
                url: url.to_string(),
            })?;
            body.extend_from_slice(&chunk);
            bar.inc(chunk.len() as u64);
        }
        bar.finish_and_clear();

        // INVARIANT: Zero bytes is a failed download, never an empty feed.
        if body.is_empty() {
            return Err(DownloadError::Empty {
                url: url.to_string(),
            });
        }

        debug!("received {} bytes", body.len());
        String::from_utf8(body).map_err(|err| DownloadError::Encoding {
            source: err,
            url: url.to_string(),
        })
    }
}

/// Download error types.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP client cannot be built.
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),

    /// Transfer fails.
    #[error("unable to download {url}, please check your internet connection")]
    Request {
        #[source]
        source: reqwest::Error,
        url: String,
    },

    /// Server answers with non-success status.
    #[error("unable to download {url}, server answered with status {status}")]
    Status { status: u16, url: String },

    /// No data received.
    #[error("unable to download {url}, no data received")]
    Empty { url: String },

    /// Data is not UTF-8.
    #[error("data downloaded from {url} is not valid UTF-8")]
    Encoding {
        #[source]
        source: std::string::FromUtf8Error,
        url: String,
    },

    /// Repository URL is malformed.
    #[error("invalid repository url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Progress bar cannot be styled.
    #[error(transparent)]
    Progress(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = DownloadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Serve exactly one canned HTTP response on a local port.
    async fn serve_once(status: &'static str, body: &'static [u8]) -> anyhow::Result<Url> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            }
        });

        Ok(Url::parse(&format!("http://{addr}/repo.yaml"))?)
    }

    #[test_case("https://example.org/sadb/", "https://example.org/sadb/sourceconf.yaml"; "trailing slash")]
    #[test_case("https://example.org/sadb", "https://example.org/sourceconf.yaml"; "no trailing slash")]
    #[test]
    fn feed_url_joins_like_relative_links(repo_url: &str, expect: &str) {
        let result = feed_url(repo_url, SOURCE_FEED).unwrap();
        pretty_assertions::assert_eq!(result.as_str(), expect);
    }

    #[test]
    fn feed_url_rejects_garbage() {
        assert!(matches!(
            feed_url("not a url", APP_FEED),
            Err(DownloadError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_returns_body() -> anyhow::Result<()> {
        let url = serve_once("200 OK", b"firefox:\n  name: Firefox\n").await?;
        let body = Downloader::new(Duration::from_secs(5))?.fetch(url, false).await?;

        assert_eq!(body, "firefox:\n  name: Firefox\n");

        Ok(())
    }

    #[tokio::test]
    async fn fetch_rejects_error_status() -> anyhow::Result<()> {
        let url = serve_once("404 Not Found", b"nope").await?;
        let result = Downloader::new(Duration::from_secs(5))?.fetch(url, false).await;

        assert!(matches!(result, Err(DownloadError::Status { status: 404, .. })));

        Ok(())
    }

    #[tokio::test]
    async fn fetch_rejects_empty_body() -> anyhow::Result<()> {
        let url = serve_once("200 OK", b"").await?;
        let result = Downloader::new(Duration::from_secs(5))?.fetch(url, true).await;

        assert!(matches!(result, Err(DownloadError::Empty { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn fetch_rejects_invalid_utf8() -> anyhow::Result<()> {
        let url = serve_once("200 OK", b"\xff\xfe\xfd").await?;
        let result = Downloader::new(Duration::from_secs(5))?.fetch(url, false).await;

        assert!(matches!(result, Err(DownloadError::Encoding { .. })));

        Ok(())
    }
}
