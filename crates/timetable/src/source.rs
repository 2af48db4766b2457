//! Timetable document acquisition.
//!
//! The pipeline accepts either an already parsed document or a byte stream
//! holding HTML. Streams come from a local file or from the timetable portal
//! after logging in.

use crate::config::PortalConfig;
use crate::error::TimetableError;
use encoding_rs::{Encoding, WINDOWS_1252};
use regex::Regex;
use reqwest::Client;
use scraper::Html;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#).unwrap());

/// Input to the candidate locator.
pub enum Source {
    /// A document that has already been parsed
    Document(Html),
    /// Raw HTML bytes, decoded and parsed on use
    Stream(Box<dyn Read>),
}

impl Source {
    /// Opens a timetable file as a stream.
    ///
    /// A missing path is an `Io` error. A path that exists but isn't a regular
    /// file (a directory, a socket) is rejected with `UnsupportedSourceKind`.
    pub fn from_path(path: &Path) -> Result<Self, TimetableError> {
        let metadata = path.metadata()?;
        if !metadata.is_file() {
            return Err(TimetableError::UnsupportedSourceKind {
                message: format!("{} is not a regular file", path.display()),
            });
        }

        let file = File::open(path)?;
        Ok(Source::Stream(Box::new(BufReader::new(file))))
    }

    /// Wraps an in-memory HTML string.
    pub fn from_html(html: impl Into<String>) -> Self {
        Source::Stream(Box::new(Cursor::new(html.into().into_bytes())))
    }

    /// Resolves the source into a parsed document.
    pub fn into_document(self) -> Result<Html, TimetableError> {
        match self {
            Source::Document(document) => Ok(document),
            Source::Stream(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Ok(Html::parse_document(&decode_html(&bytes)))
            }
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Document(_) => f.write_str("Source::Document"),
            Source::Stream(_) => f.write_str("Source::Stream"),
        }
    }
}

/// Decodes HTML bytes to a string.
///
/// Order: byte order mark, valid UTF-8, `<meta charset>` declaration, and
/// finally Windows-1252, which is what the portal serves when it says nothing.
pub fn decode_html(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(2048)]);
    let encoding = META_CHARSET_REGEX
        .captures(&head)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
        .unwrap_or(WINDOWS_1252);

    debug!(encoding = encoding.name(), "Decoding non UTF-8 timetable");
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(
            encoding = encoding.name(),
            "Timetable contains bytes that are invalid in its encoding"
        );
    }
    text.into_owned()
}

/// Reads the timetable from a local HTML file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn fetch(&self) -> Result<Source, TimetableError> {
        info!(path = %self.path.display(), "Reading timetable file");
        Source::from_path(&self.path)
    }
}

/// Logs in to the timetable portal and downloads the personal timetable.
pub struct PortalSource {
    client: Client,
    config: PortalConfig,
    username: String,
    password: String,
}

impl PortalSource {
    /// Creates a portal client with its own cookie jar.
    pub fn new(
        config: PortalConfig,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, TimetableError> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TimetableError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Logs in and fetches the timetable page.
    ///
    /// # Returns
    /// * `Ok(Source::Stream)` - The timetable HTML
    /// * `Err(AuthenticationFailed)` - If the portal rejected the credentials
    /// * `Err(Network)` - If any request failed
    pub async fn fetch(&self) -> Result<Source, TimetableError> {
        let login_url = self.required_url(self.config.login_url.as_deref(), "login_url")?;
        let timetable_url =
            self.required_url(self.config.timetable_url.as_deref(), "timetable_url")?;

        info!(url = %login_url, user = %self.username, "Logging in to timetable portal");

        let response = self
            .client
            .post(login_url)
            .form(&[
                (self.config.username_field.as_str(), self.username.as_str()),
                (self.config.password_field.as_str(), self.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TimetableError::AuthenticationFailed {
                message: format!("login returned status {}", status),
            });
        }

        let body = response.text().await?;
        if body.contains(&self.config.login_page_marker) {
            return Err(TimetableError::AuthenticationFailed {
                message: "portal returned the login form again".to_string(),
            });
        }

        info!(url = %timetable_url, "Fetching timetable");
        let response = self.client.get(timetable_url).send().await?;
        if !response.status().is_success() {
            return Err(TimetableError::Network {
                message: format!("timetable page returned status {}", response.status()),
            });
        }

        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Received timetable page");
        Ok(Source::Stream(Box::new(Cursor::new(bytes.to_vec()))))
    }

    fn required_url(&self, url: Option<&str>, key: &str) -> Result<Url, TimetableError> {
        let url = url.ok_or_else(|| TimetableError::Config {
            message: format!("portal.{key} is not configured"),
        })?;
        Ok(Url::parse(url)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_html("Übung".as_bytes()), "Übung");
    }

    #[test]
    fn test_decode_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Raum: A301".as_bytes());
        assert_eq!(decode_html(&bytes), "Raum: A301");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // "Übung" in ISO-8859-1
        let bytes = [0xDC, b'b', b'u', b'n', b'g'];
        assert_eq!(decode_html(&bytes), "Übung");
    }

    #[test]
    fn test_decode_meta_charset() {
        let mut bytes = b"<html><head><meta charset=\"iso-8859-15\"></head><body>".to_vec();
        // Euro sign in ISO-8859-15
        bytes.push(0xA4);
        bytes.extend_from_slice(b"</body></html>");
        assert!(decode_html(&bytes).contains('€'));
    }

    #[test]
    fn test_from_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Source::from_path(dir.path()).unwrap_err();
        assert!(matches!(err, TimetableError::UnsupportedSourceKind { .. }));
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Source::from_path(&dir.path().join("missing.html")).unwrap_err();
        assert!(matches!(err, TimetableError::Io(_)));
        assert!(err.is_acquisition_error());
    }

    #[test]
    fn test_stream_into_document() {
        let document = Source::from_html("<table><tr><td>x</td></tr></table>")
            .into_document()
            .unwrap();
        assert!(document.html().contains("<table>"));
    }

    fn portal_config(server: &MockServer) -> PortalConfig {
        PortalConfig::new(
            &format!("{}/login", server.uri()),
            &format!("{}/timetable", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_portal_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("asdf=student"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Welcome"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/timetable"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<table></table>"))
            .mount(&server)
            .await;

        let portal = PortalSource::new(portal_config(&server), "student", "secret").unwrap();
        let document = portal.fetch().await.unwrap().into_document().unwrap();
        assert!(document.html().contains("<table>"));
    }

    #[tokio::test]
    async fn test_portal_rejected_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<form name=\"loginForm\"></form>"),
            )
            .mount(&server)
            .await;

        let portal = PortalSource::new(portal_config(&server), "student", "wrong").unwrap();
        let err = portal.fetch().await.unwrap_err();
        assert!(matches!(err, TimetableError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn test_portal_requires_urls() {
        let portal = PortalSource::new(PortalConfig::default(), "student", "secret").unwrap();
        let err = portal.fetch().await.unwrap_err();
        assert!(matches!(err, TimetableError::Config { .. }));
    }
}
