use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use encoding_rs::Encoding;
use thiserror::Error;

use super::freshness::Freshness;
use super::loader::{decode_body, parse_csv};
use super::model::Table;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid dataset identifier {0:?}")]
    InvalidIdentifier(String),

    /// Non-success status, or no response at all (`status` is `None`).
    #[error("retrieval failed{}: {reason}", status_suffix(.status))]
    Retrieval { status: Option<u16>, reason: String },

    #[error("could not parse tabular data: {0}")]
    Parse(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Retrieval,
    Parse,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::InvalidIdentifier(_) | FetchError::Retrieval { .. } => {
                FetchErrorKind::Retrieval
            }
            FetchError::Parse(_) => FetchErrorKind::Parse,
        }
    }

    /// Transport status code, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Retrieval { status, .. } => *status,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// What the fetcher needs from one HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub last_modified: Option<String>,
    pub body: Vec<u8>,
}

/// Blocking GET. Implementations return `Ok` for any status the server sends
/// and `Err` only when no response was obtained.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<RawResponse, FetchError>;
}

/// [`Transport`] over a `ureq` agent with a global timeout.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Upper bound on a downloaded body.
    const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        UreqTransport { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| FetchError::Retrieval {
                status: None,
                reason: err.to_string(),
            })?;

        let status = response.status().as_u16();
        let last_modified = response
            .headers()
            .get("last-modified")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if !is_success(status) {
            return Ok(RawResponse {
                status,
                last_modified,
                body: Vec::new(),
            });
        }

        let body = response
            .body_mut()
            .with_config()
            .limit(Self::MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|err| FetchError::Retrieval {
                status: Some(status),
                reason: format!("reading response body: {err}"),
            })?;

        Ok(RawResponse {
            status,
            last_modified,
            body,
        })
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// One successfully fetched dataset.
#[derive(Debug, Clone)]
pub struct FetchedTable {
    pub table: Table,
    pub freshness: Freshness,
}

/// Downloads CSV datasets by identifier from `https://<host>/uc?id=<id>&export=download`.
pub struct Fetcher {
    transport: Box<dyn Transport>,
    host: String,
    tz: Tz,
    fallback_encoding: &'static Encoding,
}

impl Fetcher {
    pub fn new(
        transport: Box<dyn Transport>,
        host: impl Into<String>,
        tz: Tz,
        fallback_encoding: &'static Encoding,
    ) -> Self {
        Fetcher {
            transport,
            host: host.into(),
            tz,
            fallback_encoding,
        }
    }

    pub fn download_url(&self, identifier: &str) -> String {
        format!("https://{}/uc?id={identifier}&export=download", self.host)
    }

    /// Single attempt: no retries, no caching.
    pub fn fetch(&self, identifier: &str) -> Result<FetchedTable, FetchError> {
        validate_identifier(identifier)?;

        let url = self.download_url(identifier);
        log::debug!("GET {url}");
        let response = self.transport.get(&url)?;

        if !is_success(response.status) {
            return Err(FetchError::Retrieval {
                status: Some(response.status),
                reason: format!("download of {identifier} was refused"),
            });
        }

        let text = decode_body(&response.body, self.fallback_encoding)?;
        let table = parse_csv(&text)?;
        let freshness = Freshness::derive(response.last_modified.as_deref(), self.tz, Utc::now());

        log::info!(
            "Loaded dataset {identifier}: {} rows, {} columns (updated {freshness})",
            table.row_count(),
            table.columns().len()
        );
        Ok(FetchedTable { table, freshness })
    }
}

/// Identifiers are opaque drive tokens; anything that would need URL
/// escaping is rejected up front.
fn validate_identifier(identifier: &str) -> Result<(), FetchError> {
    let ok = !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(FetchError::InvalidIdentifier(identifier.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::NaiveDateTime;
    use encoding_rs::SHIFT_JIS;

    use super::*;
    use crate::data::freshness::{DISPLAY_FORMAT, UNAVAILABLE_MARKER};

    /// In-memory transport keyed by URL; unknown URLs answer 404.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub responses: HashMap<String, RawResponse>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeTransport {
        pub fn with(mut self, url: &str, response: RawResponse) -> Self {
            self.responses.insert(url.to_string(), response);
            self
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses.get(url).cloned().unwrap_or(RawResponse {
                status: 404,
                ..Default::default()
            }))
        }
    }

    pub(crate) fn ok_csv(body: &str, last_modified: Option<&str>) -> RawResponse {
        RawResponse {
            status: 200,
            last_modified: last_modified.map(str::to_owned),
            body: body.as_bytes().to_vec(),
        }
    }

    pub(crate) fn url(id: &str) -> String {
        format!("https://drive.example/uc?id={id}&export=download")
    }

    pub(crate) fn fetcher(transport: FakeTransport) -> Fetcher {
        Fetcher::new(
            Box::new(transport),
            "drive.example",
            chrono_tz::Asia::Tokyo,
            SHIFT_JIS,
        )
    }

    #[test]
    fn builds_fixed_pattern_url() {
        let f = fetcher(FakeTransport::default());
        assert_eq!(f.download_url("abc_12-Z"), url("abc_12-Z"));
    }

    #[test]
    fn fetch_parses_table_and_freshness() {
        let transport = FakeTransport::default().with(
            &url("list"),
            ok_csv(
                "code,price\nA,100\nB,200\n",
                Some("Tue, 15 Nov 1994 08:12:31 GMT"),
            ),
        );
        let fetched = fetcher(transport).fetch("list").unwrap();
        assert_eq!(fetched.table.row_count(), 2);
        assert_eq!(fetched.freshness.to_string(), "1994/11/15 17:12:31");
    }

    #[test]
    fn not_found_is_a_retrieval_error_with_status() {
        let err = fetcher(FakeTransport::default()).fetch("missing").unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Retrieval);
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("status 404"));
    }

    #[test]
    fn one_failing_dataset_does_not_affect_the_others() {
        let transport = FakeTransport::default()
            .with(&url("a"), ok_csv("x\n1\n", None))
            .with(&url("c"), ok_csv("y\nq\n", None));
        let f = fetcher(transport);

        let results: Vec<_> = ["a", "b", "c"].iter().map(|id| f.fetch(id)).collect();
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().status(), Some(404));
        assert!(results[2].is_ok());
    }

    #[test]
    fn missing_last_modified_yields_marked_fallback() {
        let transport = FakeTransport::default().with(&url("t"), ok_csv("x\n1\n", None));
        let fetched = fetcher(transport).fetch("t").unwrap();

        let text = fetched.freshness.to_string();
        assert!(text.starts_with(UNAVAILABLE_MARKER));
        let stamp = text
            .split("at ")
            .nth(1)
            .and_then(|s| s.strip_suffix(')'))
            .unwrap();
        assert!(NaiveDateTime::parse_from_str(stamp, DISPLAY_FORMAT).is_ok());
    }

    #[test]
    fn shift_jis_body_is_decoded() {
        let (bytes, _, _) = SHIFT_JIS.encode("銘柄コード,銘柄名称\n1301,極洋\n");
        let transport = FakeTransport::default().with(
            &url("sjis"),
            RawResponse {
                status: 200,
                last_modified: None,
                body: bytes.into_owned(),
            },
        );
        let fetched = fetcher(transport).fetch("sjis").unwrap();
        assert_eq!(fetched.table.column_names(), vec!["銘柄コード", "銘柄名称"]);
    }

    #[test]
    fn malformed_csv_is_a_parse_error() {
        let transport = FakeTransport::default().with(&url("bad"), ok_csv("a,b\n1,2,3\n", None));
        let err = fetcher(transport).fetch("bad").unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn invalid_identifiers_never_reach_the_transport() {
        let transport = FakeTransport::default();
        let calls = transport.calls.clone();
        let f = fetcher(transport);
        assert!(matches!(f.fetch(""), Err(FetchError::InvalidIdentifier(_))));
        assert!(matches!(f.fetch("a&b=c"), Err(FetchError::InvalidIdentifier(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
