// Fetch stage: turn a source descriptor into raw bytes.
//
// No retries happen here; retry/cache policy belongs to the pipeline
// coordinator. The only blocking call in the whole render cycle is the
// network/disk read below, so it carries an explicit timeout.
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::SourceConfig;
use crate::types::FetchError;

/// Resolved fetch target. Built from [`SourceConfig`] so the spreadsheet
/// document/sheet identifiers stay injectable for tests.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

impl Source {
    pub fn from_config(cfg: &SourceConfig) -> Source {
        match cfg {
            SourceConfig::File { path } => Source::File(PathBuf::from(path)),
            SourceConfig::Sheet { doc_id, sheet_id } => Source::Url(export_url(doc_id, sheet_id)),
        }
    }

    /// Stable identity used as the dataset cache key.
    pub fn cache_key(&self) -> String {
        match self {
            Source::File(p) => format!("file:{}", p.display()),
            Source::Url(u) => format!("url:{}", u),
        }
    }
}

/// CSV export endpoint of a public spreadsheet.
fn export_url(doc_id: &str, sheet_id: &str) -> String {
    format!(
        "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
        doc_id, sheet_id
    )
}

/// Read the raw table bytes from `source`.
///
/// Error kinds are kept distinct so callers can present an actionable
/// message: a missing file or unreachable host is not the same failure as
/// a transport error mid-response or a non-table reply.
pub fn fetch(source: &Source, timeout: Duration) -> Result<Vec<u8>, FetchError> {
    match source {
        Source::File(path) => {
            debug!(path = %path.display(), "reading local export");
            fs::read(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    FetchError::NotFound(format!("file not found: {}", path.display()))
                }
                _ => FetchError::Transport(format!("{}: {}", path.display(), e)),
            })
        }
        Source::Url(url) => fetch_url(url, timeout),
    }
}

fn fetch_url(url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
    debug!(%url, ?timeout, "fetching spreadsheet export");
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    let resp = client.get(url).send().map_err(|e| {
        if e.is_connect() || e.is_timeout() {
            FetchError::NotFound(format!("unreachable: {}", e))
        } else {
            FetchError::Transport(e.to_string())
        }
    })?;
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(format!("{} returned 404", url)));
    }
    if !status.is_success() {
        return Err(FetchError::Transport(format!(
            "{} returned status {}",
            url, status
        )));
    }
    let bytes = resp
        .bytes()
        .map_err(|e| FetchError::Malformed(format!("truncated response body: {}", e)))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_a_local_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.csv");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "Division-1,Credited Amount").unwrap();
        writeln!(f, "Hydrology,100").unwrap();

        let source = Source::File(path);
        let bytes = fetch(&source, Duration::from_secs(5)).unwrap();
        assert!(bytes.starts_with(b"Division-1"));
    }

    #[test]
    fn missing_file_is_not_found_not_transport() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::File(dir.path().join("absent.csv"));
        match fetch(&source, Duration::from_secs(5)) {
            Err(FetchError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn sheet_source_builds_the_export_url() {
        let cfg = SourceConfig::Sheet {
            doc_id: "DOC123".to_string(),
            sheet_id: "42".to_string(),
        };
        match Source::from_config(&cfg) {
            Source::Url(u) => {
                assert!(u.contains("DOC123"));
                assert!(u.contains("gid=42"));
            }
            other => panic!("expected url source, got {:?}", other),
        }
    }
}
