use thiserror::Error;
use url::Url;

use crate::pool::DownloadPool;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request")]
    Request(#[from] crate::pool::Error),
    #[error("invalid url")]
    InvalidUrl(#[from] url::ParseError),
    #[error("malformed compact-index line: {0}")]
    Malformed(String),
}

/// One line of a compact-index gem listing: a version, its runtime
/// dependencies, and an opaque checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecListing {
    pub version: String,
    pub platform: String,
    pub dependencies: Vec<(String, String)>,
    pub checksum: String,
}

/// Fetches per-gem spec listings from a remote's compact index
/// (GLOSSARY: "an incremental registry protocol exposing per-gem spec
/// listings"). One client per unique registry URI.
#[derive(Debug, Clone)]
pub struct CompactIndexClient {
    remote: Url,
    pool: DownloadPool,
}

impl CompactIndexClient {
    pub fn new(remote: Url, pool: DownloadPool) -> Self {
        Self { remote, pool }
    }

    pub fn remote(&self) -> &Url {
        &self.remote
    }

    /// `GET <remote>/info/<name>`, parsed into [`SpecListing`]s.
    pub async fn listings(&self, name: &str) -> Result<Vec<SpecListing>, Error> {
        let url = self.remote.join(&format!("info/{name}"))?;
        let body = self.pool.bytes(url).await?;
        let text = String::from_utf8_lossy(&body);

        text.lines().filter(|line| !line.is_empty()).map(parse_line).collect()
    }
}

/// Format: `version-platform deps_csv checksum`, e.g.
/// `2.2.8-ruby rack-protection:>=2.0,<3.0 deadbeef...`.
///
/// `deps_csv` is a comma-separated list of `name:requirement` pairs, but a
/// single requirement may itself be compound and comma-separated (`>=2.0,
/// <3.0`), so a plain `split(',')` can't tell a new dependency from a
/// continuation of the previous one's requirement. A trailing, dangling
/// comma (no further dependency after it) must also be tolerated.
fn parse_line(line: &str) -> Result<SpecListing, Error> {
    let mut fields = line.split_whitespace();

    let version_platform = fields.next().ok_or_else(|| Error::Malformed(line.to_string()))?;
    let deps_field = fields.next().unwrap_or("");
    let checksum = fields.next().unwrap_or_default().to_string();

    let (version, platform) = match version_platform.split_once('-') {
        Some((v, p)) => (v.to_string(), p.to_string()),
        None => (version_platform.to_string(), "ruby".to_string()),
    };

    let dependencies = if deps_field.is_empty() || deps_field == "-" {
        vec![]
    } else {
        parse_dependencies(deps_field).ok_or_else(|| Error::Malformed(line.to_string()))?
    };

    Ok(SpecListing {
        version,
        platform,
        dependencies,
        checksum,
    })
}

/// Splits a `deps_csv` field into `(name, requirement)` pairs. Each
/// comma-separated segment either opens a new dependency (it contains a
/// `:`) or continues the previous dependency's compound requirement (no
/// `:`, appended back onto it with the comma that separated them). Empty
/// segments, including a dangling trailing comma, are skipped. Returns
/// `None` if the field doesn't open with a `name:requirement` segment.
fn parse_dependencies(deps_field: &str) -> Option<Vec<(String, String)>> {
    let mut dependencies: Vec<(String, String)> = Vec::new();

    for segment in deps_field.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match segment.split_once(':') {
            Some((name, req)) => dependencies.push((name.to_string(), req.to_string())),
            None => {
                let (_, req) = dependencies.last_mut()?;
                req.push(',');
                req.push_str(segment);
            }
        }
    }

    Some(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_basic_line() {
        let listing = parse_line("2.2.8-ruby rack-protection:>=2.0, deadbeef").unwrap();
        assert_eq!(listing.version, "2.2.8");
        assert_eq!(listing.platform, "ruby");
        assert_eq!(listing.checksum, "deadbeef");
        assert_eq!(listing.dependencies, vec![("rack-protection".to_string(), ">=2.0".to_string())]);
    }

    #[test]
    fn parses_a_line_with_a_compound_requirement() {
        let listing = parse_line("2.2.8-ruby rack-protection:>=2.0,<3.0 deadbeef").unwrap();
        assert_eq!(listing.dependencies, vec![("rack-protection".to_string(), ">=2.0,<3.0".to_string())]);
    }

    #[test]
    fn parses_a_line_with_multiple_dependencies() {
        let listing = parse_line("1.0.0-ruby foo:>=1.0,bar:~>2.0 deadbeef").unwrap();
        assert_eq!(
            listing.dependencies,
            vec![("foo".to_string(), ">=1.0".to_string()), ("bar".to_string(), "~>2.0".to_string())]
        );
    }

    #[test]
    fn parses_a_line_with_no_dependencies() {
        let listing = parse_line("13.2.1-ruby - abc123").unwrap();
        assert!(listing.dependencies.is_empty());
        assert_eq!(listing.checksum, "abc123");
    }
}
