use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Minimum number of digits in a site-assigned posting identifier.
pub const MIN_ID_DIGITS: usize = 8;

/// Opaque, site-assigned identifier of a job posting.
///
/// Held as the verbatim decimal string found in the posting URL; equality is
/// string identity. Serialized as a JSON string (queue entries, cache keys).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form used on the backend wire (`linkedin_job_id=N`).
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Extract the identifier from a posting URL.
    ///
    /// Looks for a path segment made only of digits (at least
    /// [`MIN_ID_DIGITS`]); query string and fragment are ignored. When the
    /// URL uses the slugged form (`/jobs/view/rust-dev-at-acme-4012345678/`)
    /// the trailing digit run of the last segment is accepted instead.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = strip_to_path(url);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if let Some(seg) = segments.iter().find(|s| is_id_digits(s)) {
            return Some(Self(seg.to_string()));
        }

        let last = segments.last()?;
        let (_, tail) = last.rsplit_once('-')?;
        is_id_digits(tail).then(|| Self(tail.to_string()))
    }
}

fn is_id_digits(s: &str) -> bool {
    s.len() >= MIN_ID_DIGITS && s.bytes().all(|b| b.is_ascii_digit())
}

/// Drop scheme + authority, query and fragment, leaving the path.
fn strip_to_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let url = &url[..end];
    match url.find("://") {
        Some(pos) => {
            let rest = &url[pos + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("")
        }
        None => url,
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("Invalid job id: {s:?}"))
        }
    }
}

impl TryFrom<String> for JobId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl From<u64> for JobId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_canonical_url() {
        let id = JobId::from_url("https://www.linkedin.com/jobs/view/4012345678/").unwrap();
        assert_eq!(id.as_str(), "4012345678");
        assert_eq!(id.as_u64(), Some(4_012_345_678));
    }

    #[test]
    fn test_query_string_is_stripped() {
        let id = JobId::from_url(
            "https://www.linkedin.com/jobs/view/3998877665?refId=abc%3D%3D&trackingId=12345678",
        )
        .unwrap();
        assert_eq!(id.as_str(), "3998877665");
    }

    #[test]
    fn test_digits_in_query_alone_are_not_an_id() {
        assert!(JobId::from_url("https://www.linkedin.com/jobs/search/?currentJobId=3998877665").is_none());
    }

    #[test]
    fn test_short_digit_segments_are_ignored() {
        assert!(JobId::from_url("https://www.linkedin.com/jobs/view/1234567/").is_none());
        assert_eq!(
            JobId::from_url("/company/1234/jobs/view/12345678").unwrap().as_str(),
            "12345678"
        );
    }

    #[test]
    fn test_segment_is_kept_verbatim() {
        let id = JobId::from_url("https://example.com/x/0012345678/y").unwrap();
        assert_eq!(id.as_str(), "0012345678");
    }

    #[test]
    fn test_mixed_segment_is_not_pure_digits() {
        assert!(JobId::from_url("https://example.com/jobs/12345678abc/").is_none());
    }

    #[test]
    fn test_slugged_url_fallback() {
        let id = JobId::from_url(
            "https://www.linkedin.com/jobs/view/rust-developer-at-acme-4012345678?position=1",
        )
        .unwrap();
        assert_eq!(id.as_str(), "4012345678");
    }

    #[test]
    fn test_relative_path() {
        let id = JobId::from_url("/jobs/view/4012345678/?eBP=xyz").unwrap();
        assert_eq!(id.as_str(), "4012345678");
    }

    #[test]
    fn test_parse_and_serde() {
        assert!("abc".parse::<JobId>().is_err());
        assert!("".parse::<JobId>().is_err());
        let id: JobId = "4012345678".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"4012345678\"");
        let back: JobId = serde_json::from_str("\"4012345678\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<JobId>("\"12ab\"").is_err());
        assert_eq!(JobId::from(42u64).as_str(), "42");
    }
}
