use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifier::JobId;

/// Where the work happens, as advertised on the posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkType {
    Remote,
    Hybrid,
    OnSite,
    #[default]
    Unspecified,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::Remote => "remote",
            WorkType::Hybrid => "hybrid",
            WorkType::OnSite => "on-site",
            WorkType::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" => Ok(WorkType::Remote),
            "hybrid" => Ok(WorkType::Hybrid),
            "on-site" | "onsite" | "on_site" => Ok(WorkType::OnSite),
            "unspecified" | "" => Ok(WorkType::Unspecified),
            _ => Err(format!("Unknown work type: {}", s)),
        }
    }
}

/// A normalized job posting, materialized for the duration of one
/// processor iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingRecord {
    pub job_id: JobId,
    pub title: String,
    pub company_name: String,
    /// Location line exactly as displayed (location · posted · applicants).
    pub location_raw: String,
    pub location: String,
    pub posted_at: DateTime<Utc>,
    pub applicants: Option<u32>,
    /// Post-expansion description text; empty when none was found.
    pub description: String,
    pub apply_url: String,
    pub work_type: WorkType,
    pub skills: BTreeSet<String>,
    pub captured_at: DateTime<Utc>,
}

impl PostingRecord {
    /// An empty description makes the posting eligible for a later re-scrape.
    pub fn needs_rescrape(&self) -> bool {
        self.description.trim().is_empty()
    }
}

/// A company as known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

/// Answer of the backend's company lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyLookup {
    pub exists: bool,
    #[serde(default)]
    pub company: Option<Company>,
}

/// A posting as echoed back by the backend after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPosting {
    #[serde(default)]
    pub id: Option<i64>,
    pub linkedin_job_id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company_id: Option<i64>,
}

/// Kind of fact held in the existence cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Job,
    Company,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Job => "job",
            EntityKind::Company => "company",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cached answer to "does the backend know this key?".
///
/// `known == false` means the cache had nothing to say (miss or error);
/// `exists` is meaningless in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Existence {
    pub exists: bool,
    pub known: bool,
}

impl Existence {
    pub const UNKNOWN: Existence = Existence {
        exists: false,
        known: false,
    };

    pub fn known(exists: bool) -> Self {
        Self {
            exists,
            known: true,
        }
    }

    pub fn is_known_true(&self) -> bool {
        self.known && self.exists
    }

    pub fn is_known_false(&self) -> bool {
        self.known && !self.exists
    }
}

/// Lifecycle of one identifier inside the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Queued,
    InFlight,
    Saved,
    Skipped,
    Failed,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Queued => "queued",
            ItemState::InFlight => "in_flight",
            ItemState::Saved => "saved",
            ItemState::Skipped => "skipped",
            ItemState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Saved | ItemState::Skipped | ItemState::Failed)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(ItemState::Queued),
            "in_flight" => Ok(ItemState::InFlight),
            "saved" => Ok(ItemState::Saved),
            "skipped" => Ok(ItemState::Skipped),
            "failed" => Ok(ItemState::Failed),
            _ => Err(format!("Unknown item state: {}", s)),
        }
    }
}
