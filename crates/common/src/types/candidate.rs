use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::RecordId;

/// The providers the acquisition layer knows about, plus the AI backend
/// (which shares the rate-limiter namespace).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Professional-network profile lookup.
    Profiles,
    /// Public code-hosting account data.
    CodeHost,
    /// Short-form public posts profile.
    Microblog,
    /// Best-effort discovery of an independent personal site.
    Website,
    /// Outreach AI backend.
    Ai,
}

impl SourceId {
    /// The four candidate-discovery sources (excludes the AI backend).
    pub const DISCOVERY: [SourceId; 4] = [
        SourceId::Profiles,
        SourceId::CodeHost,
        SourceId::Microblog,
        SourceId::Website,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Profiles => "profiles",
            SourceId::CodeHost => "code_host",
            SourceId::Microblog => "microblog",
            SourceId::Website => "website",
            SourceId::Ai => "ai",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unnormalized, source-specific payload. Opaque until the normalizer
/// fixes its shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: RecordId,
    pub source: SourceId,
    pub fetched_at: DateTime<Utc>,
    /// Set by demo-mode adapters. Real fetches never set this.
    #[serde(default)]
    pub synthetic: bool,
    pub payload: Value,
}

impl RawRecord {
    pub fn new(source: SourceId, payload: Value) -> Self {
        Self {
            id: RecordId::new(),
            source,
            fetched_at: Utc::now(),
            synthetic: false,
            payload,
        }
    }

    pub fn synthetic(source: SourceId, payload: Value) -> Self {
        Self {
            synthetic: true,
            ..Self::new(source, payload)
        }
    }
}

/// One role in a candidate's history. `end == None` means "present".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
}

impl ExperienceEntry {
    pub fn is_current(&self) -> bool {
        self.end.is_none()
    }

    /// Tenure in years for completed roles with known bounds.
    pub fn tenure_years(&self) -> Option<f64> {
        let (start, end) = (self.start?, self.end?);
        let days = (end - start).num_days();
        (days >= 0).then(|| days as f64 / 365.25)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: String,
    pub school: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// Source-specific enrichment carried on a candidate, tagged by kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentDetail {
    Profile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connections: Option<u32>,
    },
    CodeHost {
        username: String,
        repos: u32,
        stars: u32,
        followers: u32,
        #[serde(default)]
        languages: Vec<String>,
    },
    Microblog {
        handle: String,
        followers: u32,
        posts: u32,
    },
    Website {
        url: String,
        #[serde(default)]
        topics: Vec<String>,
    },
}

/// Enrichment plus the fetch time it was observed at. Later fetches win
/// on merge conflict.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub fetched_at: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: EnrichmentDetail,
}

/// Normalized representation of a person, aggregated across sources.
///
/// Created by the normalizer, mutated only by the merger, frozen once
/// handed to the scorer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable dedup key: canonical profile URL, else a stable hash of
    /// (lowercased name, first location token).
    pub identity_key: String,
    pub name: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_profile_url: Option<String>,
    /// Most recent role first.
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub sources: BTreeMap<SourceId, Enrichment>,
    /// Fraction of expected fields present, in [0, 1].
    pub completeness: f64,
}

impl Candidate {
    /// Most recent role, honoring the most-recent-first ordering.
    pub fn recent_experience(&self) -> Option<&ExperienceEntry> {
        self.experience.first()
    }

    /// Sort roles most-recent-first: current roles ahead of completed
    /// ones, then by descending start date.
    pub fn sort_experience(&mut self) {
        self.experience.sort_by(|a, b| {
            b.is_current()
                .cmp(&a.is_current())
                .then_with(|| b.start.cmp(&a.start))
        });
    }
}
