use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use prospect_common::types::{
    Candidate, EducationEntry, Enrichment, EnrichmentDetail, ExperienceEntry, RawRecord, SourceId,
};

/// A record that could not be turned into a Candidate. The orchestrator
/// counts these per source under the "unparseable" reason.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("payload is not an object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("source {0} does not produce candidate records")]
    UnsupportedSource(SourceId),
}

/// Converts raw per-source payloads into canonical Candidates. The
/// single boundary where record shape is fixed.
pub struct Normalizer {
    vocab: BTreeMap<String, String>,
}

impl Normalizer {
    pub fn new(vocab: BTreeMap<String, String>) -> Self {
        Self { vocab }
    }

    pub fn normalize(&self, record: &RawRecord) -> Result<Candidate, NormalizeError> {
        let obj = record
            .payload
            .as_object()
            .ok_or(NormalizeError::NotAnObject)?;

        match record.source {
            SourceId::Profiles => self.from_profile(record, obj),
            SourceId::CodeHost => self.from_codehost(record, obj),
            SourceId::Microblog => self.from_microblog(record, obj),
            SourceId::Website => self.from_website(record, obj),
            SourceId::Ai => Err(NormalizeError::UnsupportedSource(SourceId::Ai)),
        }
    }

    fn from_profile(
        &self,
        record: &RawRecord,
        obj: &serde_json::Map<String, Value>,
    ) -> Result<Candidate, NormalizeError> {
        let name = str_field(obj, "name").ok_or(NormalizeError::MissingField("name"))?;

        let experience = obj
            .get("experience")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(parse_experience)
            .collect();

        let education = obj
            .get("education")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(parse_education)
            .collect();

        let connections = obj
            .get("connections")
            .and_then(Value::as_u64)
            .map(|n| n as u32);

        Ok(self.build(
            record,
            name,
            str_field(obj, "headline").unwrap_or_default(),
            str_field(obj, "location").unwrap_or_default(),
            str_field(obj, "profile_url"),
            experience,
            education,
            string_array(obj, "skills"),
            EnrichmentDetail::Profile { connections },
        ))
    }

    fn from_codehost(
        &self,
        record: &RawRecord,
        obj: &serde_json::Map<String, Value>,
    ) -> Result<Candidate, NormalizeError> {
        let username =
            str_field(obj, "username").ok_or(NormalizeError::MissingField("username"))?;
        let name = str_field(obj, "name").unwrap_or_else(|| username.clone());
        let languages = string_array(obj, "languages");

        let detail = EnrichmentDetail::CodeHost {
            username,
            repos: u32_field(obj, "public_repos"),
            stars: u32_field(obj, "stars"),
            followers: u32_field(obj, "followers"),
            languages: languages.clone(),
        };

        Ok(self.build(
            record,
            name,
            str_field(obj, "bio").unwrap_or_default(),
            str_field(obj, "location").unwrap_or_default(),
            str_field(obj, "profile_url"),
            Vec::new(),
            Vec::new(),
            languages,
            detail,
        ))
    }

    fn from_microblog(
        &self,
        record: &RawRecord,
        obj: &serde_json::Map<String, Value>,
    ) -> Result<Candidate, NormalizeError> {
        let handle = str_field(obj, "handle").ok_or(NormalizeError::MissingField("handle"))?;
        let name = str_field(obj, "display_name").unwrap_or_else(|| handle.clone());

        let detail = EnrichmentDetail::Microblog {
            handle,
            followers: u32_field(obj, "followers"),
            posts: u32_field(obj, "posts"),
        };

        Ok(self.build(
            record,
            name,
            str_field(obj, "bio").unwrap_or_default(),
            str_field(obj, "location").unwrap_or_default(),
            str_field(obj, "profile_url"),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            detail,
        ))
    }

    fn from_website(
        &self,
        record: &RawRecord,
        obj: &serde_json::Map<String, Value>,
    ) -> Result<Candidate, NormalizeError> {
        let author = str_field(obj, "author").ok_or(NormalizeError::MissingField("author"))?;
        let url = str_field(obj, "url").ok_or(NormalizeError::MissingField("url"))?;
        let topics = string_array(obj, "topics");

        let headline = str_field(obj, "description")
            .or_else(|| str_field(obj, "title"))
            .unwrap_or_default();

        let detail = EnrichmentDetail::Website {
            url,
            topics: topics.clone(),
        };

        // A personal site is not the person's primary profile; identity
        // falls back to the (name, location) hash.
        Ok(self.build(
            record,
            author,
            headline,
            String::new(),
            None,
            Vec::new(),
            Vec::new(),
            topics,
            detail,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        record: &RawRecord,
        name: String,
        headline: String,
        location: String,
        profile_url: Option<String>,
        experience: Vec<ExperienceEntry>,
        education: Vec<EducationEntry>,
        raw_skills: Vec<String>,
        detail: EnrichmentDetail,
    ) -> Candidate {
        let canonical = profile_url.as_deref().and_then(canonicalize_url);
        let mut candidate = Candidate {
            identity_key: identity_key(canonical.as_deref(), &name, &location),
            name,
            headline,
            location,
            primary_profile_url: canonical,
            experience,
            education,
            skills: tokenize_skills(&self.vocab, raw_skills),
            sources: BTreeMap::from([(
                record.source,
                Enrichment {
                    fetched_at: record.fetched_at,
                    detail,
                },
            )]),
            completeness: 0.0,
        };
        candidate.sort_experience();
        candidate.completeness = compute_completeness(&candidate);
        candidate
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn str_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn u32_field(obj: &serde_json::Map<String, Value>, key: &str) -> u32 {
    obj.get(key).and_then(Value::as_u64).unwrap_or(0) as u32
}

fn string_array(obj: &serde_json::Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect()
}

fn parse_experience(value: &Value) -> Option<ExperienceEntry> {
    let obj = value.as_object()?;
    let title = str_field(obj, "title").unwrap_or_default();
    let company = str_field(obj, "company").unwrap_or_default();
    if title.is_empty() && company.is_empty() {
        return None;
    }
    Some(ExperienceEntry {
        title,
        company,
        start: str_field(obj, "start").as_deref().and_then(parse_flex_date),
        end: str_field(obj, "end").as_deref().and_then(parse_flex_date),
        description: str_field(obj, "description").unwrap_or_default(),
    })
}

fn parse_education(value: &Value) -> Option<EducationEntry> {
    let obj = value.as_object()?;
    let degree = str_field(obj, "degree").unwrap_or_default();
    let school = str_field(obj, "school").unwrap_or_default();
    if degree.is_empty() && school.is_empty() {
        return None;
    }
    Some(EducationEntry {
        degree,
        school,
        year: obj.get("year").and_then(Value::as_i64).map(|y| y as i32),
    })
}

/// Parse "2021-03-15", "2021-03" or "2021". "present"/"current" and
/// anything unparseable map to None (open-ended).
pub fn parse_flex_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("present") || raw.eq_ignore_ascii_case("current")
    {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d") {
        return Some(date);
    }
    raw.parse::<i32>()
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
}

// ---------------------------------------------------------------------------
// Canonicalization
// ---------------------------------------------------------------------------

/// Split a headline into (title, company). The left-hand side of the
/// first " at " is the title, the first segment after it the company;
/// trailing descriptors ("… • PyTorch Expert") are stripped from both.
pub fn split_headline(headline: &str) -> (String, String) {
    let headline = headline.trim();
    match find_at(headline) {
        Some(idx) => {
            let title = first_segment(&headline[..idx]);
            let company = first_segment(&headline[idx + 4..]);
            (title, company)
        }
        None => (headline.to_string(), String::new()),
    }
}

/// Byte offset of the first " at " (ASCII case-insensitive). Byte-safe:
/// the pattern is all-ASCII and bounded by spaces.
fn find_at(headline: &str) -> Option<usize> {
    let bytes = headline.as_bytes();
    (0..bytes.len().saturating_sub(3)).find(|&i| {
        bytes[i] == b' '
            && bytes[i + 1].eq_ignore_ascii_case(&b'a')
            && bytes[i + 2].eq_ignore_ascii_case(&b't')
            && bytes[i + 3] == b' '
    })
}

fn first_segment(s: &str) -> String {
    s.split(['•', '|'])
        .next()
        .unwrap_or("")
        .split(" - ")
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(',')
        .to_string()
}

/// Lowercase scheme and host, strip query/fragment and trailing slash.
/// Non-http(s) and hostless inputs are rejected.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (scheme, rest) = match raw.split_once("://") {
        Some((scheme, rest)) => (scheme.to_lowercase(), rest),
        None => ("https".to_string(), raw),
    };
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let rest = rest.split(['?', '#']).next().unwrap_or("");
    let (host, path) = match rest.split_once('/') {
        Some((host, path)) => (host, path),
        None => (rest, ""),
    };
    if host.is_empty() {
        return None;
    }
    let host = host.to_lowercase();
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        Some(format!("{scheme}://{host}"))
    } else {
        Some(format!("{scheme}://{host}/{path}"))
    }
}

/// Stable dedup key: the canonical URL when present, else a UUIDv5 over
/// (lowercased name, first non-empty location token).
pub fn identity_key(canonical_url: Option<&str>, name: &str, location: &str) -> String {
    if let Some(url) = canonical_url {
        return url.to_string();
    }
    let location_token = location
        .split(',')
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or("")
        .to_lowercase();
    let material = format!("{}|{}", name.trim().to_lowercase(), location_token);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes()).to_string()
}

/// Lowercase, trim, map aliases through the vocabulary, dedup.
pub fn tokenize_skills(
    vocab: &BTreeMap<String, String>,
    raw: impl IntoIterator<Item = String>,
) -> BTreeSet<String> {
    raw.into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| vocab.get(&s).cloned().unwrap_or(s))
        .collect()
}

/// Weighted fraction of expected fields present:
/// name .20, headline .15, location .10, profile_url .15,
/// experience≥1 .20, education≥1 .10, skills≥3 .10.
pub fn compute_completeness(candidate: &Candidate) -> f64 {
    let mut score = 0.0;
    if !candidate.name.trim().is_empty() {
        score += 0.20;
    }
    if !candidate.headline.trim().is_empty() {
        score += 0.15;
    }
    if !candidate.location.trim().is_empty() {
        score += 0.10;
    }
    if candidate.primary_profile_url.is_some() {
        score += 0.15;
    }
    if !candidate.experience.is_empty() {
        score += 0.20;
    }
    if !candidate.education.is_empty() {
        score += 0.10;
    }
    if candidate.skills.len() >= 3 {
        score += 0.10;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(BTreeMap::from([
            ("js".to_string(), "javascript".to_string()),
            ("py".to_string(), "python".to_string()),
        ]))
    }

    #[test]
    fn test_split_headline_with_at_and_descriptor() {
        let (title, company) = split_headline("Senior ML Engineer at Google • PyTorch Expert");
        assert_eq!(title, "Senior ML Engineer");
        assert_eq!(company, "Google");
    }

    #[test]
    fn test_split_headline_without_at() {
        let (title, company) = split_headline("Fractional CTO");
        assert_eq!(title, "Fractional CTO");
        assert_eq!(company, "");
    }

    #[test]
    fn test_split_headline_pipe_descriptor() {
        let (title, company) = split_headline("Staff Engineer at Stripe | Distributed Systems");
        assert_eq!(title, "Staff Engineer");
        assert_eq!(company, "Stripe");
    }

    #[test]
    fn test_canonicalize_url() {
        assert_eq!(
            canonicalize_url("HTTPS://Profiles.Example.com/in/Sarah-Chen?ref=search#top"),
            Some("https://profiles.example.com/in/Sarah-Chen".to_string())
        );
        assert_eq!(
            canonicalize_url("profiles.example.com/in/x/"),
            Some("https://profiles.example.com/in/x".to_string())
        );
        assert_eq!(canonicalize_url("ftp://example.com/a"), None);
        assert_eq!(canonicalize_url(""), None);
    }

    #[test]
    fn test_identity_key_prefers_url() {
        let key = identity_key(Some("https://p.example.com/in/x"), "Sarah Chen", "SF");
        assert_eq!(key, "https://p.example.com/in/x");
    }

    #[test]
    fn test_identity_key_hash_is_stable_and_case_insensitive() {
        let a = identity_key(None, "Sarah Chen", "San Francisco, CA");
        let b = identity_key(None, "sarah chen", "san francisco, somewhere else");
        assert_eq!(a, b);
        let c = identity_key(None, "Sarah Chen", "Boston, MA");
        assert_ne!(a, c);
    }

    #[test]
    fn test_normalize_profile_record() {
        let record = RawRecord::new(
            SourceId::Profiles,
            json!({
                "name": "Sarah Chen",
                "headline": "Senior ML Engineer at Google • PyTorch Expert",
                "location": "San Francisco, CA, USA",
                "profile_url": "https://Profiles.example.com/in/sarah-chen?utm=1",
                "connections": 1480,
                "skills": ["PyTorch", "py", "  TensorFlow "],
                "experience": [
                    {"title": "Senior ML Engineer", "company": "Google", "start": "2021-03", "end": "present", "description": "Training infra."},
                    {"title": "ML Engineer", "company": "Hugging Face", "start": "2019-01", "end": "2021-02"}
                ],
                "education": [{"degree": "MS Computer Science", "school": "Stanford University", "year": 2018}]
            }),
        );

        let candidate = normalizer().normalize(&record).unwrap();
        assert_eq!(
            candidate.identity_key,
            "https://profiles.example.com/in/sarah-chen"
        );
        assert!(candidate.skills.contains("python"));
        assert!(candidate.skills.contains("pytorch"));
        assert_eq!(candidate.experience.len(), 2);
        assert!(candidate.experience[0].is_current());
        // All expected fields present.
        assert!((candidate.completeness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_missing_name_is_unparseable() {
        let record = RawRecord::new(SourceId::Profiles, json!({"headline": "Engineer"}));
        assert!(matches!(
            normalizer().normalize(&record),
            Err(NormalizeError::MissingField("name"))
        ));

        let record = RawRecord::new(SourceId::Profiles, json!("not an object"));
        assert!(matches!(
            normalizer().normalize(&record),
            Err(NormalizeError::NotAnObject)
        ));
    }

    #[test]
    fn test_cross_linked_codehost_shares_identity() {
        let profile = RawRecord::new(
            SourceId::Profiles,
            json!({
                "name": "Marcus Johnson",
                "profile_url": "https://profiles.example.com/in/marcus-johnson"
            }),
        );
        let codehost = RawRecord::new(
            SourceId::CodeHost,
            json!({
                "username": "mjohnson",
                "name": "Marcus Johnson",
                "profile_url": "https://profiles.example.com/in/marcus-johnson",
                "public_repos": 52,
                "stars": 870,
                "followers": 260,
                "languages": ["Rust", "Go"]
            }),
        );

        let n = normalizer();
        let a = n.normalize(&profile).unwrap();
        let b = n.normalize(&codehost).unwrap();
        assert_eq!(a.identity_key, b.identity_key);
        assert!(b.skills.contains("rust"));
    }

    #[test]
    fn test_parse_flex_date() {
        assert_eq!(
            parse_flex_date("2021-03"),
            NaiveDate::from_ymd_opt(2021, 3, 1)
        );
        assert_eq!(
            parse_flex_date("2021-03-15"),
            NaiveDate::from_ymd_opt(2021, 3, 15)
        );
        assert_eq!(parse_flex_date("2021"), NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(parse_flex_date("present"), None);
        assert_eq!(parse_flex_date("garbage"), None);
    }
}
