//! Per-dimension scoring. Every function returns `Option<f64>` in
//! [0, 10]; None means the inputs were missing, which the scorer maps to
//! the neutral value without counting the dimension toward coverage.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use prospect_common::config::ScoringConfig;
use prospect_common::types::{Candidate, ExperienceEntry, JobSpec};

use super::seniority::{function_area, seniority_rank};

const FUZZY_MATCH: f64 = 0.93;
const FUZZY_NEAR_MISS: f64 = 0.85;

/// Recognizable-but-not-elite schools, the 7–8 band.
const STRONG_SCHOOLS: &[&str] = &[
    "Cornell University",
    "Columbia University",
    "University of Michigan",
    "Georgia Tech",
    "University of Washington",
    "UCLA",
    "UIUC",
    "UT Austin",
    "NYU",
    "University of Toronto",
    "University of Waterloo",
    "KTH Royal Institute of Technology",
    "EPFL",
    "Imperial College London",
    "Tsinghua University",
];

/// Cities grouped by metro area for the 8-point location band.
const METRO_AREAS: &[&[&str]] = &[
    &[
        "san francisco",
        "sf",
        "oakland",
        "berkeley",
        "palo alto",
        "mountain view",
        "san jose",
        "bay area",
    ],
    &["new york", "nyc", "brooklyn", "jersey city"],
    &["seattle", "bellevue", "redmond"],
    &["los angeles", "santa monica", "pasadena"],
    &["boston", "cambridge", "somerville"],
    &["austin", "round rock"],
    &["denver", "boulder"],
    &["london", "greater london"],
];

/// Country aliases for the 6-point location band.
const COUNTRY_ALIASES: &[&[&str]] = &[
    &["usa", "us", "united states", "america"],
    &["uk", "united kingdom", "england", "great britain"],
    &["canada"],
    &["germany", "deutschland"],
    &["sweden"],
    &["india"],
];

// ---------------------------------------------------------------------------
// Name matching
// ---------------------------------------------------------------------------

fn normalize_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = true;
    for c in s.to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            prev_space = false;
        } else if !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Exact, word-bounded-substring, or Jaro-Winkler ≥ 0.93 match against a
/// reference list.
fn name_matches_any<S: AsRef<str>>(name: &str, reference: &[S]) -> bool {
    let name = normalize_name(name);
    if name.is_empty() {
        return false;
    }
    let padded_name = format!(" {name} ");
    reference.iter().any(|r| {
        let r = normalize_name(r.as_ref());
        if r.is_empty() {
            return false;
        }
        name == r
            || padded_name.contains(&format!(" {r} "))
            || strsim::jaro_winkler(&name, &r) >= FUZZY_MATCH
    })
}

fn best_similarity<S: AsRef<str>>(name: &str, reference: &[S]) -> f64 {
    let name = normalize_name(name);
    reference
        .iter()
        .map(|r| strsim::jaro_winkler(&name, &normalize_name(r.as_ref())))
        .fold(0.0, f64::max)
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Education: 9–10 elite, 7–8 strong, 5–6 any completed degree, 3–4
/// unrecognized but compensated by experience, 0–2 otherwise. No
/// education entries at all → missing inputs.
pub fn education(candidate: &Candidate, config: &ScoringConfig) -> Option<f64> {
    if candidate.education.is_empty() {
        return None;
    }
    let mut best = 0.0f64;
    for entry in &candidate.education {
        let band = if !entry.school.is_empty()
            && name_matches_any(&entry.school, &config.elite_schools)
        {
            9.5
        } else if !entry.school.is_empty() && name_matches_any(&entry.school, STRONG_SCHOOLS) {
            7.5
        } else if !entry.degree.trim().is_empty() {
            5.5
        } else if candidate.experience.len() >= 2 {
            3.5
        } else {
            1.5
        };
        best = best.max(band);
    }
    Some(best)
}

/// Trajectory: normalized slope of the seniority ladder over role start
/// dates, plus a capped breadth bonus for cross-function moves. Needs at
/// least two dated roles.
pub fn trajectory(candidate: &Candidate) -> Option<f64> {
    let mut dated: Vec<(NaiveDate, i32)> = candidate
        .experience
        .iter()
        .filter_map(|entry| Some((entry.start?, seniority_rank(&entry.title)?)))
        .collect();
    if dated.len() < 2 {
        return None;
    }
    dated.sort_by_key(|(start, _)| *start);

    let (first, last) = (dated[0], dated[dated.len() - 1]);
    let years = ((last.0 - first.0).num_days() as f64 / 365.25).max(1.0);
    let slope = (last.1 - first.1) as f64 / years;

    let base = (5.0 + slope * 5.0).clamp(0.0, 9.5);

    let areas: BTreeSet<&str> = candidate
        .experience
        .iter()
        .map(|entry| function_area(&entry.title))
        .collect();
    let breadth_bonus = if areas.len() > 1 { 1.0 } else { 0.0 };

    Some((base + breadth_bonus).clamp(0.0, 10.0))
}

/// Company relevance of the most recent completed employer (falling
/// back to the current one).
pub fn company_relevance(
    candidate: &Candidate,
    required: &BTreeSet<String>,
    config: &ScoringConfig,
) -> Option<f64> {
    let recent = candidate
        .experience
        .iter()
        .find(|entry| entry.end.is_some())
        .or_else(|| candidate.experience.first())?;

    if recent.company.trim().is_empty() {
        return Some(5.5);
    }

    if name_matches_any(&recent.company, &config.top_tier_companies) {
        return Some(9.5);
    }
    if best_similarity(&recent.company, &config.top_tier_companies) >= FUZZY_NEAR_MISS {
        return Some(7.5);
    }
    if is_off_domain(candidate, recent, required) {
        return Some(4.0);
    }
    Some(5.5)
}

/// Obviously off-domain: the job names required skills and neither the
/// recent role text nor the candidate's skills touch any of them.
fn is_off_domain(
    candidate: &Candidate,
    recent: &ExperienceEntry,
    required: &BTreeSet<String>,
) -> bool {
    if required.is_empty() {
        return false;
    }
    if required.intersection(&candidate.skills).next().is_some() {
        return false;
    }
    let haystack = format!(
        "{} {} {}",
        recent.title, recent.description, candidate.headline
    )
    .to_lowercase();
    !required.iter().any(|skill| haystack.contains(skill))
}

/// Experience match: required-skill overlap mapped linearly from [0, 1]
/// to [2, 10], with a preferred-skill bonus capped at +1.
pub fn experience_match(
    candidate: &Candidate,
    required: &BTreeSet<String>,
    preferred: &BTreeSet<String>,
) -> Option<f64> {
    if required.is_empty() {
        return Some(5.0);
    }
    if candidate.skills.is_empty() {
        return None;
    }
    let matched =
        required.intersection(&candidate.skills).count() as f64 / required.len() as f64;
    let mut score = 2.0 + 8.0 * matched;

    if !preferred.is_empty() {
        let preferred_ratio =
            preferred.intersection(&candidate.skills).count() as f64 / preferred.len() as f64;
        score += (2.0 * preferred_ratio).min(1.0);
    }
    Some(score.min(10.0))
}

/// Location: 10 exact city, 8 same metro, 6 same country, 4 remote
/// acceptable and candidate remote-capable, 0 otherwise. The best band
/// across the ordered preferences wins.
pub fn location_match(candidate: &Candidate, spec: &JobSpec) -> Option<f64> {
    if spec.location_preferences.is_empty() || candidate.location.trim().is_empty() {
        return None;
    }
    let location = candidate.location.to_lowercase();
    let tokens: Vec<String> = location
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let mut best = 0.0f64;
    for preference in &spec.location_preferences {
        let pref = preference.trim().to_lowercase();
        let band = if pref == "remote" {
            if location.contains("remote") {
                4.0
            } else {
                0.0
            }
        } else if tokens.iter().any(|t| *t == pref) {
            10.0
        } else if same_metro(&pref, &tokens) {
            8.0
        } else if same_country(&pref, &tokens) {
            6.0
        } else {
            0.0
        };
        best = best.max(band);
    }
    Some(best)
}

fn same_metro(pref: &str, tokens: &[String]) -> bool {
    METRO_AREAS.iter().any(|area| {
        area.contains(&pref) && tokens.iter().any(|t| area.contains(&t.as_str()))
    })
}

fn same_country(pref: &str, tokens: &[String]) -> bool {
    COUNTRY_ALIASES.iter().any(|aliases| {
        aliases.contains(&pref) && tokens.iter().any(|t| aliases.contains(&t.as_str()))
    })
}

/// Tenure: mean years across completed roles. Peak 9–10 at a 2–3 year
/// average, ≤4 under a year, ≤7 past six years.
pub fn tenure(candidate: &Candidate) -> Option<f64> {
    let tenures: Vec<f64> = candidate
        .experience
        .iter()
        .filter_map(ExperienceEntry::tenure_years)
        .collect();
    if tenures.is_empty() {
        return None;
    }
    let avg = tenures.iter().sum::<f64>() / tenures.len() as f64;

    let score = if avg < 1.0 {
        4.0 * avg
    } else if avg < 2.0 {
        4.0 + 5.0 * (avg - 1.0)
    } else if avg <= 3.0 {
        9.5
    } else if avg < 6.0 {
        9.5 - 0.8 * (avg - 3.0)
    } else {
        (7.0 - 0.5 * (avg - 6.0)).max(5.0)
    };
    Some(score.clamp(0.0, 10.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_common::types::{EducationEntry, SeniorityHint};
    use std::collections::{BTreeMap, BTreeSet as Set};

    fn base_candidate() -> Candidate {
        Candidate {
            identity_key: "k".into(),
            name: "Test".into(),
            headline: String::new(),
            location: String::new(),
            primary_profile_url: None,
            experience: vec![],
            education: vec![],
            skills: Set::new(),
            sources: BTreeMap::new(),
            completeness: 0.5,
        }
    }

    fn role(title: &str, company: &str, start: &str, end: Option<&str>) -> ExperienceEntry {
        ExperienceEntry {
            title: title.into(),
            company: company.into(),
            start: crate::normalize::parse_flex_date(start),
            end: end.and_then(crate::normalize::parse_flex_date),
            description: String::new(),
        }
    }

    fn spec_with_locations(prefs: &[&str]) -> JobSpec {
        JobSpec {
            id: "j".into(),
            title: "Engineer".into(),
            company: "Acme".into(),
            description: String::new(),
            highlights: vec![],
            required_skills: vec![],
            preferred_skills: vec![],
            location_preferences: prefs.iter().map(|s| s.to_string()).collect(),
            seniority_hint: SeniorityHint::Unknown,
            rubric_weights: None,
            max_candidates: 5,
            include_outreach: false,
        }
    }

    #[test]
    fn test_education_bands() {
        let config = ScoringConfig::default();
        let mut candidate = base_candidate();
        assert_eq!(education(&candidate, &config), None);

        candidate.education = vec![EducationEntry {
            degree: "MS Computer Science".into(),
            school: "Stanford University".into(),
            year: Some(2018),
        }];
        assert_eq!(education(&candidate, &config), Some(9.5));

        candidate.education[0].school = "Cornell University".into();
        assert_eq!(education(&candidate, &config), Some(7.5));

        candidate.education[0].school = "Unknown State College".into();
        assert_eq!(education(&candidate, &config), Some(5.5));
    }

    #[test]
    fn test_elite_school_not_fooled_by_substring() {
        let config = ScoringConfig::default();
        let mut candidate = base_candidate();
        // "Smith College" must not word-match "MIT".
        candidate.education = vec![EducationEntry {
            degree: "BA".into(),
            school: "Smith College".into(),
            year: None,
        }];
        assert_eq!(education(&candidate, &config), Some(5.5));
    }

    #[test]
    fn test_trajectory_rewards_climb() {
        let mut candidate = base_candidate();
        assert_eq!(trajectory(&candidate), None);

        candidate.experience = vec![
            role("Director of Engineering", "C", "2022-01", None),
            role("Senior Engineer", "B", "2018-01", Some("2021-12")),
            role("Software Engineer", "A", "2015-01", Some("2017-12")),
        ];
        let climbing = trajectory(&candidate).unwrap();

        candidate.experience = vec![
            role("Software Engineer", "C", "2022-01", None),
            role("Software Engineer", "B", "2018-01", Some("2021-12")),
            role("Software Engineer", "A", "2015-01", Some("2017-12")),
        ];
        let flat = trajectory(&candidate).unwrap();
        assert!(climbing > flat);
        assert!((0.0..=10.0).contains(&climbing));
    }

    #[test]
    fn test_company_relevance_bands() {
        let config = ScoringConfig::default();
        let required = Set::new();

        let mut candidate = base_candidate();
        assert_eq!(company_relevance(&candidate, &required, &config), None);

        // Most recent completed employer, not the current one.
        candidate.experience = vec![
            role("Engineer", "Tiny Startup", "2023-01", None),
            role("Engineer", "Google", "2019-01", Some("2022-12")),
        ];
        assert_eq!(company_relevance(&candidate, &required, &config), Some(9.5));
    }

    #[test]
    fn test_company_off_domain() {
        let config = ScoringConfig::default();
        let required: Set<String> = ["pytorch".to_string()].into_iter().collect();

        let mut candidate = base_candidate();
        candidate.experience = vec![role("Sales Associate", "Regional Retail Co", "2020-01", Some("2023-01"))];
        assert_eq!(company_relevance(&candidate, &required, &config), Some(4.0));
    }

    #[test]
    fn test_experience_match_mapping() {
        let mut candidate = base_candidate();
        let required: Set<String> = ["pytorch", "python"].iter().map(|s| s.to_string()).collect();
        let preferred = Set::new();

        // Empty required ⇒ 5, regardless of skills.
        assert_eq!(experience_match(&candidate, &Set::new(), &preferred), Some(5.0));
        // No skills at all ⇒ missing inputs.
        assert_eq!(experience_match(&candidate, &required, &preferred), None);

        candidate.skills = ["pytorch", "python"].iter().map(|s| s.to_string()).collect();
        assert_eq!(experience_match(&candidate, &required, &preferred), Some(10.0));

        candidate.skills = ["pytorch"].iter().map(|s| s.to_string()).collect();
        assert_eq!(experience_match(&candidate, &required, &preferred), Some(6.0));

        candidate.skills = ["cobol"].iter().map(|s| s.to_string()).collect();
        assert_eq!(experience_match(&candidate, &required, &preferred), Some(2.0));
    }

    #[test]
    fn test_location_bands() {
        let mut candidate = base_candidate();
        candidate.location = "San Francisco, CA, USA".into();

        let exact = spec_with_locations(&["San Francisco"]);
        assert_eq!(location_match(&candidate, &exact), Some(10.0));

        let metro = spec_with_locations(&["Oakland"]);
        assert_eq!(location_match(&candidate, &metro), Some(8.0));

        let country = spec_with_locations(&["USA"]);
        assert_eq!(location_match(&candidate, &country), Some(6.0));

        let nowhere = spec_with_locations(&["Tokyo"]);
        assert_eq!(location_match(&candidate, &nowhere), Some(0.0));

        candidate.location = "Remote, Stockholm, Sweden".into();
        let remote = spec_with_locations(&["remote"]);
        assert_eq!(location_match(&candidate, &remote), Some(4.0));

        // Missing inputs on either side.
        assert_eq!(location_match(&candidate, &spec_with_locations(&[])), None);
        candidate.location = String::new();
        assert_eq!(location_match(&candidate, &exact), None);
    }

    #[test]
    fn test_tenure_bands() {
        let mut candidate = base_candidate();
        assert_eq!(tenure(&candidate), None);

        // ~2.5y average: peak band.
        candidate.experience = vec![
            role("Engineer", "A", "2015-01", Some("2017-06")),
            role("Engineer", "B", "2017-07", Some("2020-01")),
        ];
        assert_eq!(tenure(&candidate), Some(9.5));

        // Job hopping: ~6 month average.
        candidate.experience = vec![
            role("Engineer", "A", "2020-01", Some("2020-07")),
            role("Engineer", "B", "2020-08", Some("2021-02")),
        ];
        assert!(tenure(&candidate).unwrap() <= 4.0);

        // Very long single tenure.
        candidate.experience = vec![role("Engineer", "A", "2010-01", Some("2019-01"))];
        assert!(tenure(&candidate).unwrap() <= 7.0);
    }
}
