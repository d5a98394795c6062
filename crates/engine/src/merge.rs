use std::collections::BTreeMap;

use prospect_common::types::Candidate;

use crate::normalize::compute_completeness;

/// Deduplicate and union candidates by identity_key.
///
/// The most complete record in each group becomes the base; skills,
/// experience, education and source enrichments are unioned in, and
/// completeness is recomputed. Idempotent: merging an already-merged set
/// only recomputes completeness.
pub fn merge_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut groups: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        groups
            .entry(candidate.identity_key.clone())
            .or_default()
            .push(candidate);
    }

    groups
        .into_values()
        .map(|mut group| {
            // Most complete record first; source count breaks ties so the
            // base choice stays deterministic.
            group.sort_by(|a, b| {
                b.completeness
                    .total_cmp(&a.completeness)
                    .then_with(|| b.sources.len().cmp(&a.sources.len()))
            });
            let mut base = group.remove(0);
            for other in group {
                merge_into(&mut base, other);
            }
            base.sort_experience();
            base.completeness = compute_completeness(&base);
            base
        })
        .collect()
}

fn merge_into(base: &mut Candidate, other: Candidate) {
    // Scalar fields: the more complete base wins, gaps are filled.
    if base.headline.trim().is_empty() {
        base.headline = other.headline;
    }
    if base.location.trim().is_empty() {
        base.location = other.location;
    }
    if base.primary_profile_url.is_none() {
        base.primary_profile_url = other.primary_profile_url;
    }

    base.skills.extend(other.skills);

    // Experience union keyed by (company, title, start); on conflict the
    // longer description wins.
    for entry in other.experience {
        let key = (
            entry.company.to_lowercase(),
            entry.title.to_lowercase(),
            entry.start,
        );
        match base.experience.iter_mut().find(|existing| {
            (
                existing.company.to_lowercase(),
                existing.title.to_lowercase(),
                existing.start,
            ) == key
        }) {
            Some(existing) => {
                if entry.description.len() > existing.description.len() {
                    existing.description = entry.description;
                }
                if existing.end.is_none() && entry.end.is_some() {
                    existing.end = entry.end;
                }
            }
            None => base.experience.push(entry),
        }
    }

    // Education union keyed by (school, degree, year).
    for entry in other.education {
        let key = (
            entry.school.to_lowercase(),
            entry.degree.to_lowercase(),
            entry.year,
        );
        let exists = base.education.iter().any(|existing| {
            (
                existing.school.to_lowercase(),
                existing.degree.to_lowercase(),
                existing.year,
            ) == key
        });
        if !exists {
            base.education.push(entry);
        }
    }

    // Per source the later-fetched enrichment wins.
    for (source, enrichment) in other.sources {
        match base.sources.get(&source) {
            Some(existing) if existing.fetched_at >= enrichment.fetched_at => {}
            _ => {
                base.sources.insert(source, enrichment);
            }
        }
    }
}
