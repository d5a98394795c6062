//! Deterministic synthetic rosters for demo-mode adapters.
//!
//! Selection depends only on the spec's search terms, so the same query
//! always yields the same records. Records carry `synthetic = true`.

use serde_json::{json, Value};

use prospect_common::types::{JobSpec, RawRecord, SourceId};

struct DemoPerson {
    name: &'static str,
    headline: &'static str,
    location: &'static str,
    profile_url: &'static str,
    connections: u32,
    skills: &'static [&'static str],
    /// (title, company, start, end, description); end "present" for current.
    experience: &'static [(&'static str, &'static str, &'static str, &'static str, &'static str)],
    /// (degree, school, year)
    education: &'static [(&'static str, &'static str, i32)],
    /// (username, repos, stars, followers, languages, cross_link)
    codehost: Option<(&'static str, u32, u32, u32, &'static [&'static str], bool)>,
    /// (handle, followers, posts, cross_link)
    microblog: Option<(&'static str, u32, u32, bool)>,
    /// (url, title, description, topics)
    website: Option<(&'static str, &'static str, &'static str, &'static [&'static str])>,
}

const ROSTER: &[DemoPerson] = &[
    DemoPerson {
        name: "Sarah Chen",
        headline: "Senior ML Engineer at Google • PyTorch Expert",
        location: "San Francisco, CA, USA",
        profile_url: "https://profiles.example.com/in/sarah-chen",
        connections: 1480,
        skills: &["PyTorch", "Python", "TensorFlow", "Machine Learning", "CUDA"],
        experience: &[
            ("Senior ML Engineer", "Google", "2021-03", "present", "Training infrastructure for large ranking models."),
            ("ML Engineer", "Hugging Face", "2019-01", "2021-02", "Transformer fine-tuning pipelines and model hub tooling."),
            ("Research Intern", "Stanford AI Lab", "2018-06", "2018-12", "Few-shot learning experiments."),
        ],
        education: &[("MS Computer Science", "Stanford University", 2018)],
        codehost: Some(("schen-ml", 38, 2140, 410, &["Python", "Jupyter Notebook", "C++"], true)),
        microblog: Some(("sarahtrains", 12400, 3180, true)),
        website: Some((
            "https://sarahchen.dev",
            "Sarah Chen — notes on training at scale",
            "Writing about distributed training, PyTorch internals, and evaluation.",
            &["pytorch", "distributed training", "mlops"],
        )),
    },
    DemoPerson {
        name: "Marcus Johnson",
        headline: "Staff Engineer at Stripe | Distributed Systems",
        location: "Seattle, WA, USA",
        profile_url: "https://profiles.example.com/in/marcus-johnson",
        connections: 890,
        skills: &["Rust", "Go", "Kubernetes", "PostgreSQL", "gRPC"],
        experience: &[
            ("Staff Engineer", "Stripe", "2020-06", "present", "Payments ledger consistency and multi-region failover."),
            ("Senior Software Engineer", "AWS", "2016-04", "2020-05", "Control plane for a managed database service."),
            ("Software Engineer", "Tableau", "2013-07", "2016-03", "Query execution engine."),
        ],
        education: &[("BS Computer Science", "Georgia Tech", 2013)],
        codehost: Some(("mjohnson", 52, 870, 260, &["Rust", "Go"], true)),
        microblog: None,
        website: None,
    },
    DemoPerson {
        name: "Priya Patel",
        headline: "Frontend Engineer at Meta",
        location: "New York, NY, USA",
        profile_url: "https://profiles.example.com/in/priya-patel",
        connections: 650,
        skills: &["TypeScript", "React", "JavaScript", "GraphQL", "CSS"],
        experience: &[
            ("Frontend Engineer", "Meta", "2022-01", "present", "Design-system components for the ads manager."),
            ("Software Engineer", "Etsy", "2019-08", "2021-12", "Checkout flow and web performance."),
        ],
        education: &[("BA Computer Science", "NYU", 2019)],
        codehost: None,
        microblog: Some(("priyabuilds", 4800, 950, false)),
        website: None,
    },
    DemoPerson {
        name: "Diego Alvarez",
        headline: "Principal Data Engineer at Databricks",
        location: "Austin, TX, USA",
        profile_url: "https://profiles.example.com/in/diego-alvarez",
        connections: 1120,
        skills: &["Python", "Spark", "Airflow", "AWS", "Scala"],
        experience: &[
            ("Principal Data Engineer", "Databricks", "2022-03", "present", "Lakehouse ingestion framework."),
            ("Senior Data Engineer", "Shopify", "2018-09", "2022-02", "Streaming order analytics on Spark."),
            ("Data Engineer", "Indeed", "2015-06", "2018-08", "Batch ETL and warehouse modeling."),
        ],
        education: &[("BS Electrical Engineering", "UT Austin", 2015)],
        codehost: Some(("dalvarez", 24, 310, 95, &["Python", "Scala"], false)),
        microblog: None,
        website: None,
    },
    DemoPerson {
        name: "Emma Larsson",
        headline: "Site Reliability Engineer at Spotify",
        location: "Remote, Stockholm, Sweden",
        profile_url: "https://profiles.example.com/in/emma-larsson",
        connections: 540,
        skills: &["Kubernetes", "Terraform", "Go", "AWS", "Prometheus"],
        experience: &[
            ("Site Reliability Engineer", "Spotify", "2021-02", "present", "Multi-cluster Kubernetes platform and capacity planning."),
            ("DevOps Engineer", "Klarna", "2018-05", "2021-01", "CI/CD and infrastructure as code."),
        ],
        education: &[("MS Software Engineering", "KTH Royal Institute of Technology", 2018)],
        codehost: Some(("elarsson", 41, 520, 180, &["Go", "HCL"], true)),
        microblog: None,
        website: None,
    },
    DemoPerson {
        name: "Wei Zhang",
        headline: "Research Scientist at DeepMind",
        location: "Boston, MA, USA",
        profile_url: "https://profiles.example.com/in/wei-zhang",
        connections: 2100,
        skills: &["PyTorch", "CUDA", "C++", "Machine Learning", "JAX"],
        experience: &[
            ("Research Scientist", "DeepMind", "2020-09", "present", "Sample-efficient reinforcement learning."),
            ("Postdoctoral Researcher", "MIT CSAIL", "2018-09", "2020-08", "Program synthesis with neural guidance."),
        ],
        education: &[
            ("PhD Computer Science", "MIT", 2018),
            ("BS Computer Science", "Tsinghua University", 2013),
        ],
        codehost: None,
        microblog: Some(("weizresearch", 21800, 1240, true)),
        website: Some((
            "https://weizhang.ai",
            "Wei Zhang — research",
            "Publications and open problems in reinforcement learning.",
            &["reinforcement learning", "pytorch", "research"],
        )),
    },
    DemoPerson {
        name: "Aisha Okafor",
        headline: "Security Engineer at Cloudflare",
        location: "London, UK",
        profile_url: "https://profiles.example.com/in/aisha-okafor",
        connections: 720,
        skills: &["Rust", "Python", "Cryptography", "Linux", "Go"],
        experience: &[
            ("Security Engineer", "Cloudflare", "2021-07", "present", "TLS termination hardening and key management."),
            ("Software Engineer", "Monzo", "2018-10", "2021-06", "Backend services and incident response."),
        ],
        education: &[("MEng Computer Science", "University of Oxford", 2018)],
        codehost: Some(("aokafor", 19, 640, 210, &["Rust", "Python"], false)),
        microblog: None,
        website: None,
    },
    DemoPerson {
        name: "Tom Brennan",
        headline: "Mobile Engineer at Airbnb",
        location: "Denver, CO, USA",
        profile_url: "https://profiles.example.com/in/tom-brennan",
        connections: 430,
        skills: &["Swift", "Kotlin", "iOS", "Android"],
        experience: &[
            ("Mobile Engineer", "Airbnb", "2020-01", "present", "Listing experience on iOS."),
            ("iOS Engineer", "Strava", "2017-03", "2019-12", "Activity recording and offline sync."),
        ],
        education: &[("BS Computer Science", "CU Boulder", 2017)],
        codehost: None,
        microblog: None,
        website: None,
    },
];

const MAX_DEMO_RESULTS: usize = 8;

/// Deterministic roster subset for a spec: people sharing tokens with
/// the query first, ties broken by name.
fn select(spec: &JobSpec) -> Vec<&'static DemoPerson> {
    let mut terms: Vec<String> = spec
        .required_skills
        .iter()
        .chain(spec.preferred_skills.iter())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if terms.is_empty() {
        // No skill terms: fall back to the title words.
        terms.extend(spec.title.split_whitespace().map(|t| t.to_lowercase()));
    }

    let overlap = |person: &DemoPerson| -> usize {
        let haystack = format!(
            "{} {}",
            person.skills.join(" ").to_lowercase(),
            person.headline.to_lowercase()
        );
        terms.iter().filter(|t| haystack.contains(t.as_str())).count()
    };

    let mut ranked: Vec<(usize, &DemoPerson)> =
        ROSTER.iter().map(|p| (overlap(p), p)).collect();
    let any_match = ranked.iter().any(|(n, _)| *n > 0);
    if any_match {
        ranked.retain(|(n, _)| *n > 0);
    }
    ranked.sort_by(|(an, a), (bn, b)| bn.cmp(an).then_with(|| a.name.cmp(b.name)));
    ranked.into_iter().take(MAX_DEMO_RESULTS).map(|(_, p)| p).collect()
}

/// Synthetic records for one source. Shapes mirror the live providers so
/// the normalizer exercises the same parsing path.
pub fn demo_records(source: SourceId, spec: &JobSpec) -> Vec<RawRecord> {
    select(spec)
        .into_iter()
        .filter_map(|person| payload_for(source, person))
        .map(|payload| RawRecord::synthetic(source, payload))
        .collect()
}

fn payload_for(source: SourceId, person: &DemoPerson) -> Option<Value> {
    match source {
        SourceId::Profiles => Some(json!({
            "name": person.name,
            "headline": person.headline,
            "location": person.location,
            "profile_url": person.profile_url,
            "connections": person.connections,
            "skills": person.skills,
            "experience": person.experience.iter().map(|(title, company, start, end, description)| json!({
                "title": title,
                "company": company,
                "start": start,
                "end": end,
                "description": description,
            })).collect::<Vec<_>>(),
            "education": person.education.iter().map(|(degree, school, year)| json!({
                "degree": degree,
                "school": school,
                "year": year,
            })).collect::<Vec<_>>(),
        })),
        SourceId::CodeHost => {
            let (username, repos, stars, followers, languages, cross_link) = person.codehost?;
            Some(json!({
                "username": username,
                "name": person.name,
                "location": person.location,
                "html_url": format!("https://codehost.example.com/{username}"),
                "profile_url": cross_link.then_some(person.profile_url),
                "public_repos": repos,
                "stars": stars,
                "followers": followers,
                "languages": languages,
            }))
        }
        SourceId::Microblog => {
            let (handle, followers, posts, cross_link) = person.microblog?;
            Some(json!({
                "handle": handle,
                "display_name": person.name,
                "bio": person.headline,
                "location": person.location,
                "followers": followers,
                "posts": posts,
                "profile_url": cross_link.then_some(person.profile_url),
            }))
        }
        SourceId::Website => {
            let (url, title, description, topics) = person.website?;
            Some(json!({
                "url": url,
                "title": title,
                "author": person.name,
                "description": description,
                "topics": topics,
            }))
        }
        SourceId::Ai => None,
    }
}
