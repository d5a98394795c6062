mod anthropic;
pub mod llm;
mod openai;
pub mod templates;

pub use llm::{AiBackend, AiClient, AiError};
pub use templates::TemplateClass;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use prospect_common::config::AiConfig;
use prospect_common::types::{JobSpec, OutreachMessage, OutreachMethod, ScoredCandidate};

use crate::normalize::split_headline;
use crate::rate_limit::SourceRateLimiter;

use templates::OutreachContext;

/// AI responses shorter than this are unusable and fall back.
const MIN_BODY_CHARS: usize = 80;

/// Response fragments that mark an unusable AI body.
const BANNED_PHRASES: &[&str] = &[
    "as an ai",
    "language model",
    "i cannot",
    "i am unable",
    "i'm unable",
    "[insert",
    "{{",
];

/// Leading filler lines stripped from AI responses.
const FILLER_PREFIXES: &[&str] = &["sure", "here is", "here's", "certainly", "of course"];

/// Produces one personalized message per candidate: AI-backed when a
/// backend is configured and healthy, deterministic template otherwise.
pub struct OutreachGenerator {
    backend: Option<Arc<dyn AiBackend>>,
    timeout: Duration,
    max_output_chars: usize,
}

impl OutreachGenerator {
    pub fn from_config(config: &AiConfig, limiter: Arc<SourceRateLimiter>) -> Self {
        let backend = AiClient::new(config.clone(), limiter)
            .map(|client| Arc::new(client) as Arc<dyn AiBackend>);
        Self {
            backend,
            timeout: Duration::from_millis(config.timeout_ms.max(1)),
            max_output_chars: config.max_output_chars.max(MIN_BODY_CHARS),
        }
    }

    /// Explicit backend injection, used by tests.
    pub fn with_backend(
        backend: Option<Arc<dyn AiBackend>>,
        timeout: Duration,
        max_output_chars: usize,
    ) -> Self {
        Self {
            backend,
            timeout,
            max_output_chars,
        }
    }

    /// Never fails: any AI problem degrades to the template path, which
    /// is the only place `method = "template"` comes from.
    pub async fn generate(&self, scored: &ScoredCandidate, spec: &JobSpec) -> OutreachMessage {
        let context = build_context(scored, spec);
        let class = templates::select_template(&context.recent_title, &scored.candidate.headline);

        if let Some(backend) = self.backend.as_ref().filter(|b| b.healthy()) {
            let prompt = ai_prompt(&context, class);
            match tokio::time::timeout(self.timeout, backend.generate(&prompt)).await {
                Ok(Ok(text)) => {
                    if let Some(body) = clean_response(&text, &context, self.max_output_chars) {
                        metrics::counter!("outreach.generated", "method" => "ai").increment(1);
                        return message(scored, body, OutreachMethod::Ai);
                    }
                    tracing::debug!(
                        candidate = scored.candidate.identity_key.as_str(),
                        "AI response unusable, using template"
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "AI generation failed, using template");
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.timeout.as_millis() as u64,
                        "AI generation timed out, using template"
                    );
                }
            }
        }

        metrics::counter!("outreach.generated", "method" => "template").increment(1);
        let body = templates::render(class, &context);
        message(scored, body, OutreachMethod::Template)
    }
}

fn message(scored: &ScoredCandidate, body: String, method: OutreachMethod) -> OutreachMessage {
    OutreachMessage {
        candidate_ref: scored.candidate.identity_key.clone(),
        char_count: body.chars().count(),
        body,
        method,
        generated_at: Utc::now(),
    }
}

fn build_context(scored: &ScoredCandidate, spec: &JobSpec) -> OutreachContext {
    let candidate = &scored.candidate;

    let first_name = candidate
        .name
        .split_whitespace()
        .next()
        .unwrap_or("there")
        .to_string();

    let (mut recent_title, mut recent_company) = candidate
        .recent_experience()
        .map(|entry| (entry.title.clone(), entry.company.clone()))
        .unwrap_or_default();
    if recent_title.is_empty() || recent_company.is_empty() {
        let (headline_title, headline_company) = split_headline(&candidate.headline);
        if recent_title.is_empty() {
            recent_title = headline_title;
        }
        if recent_company.is_empty() {
            recent_company = headline_company;
        }
    }
    if recent_title.is_empty() {
        recent_title = "an experienced practitioner".to_string();
    }
    if recent_company.is_empty() {
        recent_company = "your current team".to_string();
    }

    // Highest-priority required skill the candidate actually has, in the
    // spec's own casing; preferred skills and then the candidate's first
    // skill are fallbacks.
    let top_skill_overlap = spec
        .required_skills
        .iter()
        .chain(spec.preferred_skills.iter())
        .find(|skill| candidate.skills.contains(&skill.trim().to_lowercase()))
        .cloned()
        .or_else(|| candidate.skills.iter().next().cloned())
        .unwrap_or_else(|| "your field".to_string());

    let job_highlights = if spec.highlights.is_empty() {
        "the team is growing quickly".to_string()
    } else {
        spec.highlights.join("; ")
    };

    OutreachContext {
        first_name,
        recent_company,
        recent_title,
        top_skill_overlap,
        job_title: spec.title.clone(),
        job_company: spec.company.clone(),
        job_highlights,
    }
}

/// Bounded prompt for the AI path, derived from the same context the
/// templates use.
fn ai_prompt(ctx: &OutreachContext, class: TemplateClass) -> String {
    format!(
        "Write a short recruiting outreach message (under 160 words) in a {tone} tone.\n\
         Candidate: {first_name}, currently {recent_title} at {recent_company}.\n\
         Shared skill to highlight: {skill}.\n\
         Role: {job_title} at {job_company}.\n\
         Selling points: {highlights}.\n\
         Requirements: greet the candidate by first name, mention the shared skill and \
         their company, name the role, end with a sign-off. No subject line, no placeholders.",
        tone = ctx_tone(class),
        first_name = ctx.first_name,
        recent_title = ctx.recent_title,
        recent_company = ctx.recent_company,
        skill = ctx.top_skill_overlap,
        job_title = ctx.job_title,
        job_company = ctx.job_company,
        highlights = ctx.job_highlights,
    )
}

fn ctx_tone(class: TemplateClass) -> &'static str {
    match class {
        TemplateClass::Executive => "peer-level, concise",
        TemplateClass::Researcher => "substantive, curiosity-driven",
        TemplateClass::Startup => "direct, energetic",
        TemplateClass::Default => "warm, professional",
    }
}

/// Strip leading filler, enforce greeting and closing, reject unusable
/// bodies (too short or containing banned phrases).
fn clean_response(text: &str, ctx: &OutreachContext, max_chars: usize) -> Option<String> {
    let mut body = text.trim().to_string();

    // Drop a leading filler line ("Sure, here's a draft:").
    if let Some((first_line, rest)) = body.split_once('\n') {
        let lead = first_line.trim().to_lowercase();
        if FILLER_PREFIXES.iter().any(|p| lead.starts_with(p)) {
            body = rest.trim_start().to_string();
        }
    }

    let lower = body.to_lowercase();
    if BANNED_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return None;
    }
    if body.chars().count() < MIN_BODY_CHARS {
        return None;
    }

    let has_greeting = ["hi ", "hello", "hey ", "dear "]
        .iter()
        .any(|g| lower.starts_with(g));
    if !has_greeting {
        body = format!("Hi {},\n\n{}", ctx.first_name, body);
    }

    if body.chars().count() > max_chars {
        body = truncate_at_word(&body, max_chars);
    }

    let has_closing = body
        .lines()
        .rev()
        .take(3)
        .any(|line| {
            let line = line.trim().to_lowercase();
            ["best", "regards", "cheers", "sincerely", "thanks", "thank you", "warmly"]
                .iter()
                .any(|marker| line.starts_with(marker))
        });
    if !has_closing {
        body = format!("{}\n\nBest regards,\n{} Talent Team", body, ctx.job_company);
    }

    Some(body)
}

fn truncate_at_word(body: &str, max_chars: usize) -> String {
    let truncated: String = body.chars().take(max_chars).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(idx) => truncated[..idx].trim_end().to_string(),
        None => truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::future::Future;
    use std::pin::Pin;

    use chrono::NaiveDate;
    use prospect_common::types::{Candidate, ExperienceEntry, SeniorityHint};

    fn sarah() -> ScoredCandidate {
        let mut skills = BTreeSet::new();
        for skill in ["pytorch", "python", "tensorflow"] {
            skills.insert(skill.to_string());
        }
        ScoredCandidate {
            candidate: Candidate {
                identity_key: "https://profiles.example.com/in/sarah-chen".into(),
                name: "Sarah Chen".into(),
                headline: "Senior ML Engineer at Google • PyTorch Expert".into(),
                location: "San Francisco, CA".into(),
                primary_profile_url: Some("https://profiles.example.com/in/sarah-chen".into()),
                experience: vec![ExperienceEntry {
                    title: "Senior ML Engineer".into(),
                    company: "Google".into(),
                    start: NaiveDate::from_ymd_opt(2021, 3, 1),
                    end: None,
                    description: String::new(),
                }],
                education: vec![],
                skills,
                sources: BTreeMap::new(),
                completeness: 0.9,
            },
            fit_score: 8.4,
            breakdown: BTreeMap::new(),
            confidence: 0.8,
            insights: vec![],
        }
    }

    fn ml_spec() -> JobSpec {
        JobSpec {
            id: "job-1".into(),
            title: "ML Research Engineer".into(),
            company: "Acme AI".into(),
            description: String::new(),
            highlights: vec![],
            required_skills: vec!["PyTorch".into(), "Python".into()],
            preferred_skills: vec![],
            location_preferences: vec![],
            seniority_hint: SeniorityHint::Senior,
            rubric_weights: None,
            max_candidates: 5,
            include_outreach: true,
        }
    }

    struct MockBackend {
        response: Result<String, ()>,
        delay: Duration,
    }

    impl AiBackend for MockBackend {
        fn generate<'a>(
            &'a self,
            _prompt: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                match &self.response {
                    Ok(text) => Ok(text.clone()),
                    Err(()) => Err(AiError::Http("connection reset".into())),
                }
            })
        }
    }

    /// AI backend disabled: method is "template", greeting and the
    /// job/candidate substrings are present, body ends with a sign-off.
    #[tokio::test]
    async fn test_template_fallback_without_backend() {
        let generator =
            OutreachGenerator::with_backend(None, Duration::from_secs(15), 1_200);
        let message = generator.generate(&sarah(), &ml_spec()).await;

        assert_eq!(message.method, OutreachMethod::Template);
        assert!(message.body.starts_with("Hi Sarah,"));
        assert!(message.body.contains("Google"));
        assert!(message.body.contains("PyTorch"));
        assert!(message.body.contains("ML Research Engineer"));
        assert!(message.body.ends_with("Acme AI Talent Team"));
        assert_eq!(message.char_count, message.body.chars().count());
    }

    #[tokio::test]
    async fn test_template_output_is_byte_identical() {
        let generator =
            OutreachGenerator::with_backend(None, Duration::from_secs(15), 1_200);
        let a = generator.generate(&sarah(), &ml_spec()).await;
        let b = generator.generate(&sarah(), &ml_spec()).await;
        assert_eq!(a.body, b.body);
    }

    #[tokio::test]
    async fn test_usable_ai_response_is_used() {
        let response = "Hi Sarah,\n\nYour PyTorch work at Google is impressive, and the \
                        ML Research Engineer role at Acme AI could be a great match for you.\n\n\
                        Best regards,\nAcme AI Talent Team";
        let backend = Arc::new(MockBackend {
            response: Ok(response.to_string()),
            delay: Duration::ZERO,
        });
        let generator = OutreachGenerator::with_backend(
            Some(backend),
            Duration::from_secs(15),
            1_200,
        );
        let message = generator.generate(&sarah(), &ml_spec()).await;
        assert_eq!(message.method, OutreachMethod::Ai);
        assert!(message.body.starts_with("Hi Sarah,"));
    }

    #[tokio::test]
    async fn test_banned_phrase_falls_back_to_template() {
        let backend = Arc::new(MockBackend {
            response: Ok(
                "As an AI language model, I would write something like this outreach \
                 message body which is certainly long enough to pass the length check."
                    .to_string(),
            ),
            delay: Duration::ZERO,
        });
        let generator = OutreachGenerator::with_backend(
            Some(backend),
            Duration::from_secs(15),
            1_200,
        );
        let message = generator.generate(&sarah(), &ml_spec()).await;
        assert_eq!(message.method, OutreachMethod::Template);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out_to_template() {
        let backend = Arc::new(MockBackend {
            response: Ok("never delivered".to_string()),
            delay: Duration::from_secs(60),
        });
        let generator = OutreachGenerator::with_backend(
            Some(backend),
            Duration::from_secs(1),
            1_200,
        );
        let message = generator.generate(&sarah(), &ml_spec()).await;
        assert_eq!(message.method, OutreachMethod::Template);
    }

    #[tokio::test]
    async fn test_transport_error_falls_back_to_template() {
        let backend = Arc::new(MockBackend {
            response: Err(()),
            delay: Duration::ZERO,
        });
        let generator = OutreachGenerator::with_backend(
            Some(backend),
            Duration::from_secs(15),
            1_200,
        );
        let message = generator.generate(&sarah(), &ml_spec()).await;
        assert_eq!(message.method, OutreachMethod::Template);
    }

    #[test]
    fn test_clean_response_adds_greeting_and_closing() {
        let ctx = OutreachContext {
            first_name: "Sarah".into(),
            recent_company: "Google".into(),
            recent_title: "Senior ML Engineer".into(),
            top_skill_overlap: "PyTorch".into(),
            job_title: "ML Research Engineer".into(),
            job_company: "Acme AI".into(),
            job_highlights: "compute budget".into(),
        };
        let raw = "Sure, here's a draft:\nYour PyTorch work at Google stood out to us and \
                   we think the ML Research Engineer opening could be a strong mutual fit.";
        let cleaned = clean_response(raw, &ctx, 1_200).unwrap();
        assert!(cleaned.starts_with("Hi Sarah,"));
        assert!(cleaned.contains("Talent Team"));
        assert!(!cleaned.to_lowercase().starts_with("sure"));
    }
}
