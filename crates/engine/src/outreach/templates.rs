//! Deterministic outreach templates. Given the same context and class,
//! `render` is byte-identical across runs.

/// Structural template classes, selected from title/headline tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateClass {
    Executive,
    Researcher,
    Startup,
    Default,
}

impl TemplateClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executive => "executive",
            Self::Researcher => "researcher",
            Self::Startup => "startup",
            Self::Default => "default",
        }
    }
}

/// Everything a template (or the AI prompt) may reference.
#[derive(Clone, Debug)]
pub struct OutreachContext {
    pub first_name: String,
    pub recent_company: String,
    pub recent_title: String,
    pub top_skill_overlap: String,
    pub job_title: String,
    pub job_company: String,
    pub job_highlights: String,
}

/// Deterministic mapping from title/headline tokens to a class.
pub fn select_template(recent_title: &str, headline: &str) -> TemplateClass {
    let text = format!("{recent_title} {headline}").to_lowercase();
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let has_any = |words: &[&str]| tokens.iter().any(|t| words.contains(t));

    if has_any(&[
        "ceo", "cto", "cfo", "coo", "chief", "vp", "president", "director", "head",
    ]) {
        TemplateClass::Executive
    } else if has_any(&["research", "researcher", "scientist", "phd", "postdoc", "professor"]) {
        TemplateClass::Researcher
    } else if has_any(&["startup", "founding", "founder", "cofounder"]) {
        TemplateClass::Startup
    } else {
        TemplateClass::Default
    }
}

pub fn render(class: TemplateClass, ctx: &OutreachContext) -> String {
    match class {
        TemplateClass::Executive => format!(
            "Hi {first},\n\n\
             Your leadership track record at {company} speaks for itself. {job_company} is \
             looking for a {job_title} to shape the next phase of the team, and your depth in \
             {skill} is exactly what the search is centered on.\n\n\
             Worth knowing: {highlights}.\n\n\
             If a conversation would be interesting, I'd be glad to share more context.\n\n\
             Best regards,\n\
             {job_company} Talent Team",
            first = ctx.first_name,
            company = ctx.recent_company,
            job_company = ctx.job_company,
            job_title = ctx.job_title,
            skill = ctx.top_skill_overlap,
            highlights = ctx.job_highlights,
        ),
        TemplateClass::Researcher => format!(
            "Hi {first},\n\n\
             Your work on {skill} caught our attention, especially given your time at \
             {company}. We're hiring a {job_title} at {job_company}, with real scope for hard \
             problems and publishing.\n\n\
             Worth knowing: {highlights}.\n\n\
             Would you be open to comparing notes this week?\n\n\
             Best regards,\n\
             {job_company} Talent Team",
            first = ctx.first_name,
            skill = ctx.top_skill_overlap,
            company = ctx.recent_company,
            job_title = ctx.job_title,
            job_company = ctx.job_company,
            highlights = ctx.job_highlights,
        ),
        TemplateClass::Startup => format!(
            "Hi {first},\n\n\
             Building at {company} means you know what shipping under constraints looks like. \
             {job_company} is hiring a {job_title}: small team, large surface area, heavy use \
             of {skill}.\n\n\
             Worth knowing: {highlights}.\n\n\
             Open to hearing more?\n\n\
             Best regards,\n\
             {job_company} Talent Team",
            first = ctx.first_name,
            company = ctx.recent_company,
            job_company = ctx.job_company,
            job_title = ctx.job_title,
            skill = ctx.top_skill_overlap,
            highlights = ctx.job_highlights,
        ),
        TemplateClass::Default => format!(
            "Hi {first},\n\n\
             I came across your profile and your {skill} work at {company} stood out. We're \
             hiring a {job_title} at {job_company}, and your background as {title} looks like \
             a strong fit.\n\n\
             Worth knowing: {highlights}.\n\n\
             Would you be open to a quick chat this week?\n\n\
             Best regards,\n\
             {job_company} Talent Team",
            first = ctx.first_name,
            skill = ctx.top_skill_overlap,
            company = ctx.recent_company,
            job_title = ctx.job_title,
            job_company = ctx.job_company,
            title = ctx.recent_title,
            highlights = ctx.job_highlights,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> OutreachContext {
        OutreachContext {
            first_name: "Sarah".into(),
            recent_company: "Google".into(),
            recent_title: "Senior ML Engineer".into(),
            top_skill_overlap: "PyTorch".into(),
            job_title: "ML Research Engineer".into(),
            job_company: "Acme AI".into(),
            job_highlights: "competitive compute budget".into(),
        }
    }

    #[test]
    fn test_template_selection() {
        assert_eq!(
            select_template("VP of Engineering", ""),
            TemplateClass::Executive
        );
        assert_eq!(
            select_template("Research Scientist", ""),
            TemplateClass::Researcher
        );
        assert_eq!(
            select_template("Founding Engineer", "early-stage startup"),
            TemplateClass::Startup
        );
        assert_eq!(
            select_template("Senior ML Engineer", "building at Google"),
            TemplateClass::Default
        );
    }

    #[test]
    fn test_render_is_byte_identical() {
        let ctx = ctx();
        for class in [
            TemplateClass::Executive,
            TemplateClass::Researcher,
            TemplateClass::Startup,
            TemplateClass::Default,
        ] {
            assert_eq!(render(class, &ctx), render(class, &ctx));
        }
    }

    #[test]
    fn test_every_template_carries_the_context() {
        let ctx = ctx();
        for class in [
            TemplateClass::Executive,
            TemplateClass::Researcher,
            TemplateClass::Startup,
            TemplateClass::Default,
        ] {
            let body = render(class, &ctx);
            assert!(body.starts_with("Hi Sarah,"));
            assert!(body.contains("Google"));
            assert!(body.contains("PyTorch"));
            assert!(body.contains("ML Research Engineer"));
            assert!(body.ends_with("Acme AI Talent Team"));
        }
    }
}
