mod candidate;
mod job;
mod result;

pub use candidate::{
    Candidate, EducationEntry, Enrichment, EnrichmentDetail, ExperienceEntry, RawRecord, SourceId,
};
pub use job::{Dimension, JobPhase, JobSpec, SeniorityHint, WEIGHT_SUM_EPSILON};
pub use result::{
    failure_reason, JobResult, OutreachMessage, OutreachMethod, PartialFailure, ScoredCandidate,
};
