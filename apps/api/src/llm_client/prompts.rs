//! Prompt templates. Callers fill `{placeholder}` slots with `.replace`.

pub const TAILOR_SYSTEM: &str = "You are an expert resume writer specialized in tailoring \
candidate material to a specific job description for applicant tracking systems. \
You respond with a single valid JSON object and nothing else — no prose, no markdown fences.";

pub const TAILOR_PROMPT_TEMPLATE: &str = r#"Tailor a resume for the candidate below against the given job description.

Return a JSON object with exactly these fields:
- "name": candidate full name (string)
- "title": the headline to present the candidate under (string)
- "summary": 3-4 sentence professional summary targeting the role (string)
- "skills": skills ordered by relevance to the job description (array of strings)
- "experience": array of {"company", "role", "period", "bullets"} where "bullets"
  is an array of achievement strings rephrased toward the job description
- "education": array of {"institution", "degree", "period"}

Use only facts present in the candidate material. Do not invent employers,
dates, or credentials.

--- Candidate Resume ---
{resume_text}

--- Professional Profile Export ---
{profile_text}

--- Job Description ---
{job_text}
"#;

/// System turn for the follow-up assistant, grounded in the same material the
/// tailored resume was generated from. Built exactly once per (user, job)
/// transcript.
pub const CHAT_SYSTEM_TEMPLATE: &str = r#"You are a helpful assistant specialized in career assistance. Your goal is to provide clear, actionable, and practical advice to help users present themselves at their best, land interviews, and succeed in their career transitions.
Take the following information as reference for the candidate and opportunity.

--- Candidate Resume ---
{resume_text}

--- Professional Profile Export ---
{profile_text}

--- Job Description ---
{job_text}
"#;

pub fn fill_tailor_prompt(resume_text: &str, profile_text: &str, job_text: &str) -> String {
    TAILOR_PROMPT_TEMPLATE
        .replace("{resume_text}", resume_text)
        .replace("{profile_text}", profile_text)
        .replace("{job_text}", job_text)
}

pub fn fill_chat_system(resume_text: &str, profile_text: &str, job_text: &str) -> String {
    CHAT_SYSTEM_TEMPLATE
        .replace("{resume_text}", resume_text)
        .replace("{profile_text}", profile_text)
        .replace("{job_text}", job_text)
}
