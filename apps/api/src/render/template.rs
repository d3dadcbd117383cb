//! Built-in resume template and the fill logic that expands a structured
//! generation result into a self-contained HTML document.

use serde_json::Value;

use super::RenderError;

/// The only template currently shipped; selected through `Config::template_key`.
pub const DEFAULT_TEMPLATE_KEY: &str = "classic";

const CLASSIC_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{name} — Tailored Resume</title>
<style>
  body { font-family: Georgia, serif; max-width: 48rem; margin: 2rem auto; color: #1a1a1a; }
  h1 { margin-bottom: 0; }
  h2 { border-bottom: 1px solid #999; padding-bottom: 2px; margin-top: 1.5rem; }
  .title { color: #555; font-size: 1.1rem; margin-top: 0.2rem; }
  .period { color: #777; font-style: italic; }
  ul { margin-top: 0.3rem; }
</style>
</head>
<body>
<h1>{name}</h1>
<p class="title">{title}</p>
<h2>Summary</h2>
<p>{summary}</p>
<h2>Skills</h2>
<ul>{skills}</ul>
<h2>Experience</h2>
{experience}
<h2>Education</h2>
{education}
</body>
</html>
"#;

/// Deterministic storage key for the rendered document of one (identity, job)
/// pair. The exploration stage re-derives this instead of storing a path.
pub fn document_key(identity: &str, job_id: i64) -> String {
    format!("resumes/{identity}/job-{job_id}.html")
}

/// Resolves a template key to its HTML body.
pub fn lookup_template(template_key: &str) -> Result<&'static str, RenderError> {
    match template_key {
        DEFAULT_TEMPLATE_KEY => Ok(CLASSIC_TEMPLATE),
        other => Err(RenderError::UnknownTemplate(other.to_string())),
    }
}

/// Fills a template with the structured result. The result must be a JSON
/// object; absent fields render as empty sections rather than failing, since
/// the generation schema is the Generation Service's own contract.
pub fn fill_template(template_key: &str, result: &Value) -> Result<String, RenderError> {
    let template = lookup_template(template_key)?;

    let fields = result
        .as_object()
        .ok_or_else(|| RenderError::BadPayload("generation result is not a JSON object".into()))?;

    let text = |key: &str| -> String {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(escape_html)
            .unwrap_or_default()
    };

    let skills = fields
        .get("skills")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| format!("<li>{}</li>", escape_html(s)))
                .collect::<String>()
        })
        .unwrap_or_default();

    let experience = fields
        .get("experience")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(render_experience).collect::<String>())
        .unwrap_or_default();

    let education = fields
        .get("education")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(render_education).collect::<String>())
        .unwrap_or_default();

    Ok(template
        .replace("{name}", &text("name"))
        .replace("{title}", &text("title"))
        .replace("{summary}", &text("summary"))
        .replace("{skills}", &skills)
        .replace("{experience}", &experience)
        .replace("{education}", &education))
}

fn render_experience(entry: &Value) -> String {
    let field = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(escape_html)
            .unwrap_or_default()
    };
    let bullets = entry
        .get("bullets")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|b| format!("<li>{}</li>", escape_html(b)))
                .collect::<String>()
        })
        .unwrap_or_default();

    format!(
        "<h3>{role} — {company}</h3><p class=\"period\">{period}</p><ul>{bullets}</ul>",
        role = field("role"),
        company = field("company"),
        period = field("period"),
    )
}

fn render_education(entry: &Value) -> String {
    let field = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(escape_html)
            .unwrap_or_default()
    };
    format!(
        "<p><strong>{degree}</strong>, {institution} <span class=\"period\">{period}</span></p>",
        degree = field("degree"),
        institution = field("institution"),
        period = field("period"),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
