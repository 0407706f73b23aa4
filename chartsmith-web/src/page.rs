//! HTML rendering for the single Chartsmith page.
//!
//! Produces a standalone document with embedded CSS. Every piece of user or
//! model text goes through `escape_html` before it lands in the markup.

use chartsmith_core::session::{ResearchSession, RunState};

/// Queries offered in the sidebar.
pub const EXAMPLE_QUERIES: [&str; 5] = [
    "Top 10 most populated countries bar chart",
    "UK GDP past 3 years line chart",
    "Bitcoin price trend last 6 months",
    "Global temperature trends decade",
    "IPL winners last 5 years scores",
];

const PAGE_TITLE: &str = "AI Research & Chart Generator";

/// Whether a chat API key is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    Ready,
    Missing { env_var: String },
}

/// One-off message shown above the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Warning(String),
    Error(String),
}

/// Everything one render needs.
#[derive(Debug)]
pub struct PageView<'a> {
    pub session: &'a ResearchSession,
    pub key: KeyStatus,
    pub notice: Option<Notice>,
    /// The response to a submission; shows the run panels.
    pub fresh_run: bool,
}

/// Render the full page.
pub fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(PAGE_TITLE)));
    html.push_str("<style>\n");
    html.push_str(CSS_STYLES);
    html.push_str("</style>\n</head>\n<body>\n");

    html.push_str("<div class=\"layout\">\n");
    render_sidebar(&mut html);

    html.push_str("<main>\n");
    html.push_str("<div class=\"main-header\">\n");
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(PAGE_TITLE)));
    html.push_str("<p>AI-Powered Data Research and Visualization Code Generator</p>\n");
    html.push_str("</div>\n");

    match &view.key {
        KeyStatus::Missing { env_var } => {
            // Nothing below the halt is rendered, the form included.
            render_missing_key(&mut html, env_var);
            html.push_str("</main>\n</div>\n</body>\n</html>\n");
            return html;
        }
        KeyStatus::Ready => {
            html.push_str("<div class=\"alert success\">AI System Ready!</div>\n");
        }
    }

    render_form(&mut html, view.session);

    match &view.notice {
        Some(Notice::Warning(msg)) => {
            html.push_str(&format!(
                "<div class=\"alert warning\">{}</div>\n",
                escape_html(msg)
            ));
        }
        Some(Notice::Error(msg)) => {
            html.push_str(&format!(
                "<div class=\"alert error\">{}</div>\n",
                escape_html(msg)
            ));
        }
        None => {}
    }

    if view.fresh_run {
        render_run(&mut html, view.session);
    }

    if view.session.has_results() {
        render_previous(&mut html, view.session);
    }

    html.push_str("</main>\n</div>\n</body>\n</html>\n");
    html
}

fn render_sidebar(html: &mut String) {
    html.push_str("<aside class=\"sidebar\">\n");
    html.push_str("<h2>How it works</h2>\n<ol>\n");
    html.push_str("<li><strong>Research</strong>: AI searches for your data</li>\n");
    html.push_str("<li><strong>Generate</strong>: AI creates Python chart code</li>\n");
    html.push_str("<li><strong>Copy</strong>: Copy code to run locally</li>\n");
    html.push_str("</ol>\n");

    html.push_str("<h2>Example Queries</h2>\n");
    for query in EXAMPLE_QUERIES {
        let q = escape_html(query);
        html.push_str("<form method=\"post\" action=\"/select\" class=\"example\">\n");
        html.push_str(&format!(
            "<input type=\"hidden\" name=\"query\" value=\"{q}\">\n<button type=\"submit\">{q}</button>\n"
        ));
        html.push_str("</form>\n");
    }
    html.push_str("</aside>\n");
}

fn render_missing_key(html: &mut String, env_var: &str) {
    html.push_str("<div class=\"alert error\">OpenAI API key not found!</div>\n");
    html.push_str(&format!(
        "<div class=\"alert info\">Set <code>{}</code> in the environment, or add it to the secrets file:</div>\n",
        escape_html(env_var)
    ));
    let example = format!("{env_var} = \"sk-your-key-here\"");
    html.push_str(&format!(
        "<pre><code>{}</code></pre>\n",
        escape_html(&example)
    ));
}

fn render_form(html: &mut String, session: &ResearchSession) {
    // A pick made after the last run wins over the query that was run.
    let value = session
        .selected_query
        .as_deref()
        .or(session.query.as_deref())
        .unwrap_or_default();
    html.push_str("<form method=\"post\" action=\"/generate\" class=\"query\">\n");
    html.push_str("<label for=\"query\">What would you like to research and visualize?</label>\n");
    html.push_str(&format!(
        "<input type=\"text\" id=\"query\" name=\"query\" value=\"{}\" \
         placeholder=\"e.g., Show me top 10 most populated countries with a bar chart\">\n",
        escape_html(value)
    ));
    html.push_str("<button type=\"submit\" class=\"primary\">Generate Research &amp; Chart Code</button>\n");
    html.push_str("</form>\n");
}

fn render_run(html: &mut String, session: &ResearchSession) {
    if let Some(research) = &session.research {
        html.push_str("<div class=\"step-box research-box\"><h3>Research Results</h3></div>\n");
        html.push_str(&format!(
            "<div class=\"research\">{}</div>\n",
            escape_html(research)
        ));
        if let Some(outline) = &session.outline
            && !outline.is_complete()
        {
            html.push_str(&format!(
                "<p class=\"note\">Research did not include: {}</p>\n",
                escape_html(&outline.missing_labels())
            ));
        }
    }

    if let Some(code) = &session.code {
        html.push_str("<div class=\"step-box code-box\"><h3>Generated Chart Code</h3></div>\n");
        html.push_str(&format!(
            "<pre><code class=\"language-python\">{}</code></pre>\n",
            escape_html(code)
        ));
        html.push_str("<div class=\"alert success\">Chart code generated successfully!</div>\n");
        html.push_str(
            "<div class=\"alert info\">Copy the code above and run it in your local Python environment.</div>\n",
        );
        html.push_str("<a class=\"download\" href=\"/download\">Download Python Code</a>\n");
    }

    if let RunState::Failed {
        stage,
        kind,
        detail,
    } = &session.state
    {
        html.push_str("<div class=\"alert error failure\">\n");
        html.push_str(&format!(
            "<strong>{} failed</strong> <span class=\"badge\">{}</span>\n",
            escape_html(&capitalize(&stage.to_string())),
            escape_html(&kind.to_string())
        ));
        html.push_str(&format!("<p>{}</p>\n", escape_html(detail)));
        html.push_str("</div>\n");
    }
}

fn render_previous(html: &mut String, session: &ResearchSession) {
    let (Some(research), Some(code)) = (&session.research, &session.code) else {
        return;
    };
    html.push_str("<hr>\n<section class=\"previous\">\n<h2>Previous Results</h2>\n");
    html.push_str("<details>\n<summary>View Research Data</summary>\n");
    html.push_str(&format!(
        "<div class=\"research\">{}</div>\n",
        escape_html(research)
    ));
    html.push_str("</details>\n");
    html.push_str("<details>\n<summary>View Chart Code</summary>\n");
    html.push_str(&format!(
        "<pre><code class=\"language-python\">{}</code></pre>\n",
        escape_html(code)
    ));
    html.push_str("</details>\n</section>\n");
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Escape text for HTML element and attribute contexts.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS_STYLES: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; color: #333; background: #fafafa; }
.layout { display: flex; min-height: 100vh; }
.sidebar { width: 280px; padding: 20px; background: #f0f2f6; }
.sidebar form.example button { width: 100%; margin: 4px 0; padding: 8px; text-align: left; background: white; border: 1px solid #ddd; border-radius: 6px; cursor: pointer; }
main { flex: 1; max-width: 960px; padding: 20px 40px; }
.main-header { text-align: center; padding: 1rem 0; background: linear-gradient(90deg, #667eea 0%, #764ba2 100%); color: white; border-radius: 10px; margin-bottom: 2rem; }
.alert { padding: 10px 14px; border-radius: 6px; margin: 10px 0; }
.alert.success { background: #e8f5e9; color: #1b5e20; }
.alert.info { background: #e3f2fd; color: #0d47a1; }
.alert.warning { background: #fff8e1; color: #8a6d00; }
.alert.error { background: #ffebee; color: #b71c1c; }
form.query label { display: block; font-weight: 600; margin-bottom: 6px; }
form.query input[type=text] { width: 100%; padding: 8px; box-sizing: border-box; }
button.primary { width: 100%; margin-top: 10px; padding: 10px; background: #ff4b4b; color: white; border: none; border-radius: 6px; cursor: pointer; }
.step-box { padding: 1rem; border-radius: 10px; margin: 1rem 0; border-left: 4px solid #667eea; background-color: #f9f9f9; }
.research-box { border-left-color: #28a745; }
.code-box { border-left-color: #fd7e14; }
.research { white-space: pre-wrap; }
pre { background: #f5f5f5; padding: 12px; border-radius: 6px; overflow-x: auto; }
.badge { display: inline-block; padding: 2px 8px; border-radius: 4px; font-size: 0.85em; background: #b71c1c; color: white; }
.note { color: #777; font-style: italic; }
a.download { display: inline-block; padding: 8px 14px; border: 1px solid #ddd; border-radius: 6px; text-decoration: none; color: #333; }
"#;
