//! File naming and payload for the "download code" action.

/// A generated script offered as a file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDownload {
    pub file_name: String,
    /// Exactly the code text that is displayed.
    pub content: String,
}

impl ChartDownload {
    pub fn new(query: &str, code: &str, prefix_chars: usize) -> Self {
        Self {
            file_name: download_file_name(query, prefix_chars),
            content: code.to_string(),
        }
    }

    pub const CONTENT_TYPE: &'static str = "text/plain; charset=utf-8";
}

/// `chart_{prefix}.py`, where the prefix is the first `prefix_chars`
/// characters of the query with spaces replaced by underscores.
///
/// Control characters and path or quote characters (`/`, `\`, `"`) also
/// become underscores so the name is safe in a header and on disk.
pub fn download_file_name(query: &str, prefix_chars: usize) -> String {
    let prefix: String = query
        .chars()
        .take(prefix_chars)
        .map(|c| match c {
            ' ' | '/' | '\\' | '"' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("chart_{prefix}.py")
}

/// `Content-Disposition` value for `file_name`: an ASCII `filename` fallback
/// plus the exact name as RFC 5987 `filename*`.
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}
