//! Text shaping helpers for handler output.

use std::sync::LazyLock;

use regex::Regex;

/// Code blocks longer than this are cut, keeping the head.
const MAX_CODE_LINES: usize = 200;

static FENCED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("invalid regex"));

static PRE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre><code>(.*?)</code></pre>").expect("invalid regex"));

/// Truncates overly long Markdown fences and `<pre><code>` blocks so a
/// single pasted log or source dump cannot dominate the extracted text.
pub fn truncate_code_blocks(input: &str) -> String {
    let result = FENCED_RE.replace_all(input, |caps: &regex::Captures<'_>| {
        match truncate_lines(&caps[1]) {
            Some(head) => format!("```{head}```"),
            None => caps[0].to_string(),
        }
    });
    PRE_CODE_RE
        .replace_all(&result, |caps: &regex::Captures<'_>| {
            match truncate_lines(&caps[1]) {
                Some(head) => format!("<pre><code>{head}</code></pre>"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Returns the truncated body with a marker line, or None when the block is
/// already within the limit.
fn truncate_lines(body: &str) -> Option<String> {
    let lines: Vec<&str> = body.split('\n').collect();
    if lines.len() <= MAX_CODE_LINES {
        return None;
    }
    let head = lines[..MAX_CODE_LINES].join("\n");
    let dropped = lines.len() - MAX_CODE_LINES;
    Some(format!("{head}\n... [truncated {dropped} lines] ...\n"))
}
