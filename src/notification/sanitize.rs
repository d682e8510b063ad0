//! Restricts rendered alerts to the HTML subset Telegram accepts.
//!
//! Only `<b>`, `<i>` and `<a href>` survive. Other tags are dropped while
//! their text is kept, except `<script>` and `<style>` which are removed with
//! their content. Bare `<`, `>` and `&` in text are escaped.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)((?:[^<>])*)>").expect("valid regex"));
static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});
static AMPERSAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);|&").expect("valid regex")
});

const ALLOWED_SCHEMES: [&str; 4] = ["http://", "https://", "tg://", "mailto:"];

fn escape_text(text: &str) -> String {
    let text = AMPERSAND.replace_all(text, |caps: &Captures| {
        if caps[0].len() == 1 { "&amp;".to_string() } else { caps[0].to_string() }
    });
    text.replace('<', "&lt;").replace('>', "&gt;")
}

fn rewrite_tag(caps: &Captures) -> Option<String> {
    let closing = &caps[1] == "/";
    let name = caps[2].to_ascii_lowercase();
    match (name.as_str(), closing) {
        ("b" | "i" | "a", true) => Some(format!("</{name}>")),
        ("b" | "i", false) => Some(format!("<{name}>")),
        ("a", false) => {
            let href = HREF
                .captures(&caps[3])
                .and_then(|h| h.get(1).or_else(|| h.get(2)))
                .map(|m| m.as_str().trim())
                .filter(|href| {
                    let lower = href.to_ascii_lowercase();
                    ALLOWED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
                });
            Some(match href {
                Some(href) => format!("<a href=\"{}\">", href.replace('"', "&quot;")),
                None => "<a>".to_string(),
            })
        }
        _ => None,
    }
}

/// Applies the allowlist to `html`.
pub fn sanitize_html(html: &str) -> String {
    let html = SCRIPT_BLOCK.replace_all(html, "");
    let html = STYLE_BLOCK.replace_all(&html, "");

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for caps in TAG.captures_iter(&html) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_text(&html[last..whole.start()]));
        if let Some(tag) = rewrite_tag(&caps) {
            out.push_str(&tag);
        }
        last = whole.end();
    }
    out.push_str(&escape_text(&html[last..]));
    out
}

/// Escapes a value before it is interpolated into the alert.
pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
