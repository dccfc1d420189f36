//! Boilerplate-stripping text extraction from raw HTML.

use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Elements whose subtrees never contribute to document text.
const NON_CONTENT_TAGS: &[&str] = &[
    "script", "style", "noscript", "header", "footer", "nav", "aside",
];

/// Extraction result for one page.
#[derive(Debug, Clone)]
pub struct Extracted {
    /// Text of the document's `<title>` element (empty when absent).
    pub title: String,
    /// Normalized main text with boilerplate removed.
    pub content: String,
    /// Best-effort publication/modification timestamp.
    pub published_at: Option<DateTime<Utc>>,
}

/// Extract title, main textual content, and a publication timestamp from HTML.
///
/// Content comes from the first `<main>` element, falling back to `<body>`
/// when there is no `<main>` or its text is empty. Script/style/navigation
/// subtrees are excluded from the text walk.
pub fn extract(html: &str) -> Extracted {
    let doc = Html::parse_document(html);

    let title_sel = Selector::parse("title").unwrap();
    let title = doc
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let main_sel = Selector::parse("main").unwrap();
    let body_sel = Selector::parse("body").unwrap();

    let mut content = doc
        .select(&main_sel)
        .next()
        .map(|el| content_text(el))
        .unwrap_or_default();
    if content.is_empty() {
        debug!("no usable <main> region, falling back to <body>");
        content = doc
            .select(&body_sel)
            .next()
            .map(|el| content_text(el))
            .unwrap_or_default();
    }

    Extracted {
        title,
        content,
        published_at: published_at(&doc),
    }
}

/// Collect the trimmed text of an element, skipping non-content subtrees.
fn content_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out.trim().to_string()
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if !NON_CONTENT_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Find a publication timestamp: an explicit `datetime` attribute, then the
/// article-modified meta tag, then a last-modified meta tag. Unparseable or
/// absent values yield `None`.
fn published_at(doc: &Html) -> Option<DateTime<Utc>> {
    let candidates = [
        ("[datetime]", "datetime"),
        (r#"meta[property="article:modified_time"]"#, "content"),
        (r#"meta[name="last-modified"]"#, "content"),
    ];

    for (sel_str, attr) in candidates {
        let sel = Selector::parse(sel_str).unwrap();
        if let Some(raw) = doc.select(&sel).next().and_then(|el| el.value().attr(attr)) {
            return parse_timestamp(raw.trim());
        }
    }
    None
}

/// Parse a timestamp in any of the formats government pages actually use.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    debug!(raw, "unparseable publication timestamp");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn strips_boilerplate_and_prefers_main() {
        let html = r#"<html>
<head><title>Student visa (subclass 500)</title><script>analytics();</script></head>
<body>
  <header>Department of Home Affairs</header>
  <nav><a href="/visas">Visas</a></nav>
  <main>
    <h1>Student visa</h1>
    <p>Stay in Australia to study full-time.</p>
    <aside>Related links</aside>
  </main>
  <footer>Copyright</footer>
</body>
</html>"#;

        let extracted = extract(html);
        assert_eq!(extracted.title, "Student visa (subclass 500)");
        assert!(extracted.content.contains("Student visa"));
        assert!(extracted.content.contains("study full-time"));
        assert!(!extracted.content.contains("Department of Home Affairs"));
        assert!(!extracted.content.contains("Related links"));
        assert!(!extracted.content.contains("Copyright"));
        assert!(!extracted.content.contains("analytics"));
    }

    #[test]
    fn falls_back_to_body_without_main() {
        let html = r#"<html><head><title>Plain</title></head>
<body><p>Body-only content here.</p><script>var x = 1;</script></body></html>"#;

        let extracted = extract(html);
        assert!(extracted.content.contains("Body-only content here."));
        assert!(!extracted.content.contains("var x"));
    }

    #[test]
    fn empty_main_falls_back_to_body() {
        let html = r#"<html><body><main>  </main><p>Outside the main region.</p></body></html>"#;
        let extracted = extract(html);
        assert!(extracted.content.contains("Outside the main region."));
    }

    #[test]
    fn published_at_from_datetime_attribute() {
        let html = r#"<html><body><main>
<time datetime="2024-03-15T10:30:00+11:00">15 March 2024</time>
<p>Migration program update for the year.</p>
</main></body></html>"#;

        let extracted = extract(html);
        let published = extracted.published_at.expect("datetime attribute parses");
        assert_eq!(published.year(), 2024);
        assert_eq!(published.month(), 3);
    }

    #[test]
    fn published_at_from_modified_meta() {
        let html = r#"<html><head>
<meta property="article:modified_time" content="2023-11-02T00:00:00Z">
</head><body><main><p>Content</p></main></body></html>"#;

        let extracted = extract(html);
        let published = extracted.published_at.expect("meta tag parses");
        assert_eq!(published.year(), 2023);
        assert_eq!(published.month(), 11);
    }

    #[test]
    fn published_at_accepts_bare_dates() {
        assert!(parse_timestamp("2024-07-01").is_some());
        assert!(parse_timestamp("Tue, 02 Jul 2024 08:00:00 GMT").is_some());
    }

    #[test]
    fn unparseable_timestamp_is_none() {
        let html = r#"<html><body><main>
<time datetime="sometime last winter">date</time><p>Content</p>
</main></body></html>"#;

        let extracted = extract(html);
        assert!(extracted.published_at.is_none());
    }

    #[test]
    fn missing_title_is_empty() {
        let extracted = extract("<html><body><main><p>No title page</p></main></body></html>");
        assert_eq!(extracted.title, "");
    }
}
