//! HTML → title, headed text sections, and outbound links.
//!
//! Best effort and total: malformed markup yields whatever structure can be
//! recovered, possibly nothing.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use policygraph_shared::PageChunk;

/// Paragraph/list text shorter than this is navigation noise.
pub const MIN_TEXT_CHARS: usize = 20;

/// Heading used for content that precedes the first heading.
pub const DEFAULT_HEADING: &str = "Overview";

/// Elements whose text never counts as page content.
const HIDDEN_TAGS: [&str; 3] = ["script", "style", "noscript"];

static BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, p, li").expect("valid block selector"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));
static LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Structure recovered from one HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub title: String,
    pub chunks: Vec<PageChunk>,
    /// Absolute, fragment-free links in first-seen order.
    pub links: Vec<String>,
}

/// Parse `html`, resolving links against `base_url`.
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE)
        .next()
        .map(element_text)
        .unwrap_or_default();

    ParsedPage {
        title,
        chunks: extract_chunks(&doc),
        links: extract_links(&doc, base_url),
    }
}

fn extract_chunks(doc: &Html) -> Vec<PageChunk> {
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();

    for el in doc.select(&BLOCKS) {
        if is_hidden(el) {
            continue;
        }
        let text = element_text(el);

        if matches!(el.value().name(), "h1" | "h2" | "h3") {
            if !text.is_empty() {
                sections.push((text, Vec::new()));
            }
            continue;
        }

        if text.chars().count() < MIN_TEXT_CHARS {
            continue;
        }
        if sections.is_empty() {
            sections.push((DEFAULT_HEADING.to_string(), Vec::new()));
        }
        if let Some((_, parts)) = sections.last_mut() {
            parts.push(text);
        }
    }

    sections
        .into_iter()
        .filter_map(|(heading, parts)| {
            let text = parts.join("\n").trim().to_string();
            (text.chars().count() >= MIN_TEXT_CHARS).then_some((heading, text))
        })
        .enumerate()
        .map(|(order, (heading, text))| PageChunk {
            heading,
            order,
            text,
        })
        .collect()
}

/// Extract links from a document, resolved against the base URL.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&LINKS) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let lower = href.to_ascii_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            continue;
        }

        let Ok(mut resolved) = base_url.join(href) else {
            continue;
        };
        resolved.set_fragment(None);
        let resolved = resolved.to_string();
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

/// Whitespace-normalized visible text of an element.
fn element_text(el: ElementRef<'_>) -> String {
    let mut words: Vec<&str> = Vec::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .take_while(|a| a.id() != el.id())
            .any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
            });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

fn is_hidden(el: ElementRef<'_>) -> bool {
    el.ancestors().any(|a| {
        a.value()
            .as_element()
            .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.tiktok.com/community-guidelines/en/overview").unwrap()
    }

    #[test]
    fn splits_sections_on_headings() {
        let html = r#"<html><head><title> Community Guidelines </title></head><body>
            <h1>Safety and Civility</h1>
            <p>We do not allow violent extremism on the platform.</p>
            <p>short</p>
            <h2>Hate Speech</h2>
            <p>We do not allow hateful behavior of any kind here.</p>
            <ul><li>Slurs targeting protected attributes are removed.</li></ul>
        </body></html>"#;

        let page = parse_html(html, &base());
        assert_eq!(page.title, "Community Guidelines");
        assert_eq!(page.chunks.len(), 2);

        assert_eq!(page.chunks[0].heading, "Safety and Civility");
        assert_eq!(page.chunks[0].order, 0);
        assert_eq!(page.chunks[0].text, "We do not allow violent extremism on the platform.");

        assert_eq!(page.chunks[1].heading, "Hate Speech");
        assert_eq!(page.chunks[1].order, 1);
        assert_eq!(
            page.chunks[1].text,
            "We do not allow hateful behavior of any kind here.\nSlurs targeting protected attributes are removed."
        );
    }

    #[test]
    fn leading_content_goes_to_overview() {
        let html = "<body><p>This introduction has no heading above it.</p><h2>Rules</h2><p>Follow these rules at all times please.</p></body>";
        let page = parse_html(html, &base());
        assert_eq!(page.chunks[0].heading, DEFAULT_HEADING);
        assert_eq!(page.chunks[1].heading, "Rules");
    }

    #[test]
    fn drops_sections_below_noise_floor() {
        let html = "<body><h2>Empty</h2><p>tiny</p><h2>Full</h2><p>This paragraph is long enough to keep.</p></body>";
        let page = parse_html(html, &base());
        assert_eq!(page.chunks.len(), 1);
        assert_eq!(page.chunks[0].heading, "Full");
        assert_eq!(page.chunks[0].order, 0);
    }

    #[test]
    fn ignores_script_and_style_text() {
        let html = r#"<body><h2>Rules</h2>
            <p>Visible policy text for readers. <script>var tracking = "ignore me please";</script></p>
            <style>p { color: red; }</style></body>"#;
        let page = parse_html(html, &base());
        assert_eq!(page.chunks[0].text, "Visible policy text for readers.");
    }

    #[test]
    fn extracts_links() {
        let html = r##"<body>
            <a href="/community-guidelines/en/safety">Safety</a>
            <a href="youth#minors">Youth</a>
            <a href="#top">Top</a>
            <a href="javascript:void(0)">JS</a>
            <a href="MAILTO:help@example.com">Mail</a>
            <a href="tel:+100">Call</a>
            <a href="">Empty</a>
            <a href="/community-guidelines/en/safety#again">Safety again</a>
            <a href="https://external.example/page">External</a>
        </body>"##;

        let page = parse_html(html, &base());
        assert_eq!(
            page.links,
            vec![
                "https://www.tiktok.com/community-guidelines/en/safety".to_string(),
                "https://www.tiktok.com/community-guidelines/en/youth".to_string(),
                "https://external.example/page".to_string(),
            ]
        );
    }

    #[test]
    fn garbage_input_yields_empty_page() {
        let page = parse_html("\u{0}<<<>>>not html at all", &base());
        assert_eq!(page.title, "");
        assert!(page.chunks.is_empty());
        assert!(page.links.is_empty());
    }

    #[test]
    fn collapses_internal_whitespace() {
        let html = "<title>A\n   Title</title><body><p>Line one of the text\n\n     and line two.</p></body>";
        let page = parse_html(html, &base());
        assert_eq!(page.title, "A Title");
        assert_eq!(page.chunks[0].text, "Line one of the text and line two.");
    }
}
