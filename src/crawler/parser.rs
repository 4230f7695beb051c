//! HTML content extraction and markdown conversion
//!
//! This module turns a rendered wiki page into the text that gets indexed:
//! - Strips non-content elements (scripts, styles, inline SVG, noscript)
//! - Picks the content region from a prioritized selector list, falling back to `<body>`
//! - Appends the comments region when one exists
//! - Converts the result to markdown, keeping link targets

use crate::crawler::FetchError;
use scraper::{ElementRef, Html, Selector};

/// Elements that never carry page content
const STRIPPED_ELEMENTS: &str = "script, style, svg, noscript";

/// Separator placed between page content and its comments
const COMMENTS_DIVIDER: &str = "\n<hr><h2>Comments</h2>\n";

/// Extracts the page title from an HTML document
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Returns true if a page title marks a missing page
pub fn is_not_found(title: &str) -> bool {
    title.contains("Page Not Found") || title.contains("404")
}

/// Pre-compiled selectors for pulling content out of wiki pages
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    content: Vec<Selector>,
    comments: Vec<Selector>,
    stripped: Selector,
    body: Selector,
}

impl ContentExtractor {
    /// Compiles the selector lists
    ///
    /// # Arguments
    ///
    /// * `content_selectors` - Content region selectors, highest priority first
    /// * `comment_selectors` - Comment region selectors, highest priority first
    ///
    /// # Returns
    ///
    /// * `Ok(ContentExtractor)` - All selectors compiled
    /// * `Err(FetchError::Conversion)` - A selector is not valid CSS
    pub fn new(
        content_selectors: &[String],
        comment_selectors: &[String],
    ) -> Result<Self, FetchError> {
        Ok(Self {
            content: compile_all(content_selectors)?,
            comments: compile_all(comment_selectors)?,
            stripped: compile(STRIPPED_ELEMENTS)?,
            body: compile("body")?,
        })
    }

    /// Produces the cleaned HTML fragment for a page
    ///
    /// Returns an empty string only when the document has no body at all.
    pub fn clean_html(&self, html: &str) -> String {
        let mut document = Html::parse_document(html);

        let stripped: Vec<_> = document.select(&self.stripped).map(|el| el.id()).collect();
        for id in stripped {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }

        let content = first_match(&document, &self.content)
            .or_else(|| document.select(&self.body).next());

        let mut out = content.map(|el| el.html()).unwrap_or_default();

        if let Some(comments) = first_match(&document, &self.comments) {
            // Comments nested inside the content region are already included
            let nested = content
                .map(|c| comments.ancestors().any(|a| a.id() == c.id()))
                .unwrap_or(false);
            if !nested {
                out.push_str(COMMENTS_DIVIDER);
                out.push_str(&comments.html());
            }
        }

        out
    }

    /// Converts a rendered page to markdown
    pub fn to_markdown(&self, html: &str) -> Result<String, FetchError> {
        let cleaned = self.clean_html(html);
        html_to_markdown(&cleaned)
    }
}

/// Converts an HTML fragment to markdown without hard line wrapping
pub fn html_to_markdown(html: &str) -> Result<String, FetchError> {
    htmd::convert(html).map_err(|e| FetchError::Conversion(e.to_string()))
}

fn first_match<'a>(document: &'a Html, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|selector| document.select(selector).next())
}

fn compile(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector)
        .map_err(|e| FetchError::Conversion(format!("invalid selector '{}': {}", selector, e)))
}

fn compile_all(selectors: &[String]) -> Result<Vec<Selector>, FetchError> {
    selectors.iter().map(|s| compile(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;

    fn extractor() -> ContentExtractor {
        let config = CrawlerConfig::default();
        ContentExtractor::new(&config.content_selectors, &config.comment_selectors).unwrap()
    }

    #[test]
    fn test_extract_title() {
        let html = r#"<html><head><title>  Test Page  </title></head><body></body></html>"#;
        assert_eq!(extract_title(html), Some("Test Page".to_string()));
    }

    #[test]
    fn test_no_title() {
        let html = r#"<html><head></head><body></body></html>"#;
        assert_eq!(extract_title(html), None);
    }

    #[test]
    fn test_is_not_found() {
        assert!(is_not_found("404 | Wiki"));
        assert!(is_not_found("Page Not Found - Hyperloop"));
        assert!(!is_not_found("Battery Management System"));
    }

    #[test]
    fn test_prefers_first_content_selector() {
        let html = r#"<html><body>
            <nav>Menu</nav>
            <div class="v-main__wrap"><div class="contents"><p>Real content</p></div></div>
        </body></html>"#;
        let cleaned = extractor().clean_html(html);
        assert!(cleaned.starts_with(r#"<div class="contents">"#));
        assert!(cleaned.contains("Real content"));
        assert!(!cleaned.contains("Menu"));
    }

    #[test]
    fn test_falls_back_to_body() {
        let html = r#"<html><body><p>Loose text</p></body></html>"#;
        let cleaned = extractor().clean_html(html);
        assert!(cleaned.starts_with("<body>"));
        assert!(cleaned.contains("Loose text"));
    }

    #[test]
    fn test_strips_non_content_elements() {
        let html = r#"<html><body><div class="contents">
            <script>alert('x')</script>
            <style>.a { color: red }</style>
            <svg><circle r="4"/></svg>
            <noscript>Enable JS</noscript>
            <p>Kept</p>
        </div></body></html>"#;
        let cleaned = extractor().clean_html(html);
        assert!(cleaned.contains("Kept"));
        assert!(!cleaned.contains("alert"));
        assert!(!cleaned.contains("color: red"));
        assert!(!cleaned.contains("circle"));
        assert!(!cleaned.contains("Enable JS"));
    }

    #[test]
    fn test_appends_comments() {
        let html = r#"<html><body>
            <div class="contents"><p>Body</p></div>
            <div class="comments-main"><p>Nice page</p></div>
        </body></html>"#;
        let cleaned = extractor().clean_html(html);
        let divider = cleaned.find("<h2>Comments</h2>").unwrap();
        assert!(cleaned.find("Body").unwrap() < divider);
        assert!(cleaned.find("Nice page").unwrap() > divider);
    }

    #[test]
    fn test_nested_comments_not_duplicated() {
        let html = r#"<html><body>
            <div id="app"><p>Body</p><div class="comments"><p>Once</p></div></div>
        </body></html>"#;
        let cleaned = extractor().clean_html(html);
        assert_eq!(cleaned.matches("Once").count(), 1);
        assert!(!cleaned.contains("<h2>Comments</h2>"));
    }

    #[test]
    fn test_markdown_keeps_links() {
        let html = r#"<html><body><div class="contents">
            <h1>Power unit</h1>
            <p>See the <a href="https://wiki.example.com/docs/pcu">PCU page</a>.</p>
        </div></body></html>"#;
        let markdown = extractor().to_markdown(html).unwrap();
        assert!(markdown.contains("Power unit"));
        assert!(markdown.contains("PCU page"));
        assert!(markdown.contains("(https://wiki.example.com/docs/pcu)"));
        assert!(!markdown.contains("<p>"));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let result = ContentExtractor::new(&["[[".to_string()], &[]);
        assert!(matches!(result, Err(FetchError::Conversion(_))));
    }
}
