//! Small helpers shared by the HTML-scraping routines.

use scraper::{ElementRef, Selector};
use url::Url;

use super::RoutineError;

/// Parse a CSS selector.
pub fn selector(css: &str) -> Result<Selector, RoutineError> {
    Selector::parse(css).map_err(|e| RoutineError::Parse(format!("selector {:?}: {}", css, e)))
}

/// Element text with whitespace collapsed.
pub fn text_of(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First match of `sel` under `element`, as collapsed text.
pub fn first_text(element: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    element
        .select(sel)
        .next()
        .map(|e| text_of(&e))
        .filter(|t| !t.is_empty())
}

/// Resolve `href` against `base`. Protocol-relative links become https.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    if href.starts_with("//") {
        return Some(format!("https:{}", href));
    }
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_text_collapses_whitespace() {
        let doc = Html::parse_fragment("<p>  Hello\n   <b>big</b>  world </p>");
        let sel = selector("p").unwrap();
        let p = doc.select(&sel).next().unwrap();
        assert_eq!(text_of(&p), "Hello big world");
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("https://www.mojeek.com/search?q=a", "/search?q=a&s=11").as_deref(),
            Some("https://www.mojeek.com/search?q=a&s=11")
        );
        assert_eq!(
            absolutize("https://x.test/", "//cdn.test/a").as_deref(),
            Some("https://cdn.test/a")
        );
    }

    #[test]
    fn test_bad_selector() {
        assert!(matches!(selector("p[["), Err(RoutineError::Parse(_))));
    }
}
