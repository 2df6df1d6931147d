use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

static HEAD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("head").expect("valid head selector"));
static TITLE_META_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title, meta").expect("valid title/meta selector"));

/// Page title and description used for front matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PageMeta {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// Reads `<title>` / `<meta name="description">` from the document head,
/// falling back to `og:title` / `og:description`.
pub fn extract_meta_from_html(html: &str) -> PageMeta {
    if html.trim().is_empty() {
        return PageMeta::default();
    }

    let doc = Html::parse_document(html);
    let scope = doc
        .select(&HEAD_SEL)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut found = MetaCandidates::default();
    for element in scope.select(&TITLE_META_SEL) {
        found.observe(element);
    }
    found.resolve()
}

#[derive(Default)]
struct MetaCandidates {
    title: Option<String>,
    og_title: Option<String>,
    description: Option<String>,
    og_description: Option<String>,
}

impl MetaCandidates {
    fn observe(&mut self, element: ElementRef<'_>) {
        let el = element.value();
        if el.name().eq_ignore_ascii_case("title") {
            if self.title.is_none() {
                self.title = non_empty(normalize_meta_value(&element.text().collect::<String>()));
            }
            return;
        }

        let Some(content) = el.attr("content").map(normalize_meta_value).and_then(non_empty)
        else {
            return;
        };
        let name = el.attr("name").unwrap_or_default().trim().to_ascii_lowercase();
        let property = el
            .attr("property")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let slot = if name == "description" {
            &mut self.description
        } else if property == "og:description" {
            &mut self.og_description
        } else if property == "og:title" {
            &mut self.og_title
        } else {
            return;
        };
        if slot.is_none() {
            *slot = Some(content);
        }
    }

    fn resolve(self) -> PageMeta {
        PageMeta {
            title: self.title.or(self.og_title),
            description: self.description.or(self.og_description),
        }
    }
}

/// Collapses runs of whitespace into single spaces.
pub fn normalize_meta_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
