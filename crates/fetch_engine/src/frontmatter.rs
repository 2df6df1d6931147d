//! YAML front matter carrying page title and description.
//!
//! Only a narrow dialect is written and recognised: a `---` fence, optional
//! `title:` / `description:` single-quoted scalars, a closing fence and one
//! blank line.

use crate::meta::{normalize_meta_value, PageMeta};

const BOM: char = '\u{feff}';

/// True when `md` opens with a `---` fence that is closed on a later line.
pub fn has_leading_front_matter(md: &str) -> bool {
    let Some(rest) = strip_opening_fence(md) else {
        return false;
    };
    rest.split('\n')
        .any(|line| line.trim_end_matches('\r').trim() == "---")
}

/// Prepends a front matter block built from `meta`.
///
/// Empty documents, documents that already carry front matter and empty
/// metadata leave `md` untouched.
pub fn prepend_front_matter(md: &str, meta: &PageMeta) -> String {
    if md.trim().is_empty() || has_leading_front_matter(md) {
        return md.to_string();
    }

    let title = meta.title.as_deref().map(normalize_meta_value).unwrap_or_default();
    let description = meta
        .description
        .as_deref()
        .map(normalize_meta_value)
        .unwrap_or_default();
    if title.is_empty() && description.is_empty() {
        return md.to_string();
    }

    let mut out = String::with_capacity(md.len() + title.len() + description.len() + 40);
    out.push_str("---\n");
    if !title.is_empty() {
        out.push_str("title: ");
        out.push_str(&yaml_quote(&title));
        out.push('\n');
    }
    if !description.is_empty() {
        out.push_str("description: ");
        out.push_str(&yaml_quote(&description));
        out.push('\n');
    }
    out.push_str("---\n\n");
    out.push_str(md);
    out
}

/// Removes a leading block that holds nothing but `title` / `description`
/// keys (plus blank lines and comments), returning the body and the parsed
/// values. Any other key, or a block that never closes, yields `None` and
/// the document must be kept as is.
pub fn strip_injectable_front_matter(md: &str) -> Option<(String, PageMeta)> {
    let mut rest = strip_opening_fence(md)?;

    let mut lines = Vec::new();
    loop {
        if rest.is_empty() {
            return None;
        }
        let (line, tail) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        rest = tail;
        if line.trim_end_matches('\r').trim() == "---" {
            break;
        }
        lines.push(line);
    }

    let meta = parse_injectable_lines(&lines)?;
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);
    Some((body.to_string(), meta))
}

fn strip_opening_fence(md: &str) -> Option<&str> {
    let md = md.strip_prefix(BOM).unwrap_or(md);
    md.strip_prefix("---\n")
        .or_else(|| md.strip_prefix("---\r\n"))
}

fn parse_injectable_lines(lines: &[&str]) -> Option<PageMeta> {
    let mut meta = PageMeta::default();
    let mut known = 0usize;

    for line in lines {
        let item = line.trim_end_matches('\r').trim();
        if item.is_empty() || item.starts_with('#') {
            continue;
        }
        let (key, value) = item.split_once(':')?;
        let value = parse_yaml_scalar(value);
        let value = (!value.is_empty()).then_some(value);
        match key.trim().to_ascii_lowercase().as_str() {
            "title" => meta.title = value,
            "description" => meta.description = value,
            _ => return None,
        }
        known += 1;
    }

    (known > 0).then_some(meta)
}

fn yaml_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn parse_yaml_scalar(raw: &str) -> String {
    let value = raw.trim();
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace("''", "'");
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        if let Ok(unquoted) = serde_json::from_str::<String>(value) {
            return unquoted;
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta(title: Option<&str>, description: Option<&str>) -> PageMeta {
        PageMeta {
            title: title.map(str::to_string),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn detects_closed_fence_only() {
        assert!(has_leading_front_matter("---\ntitle: 'x'\n---\n\nbody"));
        assert!(has_leading_front_matter("\u{feff}---\r\nfoo: bar\r\n---\r\n"));
        assert!(!has_leading_front_matter("---\ntitle: 'x'\nno closing"));
        assert!(!has_leading_front_matter("# Heading\n---\n"));
        assert!(!has_leading_front_matter(""));
    }

    #[test]
    fn prepends_quoted_values() {
        let out = prepend_front_matter(
            "# Body\n",
            &meta(Some("It's  here"), Some("line one\n line two")),
        );
        assert_eq!(
            out,
            "---\ntitle: 'It''s here'\ndescription: 'line one line two'\n---\n\n# Body\n"
        );
    }

    #[test]
    fn prepend_is_idempotent() {
        let once = prepend_front_matter("# Body\n", &meta(Some("T"), None));
        let twice = prepend_front_matter(&once, &meta(Some("Other"), Some("D")));
        assert_eq!(once, twice);
    }

    #[test]
    fn prepend_skips_empty_inputs() {
        assert_eq!(prepend_front_matter("  \n", &meta(Some("T"), None)), "  \n");
        assert_eq!(prepend_front_matter("# Body\n", &meta(Some("  "), None)), "# Body\n");
    }

    #[test]
    fn strip_recovers_what_prepend_wrote() {
        let md = prepend_front_matter("# Body\n", &meta(Some("It's"), Some("Desc")));
        let (body, parsed) = strip_injectable_front_matter(&md).unwrap();
        assert_eq!(body, "# Body\n");
        assert_eq!(parsed, meta(Some("It's"), Some("Desc")));
    }

    #[test]
    fn strip_refuses_unknown_keys() {
        let md = "---\ntitle: 'T'\nauthor: someone\n---\n\nbody\n";
        assert_eq!(strip_injectable_front_matter(md), None);
    }

    #[test]
    fn strip_refuses_unclosed_or_missing_blocks() {
        assert_eq!(strip_injectable_front_matter("---\ntitle: 'T'\n"), None);
        assert_eq!(strip_injectable_front_matter("# no front matter\n"), None);
        assert_eq!(strip_injectable_front_matter("---\n# only a comment\n---\n"), None);
    }

    #[test]
    fn strip_handles_crlf_comments_and_double_quotes() {
        let md = "\u{feff}---\r\n# generated\r\ndescription: \"say \\\"hi\\\"\"\r\n---\r\n\r\nbody";
        let (body, parsed) = strip_injectable_front_matter(md).unwrap();
        assert_eq!(body, "body");
        assert_eq!(parsed, meta(None, Some("say \"hi\"")));
    }
}
