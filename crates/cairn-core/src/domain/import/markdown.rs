//! Vault markdown helpers: frontmatter, wikilinks, tags and callouts

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::types::RawLink;

static WIKILINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[\[([^\]]+)\]\]").expect("wikilink regex"));

static CODE_BLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^```[\s\S]*?^```|^    .*$|`[^`]+`").expect("code block regex"));

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)#([a-zA-Z_][a-zA-Z0-9_/-]*)").expect("tag regex")
});

static CALLOUT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)>\s*\[!([a-zA-Z][a-zA-Z0-9-]*)\][+-]?(?:\s+(.*))?$").expect("callout regex")
});

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp"];

// ========== Frontmatter ==========

/// Split a leading `---` block from the body
///
/// Returns `(None, text)` when there is no well-formed frontmatter block.
pub(crate) fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text.strip_prefix("---") else {
        return (None, text);
    };
    let Some(rest) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) else {
        return (None, text);
    };

    // Empty block: the closing delimiter follows immediately
    if let Some(body) = rest.strip_prefix("---") {
        return (Some(""), body.trim_start_matches(['\r', '\n']));
    }

    match rest.find("\n---") {
        Some(end) => {
            let yaml = &rest[..end];
            let after = &rest[end + 4..];
            let body = after.split_once('\n').map(|(_, body)| body).unwrap_or("");
            (Some(yaml), body)
        }
        None => (None, text),
    }
}

/// Parse a frontmatter block into a JSON map
pub(crate) fn parse_frontmatter(yaml: &str) -> Result<Map<String, Value>, serde_yaml::Error> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    let parsed: Option<Map<String, Value>> = serde_yaml::from_str(yaml)?;
    Ok(parsed.unwrap_or_default())
}

/// Tags declared in frontmatter, as a list or a comma/space separated string
pub(crate) fn frontmatter_tags(frontmatter: &Map<String, Value>) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for key in ["tags", "tag"] {
        match frontmatter.get(key) {
            Some(Value::String(s)) => {
                tags.extend(s.split([',', ' ']).filter_map(normalize_tag));
            }
            Some(Value::Array(items)) => {
                tags.extend(items.iter().filter_map(|v| v.as_str()).filter_map(normalize_tag));
            }
            _ => {}
        }
    }
    tags
}

fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#');
    (!tag.is_empty()).then(|| tag.to_string())
}

// ========== Extraction ==========

/// Byte ranges of fenced blocks, indented blocks and inline code
fn code_spans(content: &str) -> Vec<Range<usize>> {
    CODE_BLOCK_REGEX.find_iter(content).map(|m| m.range()).collect()
}

fn in_code(spans: &[Range<usize>], offset: usize) -> bool {
    spans.iter().any(|span| span.contains(&offset))
}

/// Wikilinks and embeds outside code, in document order
pub(crate) fn extract_links(content: &str) -> Vec<RawLink> {
    let spans = code_spans(content);
    WIKILINK_REGEX
        .captures_iter(content)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            if in_code(&spans, whole.start()) {
                return None;
            }
            let embed = cap.get(1).is_some_and(|m| !m.as_str().is_empty());
            Some(RawLink::parse(cap.get(2)?.as_str(), embed))
        })
        .filter(|link| !link.target.is_empty() || link.heading.is_some())
        .collect()
}

/// Inline `#tags` outside code and links
pub(crate) fn extract_inline_tags(content: &str) -> BTreeSet<String> {
    let spans = code_spans(content);
    let links: Vec<Range<usize>> = WIKILINK_REGEX.find_iter(content).map(|m| m.range()).collect();

    TAG_REGEX
        .captures_iter(content)
        .filter_map(|cap| {
            let tag = cap.get(1)?;
            let hash = tag.start().saturating_sub(1);
            if in_code(&spans, hash) || in_code(&links, hash) {
                return None;
            }
            Some(tag.as_str().trim_end_matches('/').to_string())
        })
        .collect()
}

/// Whether `[[...]]` markup remains outside code
pub(crate) fn has_wikilink_markup(content: &str) -> bool {
    let spans = code_spans(content);
    WIKILINK_REGEX
        .find_iter(content)
        .any(|m| !in_code(&spans, m.start()))
}

// ========== Conversion ==========

/// Rewrite wikilinks and embeds as Markdown links and images
pub(crate) fn convert_wikilinks(content: &str) -> String {
    if !content.contains("[[") {
        return content.to_string();
    }
    let spans = code_spans(content);

    WIKILINK_REGEX
        .replace_all(content, |cap: &Captures<'_>| {
            let whole = &cap[0];
            let start = cap.get(0).map(|m| m.start()).unwrap_or(0);
            if in_code(&spans, start) {
                return whole.to_string();
            }
            let link = RawLink::parse(&cap[2], !cap[1].is_empty());
            markdown_link(&link)
        })
        .into_owned()
}

fn markdown_link(link: &RawLink) -> String {
    let mut href = if link.is_local() {
        String::new()
    } else if link.extension().is_some() {
        encode_path(&link.target)
    } else {
        format!("{}.md", encode_path(&link.target))
    };
    if let Some(heading) = &link.heading {
        href.push('#');
        href.push_str(&heading_anchor(heading));
    }

    let file_name = link.target.rsplit('/').next().unwrap_or(&link.target);
    let label = match (&link.alias, &link.heading) {
        (Some(alias), _) => alias.clone(),
        (None, Some(heading)) if link.is_local() => heading.clone(),
        (None, Some(heading)) => format!("{} > {}", file_name, heading),
        (None, None) => file_name.to_string(),
    };

    let is_image = link
        .extension()
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
    if link.embed && is_image {
        format!("![{}]({})", label, href)
    } else {
        format!("[{}]({})", label, href)
    }
}

fn encode_path(path: &str) -> String {
    path.replace(' ', "%20")
}

fn heading_anchor(heading: &str) -> String {
    if heading.starts_with('^') {
        return heading.to_string();
    }
    heading
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// Rewrite `> [!type] title` callout headers as `> **Type:** title`
pub(crate) fn convert_callouts(content: &str) -> String {
    if !content.contains("[!") {
        return content.to_string();
    }

    let mut in_fence = false;
    let mut out: Vec<String> = Vec::new();
    for line in content.split('\n') {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        let converted = if in_fence {
            None
        } else {
            CALLOUT_REGEX.captures(line.trim_end_matches('\r')).map(|cap| {
                let indent = cap.get(1).map(|m| m.as_str()).unwrap_or("");
                let label = callout_label(&cap[2]);
                match cap.get(3).map(|m| m.as_str().trim()).filter(|t| !t.is_empty()) {
                    Some(title) => format!("{}> **{}:** {}", indent, label, title),
                    None => format!("{}> **{}**", indent, label),
                }
            })
        };
        out.push(converted.unwrap_or_else(|| line.to_string()));
    }
    out.join("\n")
}

fn callout_label(kind: &str) -> String {
    let words = kind.replace('-', " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
