//! Heuristic extraction of component fragments from raw source and markdown text.
//!
//! Nothing in here parses TypeScript properly. Declarations are located with
//! patterns and walked line by line, so odd-but-valid syntax degrades to fewer
//! (or noisier) fragments instead of an error. One failure mode is kept as is:
//! a declaration body ends at its first `}`, and a prop whose type spans several
//! lines has each continuation line read as a separate candidate.
//!
//! Every function here is pure: the same input always yields the same output.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{DesignToken, ExampleSpec, PropSpec};

/// Reserved custom-property prefix recognised by [`extract_design_tokens`].
pub const DESIGN_TOKEN_PREFIX: &str = "--spectrum-";

/// Category returned by [`infer_category`] when no keyword matches.
pub const DEFAULT_CATEGORY: &str = "Components";

static PROPS_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:interface|type)\s+\w*Props\b(?:\s*<(?:[^<>{}]|\{[^{}]*\}|<[^<>]*>)*>)?(?:\s+extends\s+[^{;]*|\s*=\s*)?\s*\{([^}]*)\}",
    )
    .expect("props declaration pattern is valid")
});

static DESTRUCTURED_PARAMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*\{[^}]*\}\s*:\s*\{([^}]*)\}").expect("destructured params pattern is valid")
});

static PROP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:readonly\s+)?['"]?([A-Za-z_$][\w$-]*)['"]?(\?)?\s*:\s*(.+)$"#)
        .expect("prop line pattern is valid")
});

static DOC_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*\*(.*?)\*/").expect("doc block pattern is valid"));

static INLINE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{@link(?:code|plain)?\s+([^}\s|]+)[^}]*\}").expect("link pattern is valid"));

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("tag pattern is valid"));

static DESIGN_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"--spectrum-[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*").expect("design token pattern is valid")
});

/// Fence languages that count as script or markup examples. Empty means untagged.
const EXAMPLE_FENCE_LANGUAGES: &[&str] =
    &["", "tsx", "ts", "jsx", "js", "javascript", "typescript", "html"];

/// Keyword table for component categories. Order matters: the first row with a
/// keyword contained in the lowercased name wins, so `ActionMenu` is an action
/// and `TabList` is navigation.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Actions", &["button", "action", "menu", "toolbar"]),
    (
        "Forms",
        &[
            "text", "input", "field", "form", "checkbox", "radio", "switch", "slider", "picker",
            "combo", "select", "search",
        ],
    ),
    ("Navigation", &["nav", "link", "breadcrumb", "tab", "pagination"]),
    ("Overlays", &["dialog", "modal", "popover", "tooltip", "tray", "overlay"]),
    ("Layout", &["flex", "grid", "layout", "divider", "accordion", "card", "view"]),
    (
        "Feedback",
        &["progress", "meter", "badge", "status", "toast", "alert", "banner", "skeleton"],
    ),
    (
        "Content",
        &["image", "avatar", "icon", "table", "list", "tree", "heading", "illustration"],
    ),
];

const TOKEN_CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("color", &["color", "background", "fill", "stroke", "opacity"]),
    ("spacing", &["spacing", "padding", "margin", "gap"]),
    ("typography", &["font", "line-height", "letter-spacing", "text"]),
    ("border", &["border", "corner-radius", "radius"]),
    ("shadow", &["shadow", "elevation"]),
    ("animation", &["animation", "duration", "easing"]),
    ("size", &["size", "width", "height"]),
];

const DEFAULT_TOKEN_CATEGORY: &str = "general";

/// Raw substrings and the keyboard token each one signals.
const KEYBOARD_SIGNALS: &[(&[&str], &str)] = &[
    (
        &["onKeyDown", "onKeyUp", "onKeyPress", "useKeyboard"],
        "Keyboard event handling",
    ),
    (&["'Tab'", "\"Tab\""], "Tab"),
    (&["'Enter'", "\"Enter\""], "Enter"),
    (&["' '", "'Space'", "\"Space\"", "'Spacebar'"], "Space"),
    (&["'Escape'", "\"Escape\"", "'Esc'"], "Escape"),
    (&["ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight"], "Arrow keys"),
    (&["'Home'", "\"Home\"", "'End'", "\"End\""], "Home/End"),
    (&["PageUp", "PageDown"], "Page Up/Page Down"),
];

const DEFAULT_KEYBOARD_SUPPORT: [&str; 2] = ["Tab", "Enter"];

/// One logical line of a declaration body.
#[derive(Debug, PartialEq)]
enum Line {
    /// Text of a comment line with markers removed; empty for bare markers.
    Comment(String),
    Code(String),
}

/// Extracts props from `*Props` interface/type declarations and from inline
/// destructured parameter types, in the order they appear in `text`.
///
/// Duplicates are returned as found; [`crate::model::ComponentRecord::new`]
/// keeps the first of each name.
pub fn extract_props(text: &str) -> Vec<PropSpec> {
    let bodies = PROPS_DECLARATION
        .captures_iter(text)
        .chain(DESTRUCTURED_PARAMS.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .sorted_by_key(|body| body.start())
        .map(|body| body.as_str())
        .collect::<Vec<_>>();

    bodies.into_iter().flat_map(props_from_body).collect()
}

fn props_from_body(body: &str) -> Vec<PropSpec> {
    let lines = logical_lines(body);
    let mut props = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let Line::Code(code) = line else { continue };
        let Some(caps) = PROP_LINE.captures(code) else { continue };

        let name = caps[1].to_string();
        let optional = caps.get(2).is_some();
        let raw_type = caps[3].trim().trim_end_matches([';', ',']).trim();
        let (prop_type, default_value) = split_default(raw_type);
        if prop_type.is_empty() {
            continue;
        }

        let description =
            preceding_comment(&lines[..index]).unwrap_or_else(|| format!("{} property", name));

        props.push(PropSpec {
            options: union_options(&prop_type),
            name,
            prop_type,
            required: !optional,
            default_value,
            description,
        });
    }

    props
}

/// Splits a body into comment and code lines. Code ends at a newline, or at
/// `;`/`,` outside brackets, generics and quotes. A `//` comment that follows
/// code on the same line is dropped.
fn logical_lines(body: &str) -> Vec<Line> {
    let chars: Vec<char> = body.chars().collect();
    let mut lines = Vec::new();
    let mut code = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut line_has_code = false;
    let mut i = 0;

    fn flush(code: &mut String, lines: &mut Vec<Line>) -> bool {
        let trimmed = code.trim();
        let pushed = !trimmed.is_empty();
        if pushed {
            lines.push(Line::Code(trimmed.to_string()));
        }
        code.clear();
        pushed
    }

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '\n' {
            flush(&mut code, &mut lines);
            depth = 0;
            quote = None;
            line_has_code = false;
            i += 1;
            continue;
        }

        if let Some(q) = quote {
            code.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match (c, next) {
            ('/', Some('*')) => {
                line_has_code |= flush(&mut code, &mut lines);
                let start = i + 2;
                let end = (start..chars.len().saturating_sub(1))
                    .find(|&j| chars[j] == '*' && chars[j + 1] == '/')
                    .unwrap_or(chars.len());
                let inner: String = chars[start.min(end)..end].iter().collect();
                lines.extend(inner.lines().map(|l| Line::Comment(clean_comment_line(l))));
                i = end + 2;
            }
            ('/', Some('/')) => {
                let trailing = flush(&mut code, &mut lines) || line_has_code;
                let end = (i..chars.len()).find(|&j| chars[j] == '\n').unwrap_or(chars.len());
                if !trailing {
                    let text: String = chars[i + 2..end].iter().collect();
                    lines.push(Line::Comment(clean_comment_line(&text)));
                }
                i = end;
            }
            ('\'' | '"' | '`', _) => {
                quote = Some(c);
                code.push(c);
                i += 1;
            }
            ('(' | '[' | '{' | '<', _) => {
                depth += 1;
                code.push(c);
                i += 1;
            }
            ('>', _) if code.ends_with('=') => {
                // arrow, not a closing generic
                code.push(c);
                i += 1;
            }
            (')' | ']' | '}' | '>', _) => {
                depth = depth.saturating_sub(1);
                code.push(c);
                i += 1;
            }
            (';' | ',', _) if depth == 0 => {
                line_has_code |= flush(&mut code, &mut lines);
                i += 1;
            }
            _ => {
                code.push(c);
                i += 1;
            }
        }
    }

    flush(&mut code, &mut lines);
    lines
}

fn clean_comment_line(line: &str) -> String {
    line.trim()
        .trim_start_matches('*')
        .trim_start_matches('/')
        .trim_end_matches("*/")
        .trim()
        .to_string()
}

/// Scans upward for the nearest comment line carrying prose. Bare markers and
/// JSDoc tag lines are skipped; a code line ends the search.
fn preceding_comment(lines: &[Line]) -> Option<String> {
    for line in lines.iter().rev() {
        match line {
            Line::Code(_) => return None,
            Line::Comment(text) if text.is_empty() || text.starts_with('@') => continue,
            Line::Comment(text) => return Some(text.clone()),
        }
    }
    None
}

/// Separates a trailing `= value` from a type token. `=>` and comparison
/// operators are not assignments.
fn split_default(raw: &str) -> (String, Option<String>) {
    let chars: Vec<char> = raw.chars().collect();
    let mut quote: Option<char> = None;
    let mut split_at = None;

    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '=' => {
                let prev = i.checked_sub(1).map(|p| chars[p]);
                let next = chars.get(i + 1).copied();
                let operator = matches!(prev, Some('=' | '!' | '<' | '>'))
                    || matches!(next, Some('>' | '='));
                if !operator {
                    split_at = Some(i);
                }
            }
            _ => {}
        }
    }

    match split_at {
        Some(i) => {
            let prop_type: String = chars[..i].iter().collect();
            let value: String = chars[i + 1..].iter().collect();
            let value = strip_quotes(value.trim());
            (
                prop_type.trim().to_string(),
                (!value.is_empty()).then(|| value.to_string()),
            )
        }
        None => (raw.trim().to_string(), None),
    }
}

fn strip_quotes(value: &str) -> &str {
    for q in ['\'', '"', '`'] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Option list for a union of at least two quoted string literals.
fn union_options(prop_type: &str) -> Option<Vec<String>> {
    let parts: Vec<&str> = prop_type
        .split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.len() < 2 {
        return None;
    }

    parts
        .iter()
        .map(|part| {
            let inner = strip_quotes(part);
            (inner.len() + 2 == part.len()).then(|| inner.to_string())
        })
        .collect()
}

/// Extracts usage examples, falling back to one placeholder example.
///
/// Markdown input yields every fenced script/markup block containing markup;
/// source input yields `@example` doc blocks mentioning the component.
pub fn extract_examples(text: &str, component_name: &str) -> Vec<ExampleSpec> {
    let examples = find_examples(text, component_name);
    if examples.is_empty() {
        vec![default_example(component_name)]
    } else {
        examples
    }
}

/// Example candidates only, without the placeholder fallback.
pub fn find_examples(text: &str, component_name: &str) -> Vec<ExampleSpec> {
    let (snippets, description) = if is_markdown(text) {
        (markdown_snippets(text), "Usage example from documentation")
    } else {
        (
            doc_comment_snippets(text, component_name),
            "Usage example from source documentation",
        )
    };

    snippets
        .into_iter()
        .enumerate()
        .map(|(index, code)| ExampleSpec {
            title: format!("Example {}", index + 1),
            description: description.to_string(),
            code,
            preview: None,
        })
        .collect()
}

pub fn default_example(component_name: &str) -> ExampleSpec {
    ExampleSpec {
        title: format!("Basic {}", component_name),
        description: format!("Basic usage of the {} component", component_name),
        code: format!("<{} />", component_name),
        preview: None,
    }
}

fn is_markdown(text: &str) -> bool {
    text.lines().any(|line| line.trim_start().starts_with("```"))
}

fn has_markup(code: &str) -> bool {
    code.contains('<') && code.contains('>')
}

fn markdown_snippets(text: &str) -> Vec<String> {
    let mut snippets = Vec::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match open.take() {
            None => {
                if let Some(lang) = trimmed.strip_prefix("```") {
                    open = Some((lang.trim().to_lowercase(), Vec::new()));
                }
            }
            Some((lang, body)) if trimmed.starts_with("```") => {
                let code = body.join("\n").trim().to_string();
                if EXAMPLE_FENCE_LANGUAGES.contains(&lang.as_str()) && has_markup(&code) {
                    snippets.push(code);
                }
            }
            Some((lang, mut body)) => {
                body.push(line);
                open = Some((lang, body));
            }
        }
    }

    snippets
}

fn doc_comment_snippets(text: &str, component_name: &str) -> Vec<String> {
    DOC_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str();
            if !block.contains("@example") || !has_markup(block) || !block.contains(component_name) {
                return None;
            }
            let code = example_body(block);
            (!code.is_empty()).then_some(code)
        })
        .collect()
}

/// Lines after the `@example` marker up to the next tag, fences removed.
fn example_body(block: &str) -> String {
    let mut collected = Vec::new();
    let mut inside = false;

    for raw in block.lines() {
        let line = raw.trim_start().trim_start_matches('*');
        let line = line.strip_prefix(' ').unwrap_or(line);
        let tagless = line.trim_start();

        if !inside {
            if let Some(rest) = tagless.strip_prefix("@example") {
                inside = true;
                if !rest.trim().is_empty() {
                    collected.push(rest.trim());
                }
            }
            continue;
        }
        if tagless.starts_with('@') {
            break;
        }
        if tagless.starts_with("```") {
            continue;
        }
        collected.push(line.trim_end());
    }

    collected.join("\n").trim().to_string()
}

/// Picks a description from documentation comments.
///
/// A doc block at the very top of the file wins; otherwise the first doc block
/// mentioning the component. The chosen text is rejected in favor of
/// `"<name> component from <library>"` when shorter than ten characters.
pub fn extract_description(text: &str, component_name: &str, library: &str) -> String {
    let fallback = || format!("{} component from {}", component_name, library);

    let blocks: Vec<&str> = DOC_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    let candidate = if text.trim_start().starts_with("/**") {
        blocks.first().copied()
    } else {
        blocks.iter().copied().find(|block| block.contains(component_name))
    };

    match candidate.map(strip_doc_markup) {
        Some(description) if description.chars().count() >= 10 => description,
        _ => fallback(),
    }
}

fn strip_doc_markup(block: &str) -> String {
    let prose = block
        .lines()
        .map(clean_comment_line)
        .take_while(|line| !line.starts_with('@'))
        .filter(|line| !line.is_empty())
        .join(" ");

    let prose = INLINE_LINK.replace_all(&prose, "$1");
    let prose = HTML_TAG.replace_all(&prose, "");
    prose.replace('`', "").split_whitespace().join(" ")
}

/// Collects every distinct `--spectrum-*` custom property in first-seen order.
pub fn extract_design_tokens(text: &str) -> Vec<DesignToken> {
    DESIGN_TOKEN
        .find_iter(text)
        .map(|m| m.as_str())
        .unique()
        .map(|name| DesignToken {
            name: name.to_string(),
            value: format!("var({})", name),
            category: token_category(name).to_string(),
            description: format!("Design token {}", name),
        })
        .collect()
}

fn token_category(name: &str) -> &'static str {
    let key = name.trim_start_matches(DESIGN_TOKEN_PREFIX).to_lowercase();
    TOKEN_CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| key.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_TOKEN_CATEGORY)
}

/// Keyboard interactions signalled by handler names and named keys in `text`.
pub fn extract_keyboard_support(text: &str) -> Vec<String> {
    let found: Vec<String> = KEYBOARD_SIGNALS
        .iter()
        .filter(|(needles, _)| needles.iter().any(|needle| text.contains(needle)))
        .map(|(_, token)| token.to_string())
        .collect();

    if found.is_empty() {
        DEFAULT_KEYBOARD_SUPPORT.iter().map(|t| t.to_string()).collect()
    } else {
        found
    }
}

pub fn extract_aria_labels(props: &[PropSpec]) -> Vec<String> {
    props
        .iter()
        .filter(|prop| prop.name.to_lowercase().contains("aria"))
        .map(|prop| prop.name.clone())
        .collect()
}

/// Category for a component name; never empty.
pub fn infer_category(component_name: &str) -> &'static str {
    let name = component_name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| name.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}
