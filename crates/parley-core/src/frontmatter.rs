//! Frontmatter splitting and YAML-subset mapping parsing.
//!
//! Content files use the `---\n<frontmatter>\n---\n<body>` convention. The
//! frontmatter is a YAML mapping parsed by a hand-written subset parser (no
//! external YAML dependency) supporting scalars, quoted strings, inline and
//! multi-line arrays, nested mappings by indentation, and `|`/`>` block
//! scalars — everything the `.prompty` format actually uses.

use serde_json::{Map, Value};

/// Split a file into frontmatter and body on the first two `---` delimiters.
///
/// If fewer than three segments exist, the entire content is the body and
/// there is no frontmatter.
pub fn split(content: &str) -> (Option<String>, String) {
    let mut parts = content.splitn(3, "---");
    let _before = parts.next();
    match (parts.next(), parts.next()) {
        (Some(frontmatter), Some(body)) => {
            (Some(frontmatter.trim().to_string()), body.trim().to_string())
        }
        _ => (None, content.trim().to_string()),
    }
}

/// Parse a YAML-subset string into a JSON mapping.
///
/// Unparseable lines are skipped rather than failing the whole mapping.
pub fn parse_mapping(yaml: &str) -> Map<String, Value> {
    let lines: Vec<&str> = yaml.lines().collect();
    let mut i = 0;
    parse_block(&lines, &mut i, 0)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Parse a mapping block whose lines are indented at least `min_indent`.
///
/// The block's actual indent is taken from its first content line; deeper
/// lines belong to nested values, shallower lines end the block.
fn parse_block(lines: &[&str], i: &mut usize, min_indent: usize) -> Map<String, Value> {
    let mut map = Map::new();
    let mut block_indent: Option<usize> = None;

    while *i < lines.len() {
        let raw = lines[*i];
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            *i += 1;
            continue;
        }

        let indent = indent_of(raw);
        if indent < min_indent {
            break;
        }
        let block = *block_indent.get_or_insert(indent);
        if indent < block {
            break;
        }
        if indent > block {
            // Stray over-indented line without a parent key.
            *i += 1;
            continue;
        }

        let Some((key, rest)) = trimmed.split_once(':') else {
            *i += 1;
            continue;
        };
        let key = key.trim().to_string();
        let rest = rest.trim();
        *i += 1;

        let value = if rest.is_empty() {
            parse_nested(lines, i, block)
        } else if rest == "|" || rest == ">" {
            Value::String(parse_block_scalar(lines, i, block))
        } else {
            parse_scalar(rest)
        };
        let _ = map.insert(key, value);
    }

    map
}

/// Parse the value following a bare `key:` line — either a nested mapping,
/// a `- item` list, or an empty scalar.
fn parse_nested(lines: &[&str], i: &mut usize, parent_indent: usize) -> Value {
    let mut j = *i;
    while j < lines.len() && lines[j].trim().is_empty() {
        j += 1;
    }
    if j >= lines.len() || indent_of(lines[j]) <= parent_indent {
        return Value::String(String::new());
    }

    if lines[j].trim().starts_with('-') {
        *i = j;
        let item_indent = indent_of(lines[j]);
        Value::Array(parse_dash_list(lines, i, item_indent))
    } else {
        Value::Object(parse_block(lines, i, parent_indent + 1))
    }
}

/// Parse consecutive `- item` lines at a fixed indent.
fn parse_dash_list(lines: &[&str], i: &mut usize, item_indent: usize) -> Vec<Value> {
    let mut items = Vec::new();
    while *i < lines.len() {
        let raw = lines[*i];
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            *i += 1;
            continue;
        }
        if indent_of(raw) != item_indent || !trimmed.starts_with('-') {
            break;
        }
        items.push(parse_scalar(trimmed[1..].trim()));
        *i += 1;
    }
    items
}

/// Collect the indented lines of a `|`/`>` block scalar into one string.
fn parse_block_scalar(lines: &[&str], i: &mut usize, parent_indent: usize) -> String {
    let mut content_indent: Option<usize> = None;
    let mut out: Vec<String> = Vec::new();

    while *i < lines.len() {
        let raw = lines[*i];
        if raw.trim().is_empty() {
            out.push(String::new());
            *i += 1;
            continue;
        }
        let indent = indent_of(raw);
        if indent <= parent_indent {
            break;
        }
        let content = *content_indent.get_or_insert(indent);
        out.push(
            raw.get(content..)
                .unwrap_or_else(|| raw.trim_start())
                .to_string(),
        );
        *i += 1;
    }

    while out.last().is_some_and(String::is_empty) {
        let _ = out.pop();
    }
    out.join("\n")
}

/// Parse a scalar value: quoted string, bool, null, number, inline array,
/// or plain string.
fn parse_scalar(value: &str) -> Value {
    let unquoted = unquote(value);

    if value.starts_with('[') && value.ends_with(']') {
        return Value::Array(parse_inline_array(value));
    }
    // Quoted values are always strings.
    if unquoted != value {
        return Value::String(unquoted);
    }
    match value {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "null" | "~" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = value.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = value.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(unquoted)
}

/// Parse an inline array like `[a, b, c]`.
fn parse_inline_array(value: &str) -> Vec<Value> {
    let inner = value.trim_start_matches('[').trim_end_matches(']').trim();
    if inner.is_empty() {
        return Vec::new();
    }
    inner.split(',').map(|s| parse_scalar(s.trim())).collect()
}

/// Remove surrounding quotes from a string value.
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_with_frontmatter() {
        let content = "---\nname: Test\n---\nBody text";
        let (fm, body) = split(content);
        assert_eq!(fm.as_deref(), Some("name: Test"));
        assert_eq!(body, "Body text");
    }

    #[test]
    fn split_without_frontmatter() {
        let content = "Just a body";
        let (fm, body) = split(content);
        assert!(fm.is_none());
        assert_eq!(body, "Just a body");
    }

    #[test]
    fn split_with_extra_delimiters_keeps_them_in_body() {
        let content = "---\nname: X\n---\nfirst\n---\nsecond";
        let (fm, body) = split(content);
        assert_eq!(fm.as_deref(), Some("name: X"));
        assert_eq!(body, "first\n---\nsecond");
    }

    #[test]
    fn split_two_segments_is_all_body() {
        // Only one delimiter: fewer than three segments.
        let content = "before---after";
        let (fm, body) = split(content);
        assert!(fm.is_none());
        assert_eq!(body, "before---after");
    }

    #[test]
    fn parse_flat_mapping() {
        let map = parse_mapping("name: Training Agent\ndescription: A coach");
        assert_eq!(map["name"], "Training Agent");
        assert_eq!(map["description"], "A coach");
    }

    #[test]
    fn parse_quoted_strings() {
        let map = parse_mapping("a: \"double\"\nb: 'single'\nc: \"42\"");
        assert_eq!(map["a"], "double");
        assert_eq!(map["b"], "single");
        // Quoted numbers stay strings.
        assert_eq!(map["c"], "42");
    }

    #[test]
    fn parse_scalar_types() {
        let map = parse_mapping("t: true\nf: false\nn: null\ni: 800\nfl: 0.7");
        assert_eq!(map["t"], true);
        assert_eq!(map["f"], false);
        assert_eq!(map["n"], Value::Null);
        assert_eq!(map["i"], 800);
        assert_eq!(map["fl"], 0.7);
    }

    #[test]
    fn parse_inline_arrays() {
        let map = parse_mapping("authors: [alice, bob]");
        assert_eq!(map["authors"], serde_json::json!(["alice", "bob"]));
    }

    #[test]
    fn parse_dash_arrays() {
        let map = parse_mapping("authors:\n  - alice\n  - bob");
        assert_eq!(map["authors"], serde_json::json!(["alice", "bob"]));
    }

    #[test]
    fn parse_nested_mapping() {
        let yaml = "model:\n  api: chat\n  configuration:\n    type: azure_openai\n    max_tokens: 800\n    temperature: 0.7";
        let map = parse_mapping(yaml);
        assert_eq!(map["model"]["api"], "chat");
        assert_eq!(map["model"]["configuration"]["type"], "azure_openai");
        assert_eq!(map["model"]["configuration"]["max_tokens"], 800);
        assert_eq!(map["model"]["configuration"]["temperature"], 0.7);
    }

    #[test]
    fn parse_env_reference_stays_literal() {
        let map = parse_mapping("azure_endpoint: ${env:AZURE_OPENAI_ENDPOINT}");
        assert_eq!(map["azure_endpoint"], "${env:AZURE_OPENAI_ENDPOINT}");
    }

    #[test]
    fn parse_block_scalar_pipe() {
        let yaml = "description: |\n  line one\n  line two\nname: X";
        let map = parse_mapping(yaml);
        assert_eq!(map["description"], "line one\nline two");
        assert_eq!(map["name"], "X");
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let map = parse_mapping("# comment\n\nname: X\n# trailing");
        assert_eq!(map.len(), 1);
        assert_eq!(map["name"], "X");
    }

    #[test]
    fn parse_empty_value_is_empty_string() {
        let map = parse_mapping("name:\nother: y");
        assert_eq!(map["name"], "");
        assert_eq!(map["other"], "y");
    }

    #[test]
    fn parse_empty_input() {
        assert!(parse_mapping("").is_empty());
    }
}
