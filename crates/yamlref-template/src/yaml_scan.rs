//! Line-oriented YAML scanning.
//!
//! Indices and detectors need exact text ranges, and they must keep working
//! on files a structural parser would reject outright. This scanner reads
//! one `key: value` line at a time and leaves everything it does not
//! understand alone.

use yamlref_core::{utf16_col, Document, Position, Range};

/// One parsed `key[: value]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub line: u32,
    /// Column (bytes) of the key, past any `- ` list markers.
    pub indent: usize,
    /// Whether the line starts a sequence item (`- key: ...`).
    pub list_item: bool,
    pub key: String,
    pub value: Option<ScalarValue>,
    /// UTF-16 range of the key text.
    pub key_range: Range,
}

/// A scalar value with its exact UTF-16 range (quotes excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarValue {
    pub text: String,
    pub range: Range,
}

impl LineEntry {
    /// Whether the entry opens a nested block (`key:` with no value).
    #[must_use]
    pub fn is_block(&self) -> bool {
        self.value.is_none()
    }
}

/// Parse a single line. Returns `None` for blank lines, comments, document
/// separators, and anything that is not a mapping entry.
#[must_use]
pub fn parse_entry(line_no: u32, raw: &str) -> Option<LineEntry> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("---") {
        return None;
    }

    let mut offset = raw.len() - trimmed.len();
    let mut rest = trimmed;
    let mut list_item = false;
    while let Some(stripped) = rest.strip_prefix("- ") {
        list_item = true;
        offset += 2;
        rest = stripped;
    }
    if rest == "-" || rest.starts_with("- ") {
        return None;
    }

    // Key runs up to the first `:` that is followed by space or end of line.
    let colon = find_key_colon(rest)?;
    let key = rest[..colon].trim_end();
    if key.is_empty() || key.contains('{') {
        return None;
    }
    let key_start = offset;
    let key_range = Range::on_line(
        line_no,
        utf16_col(raw, key_start),
        utf16_col(raw, key_start + key.len()),
    );

    let after = &rest[colon + 1..];
    let value = parse_scalar(line_no, raw, offset + colon + 1, after);

    Some(LineEntry {
        line: line_no,
        indent: offset,
        list_item,
        key: key.to_string(),
        value,
        key_range,
    })
}

fn find_key_colon(s: &str) -> Option<usize> {
    let b = s.as_bytes();
    for (i, &c) in b.iter().enumerate() {
        if c == b':' {
            if i + 1 == b.len() || b[i + 1] == b' ' || b[i + 1] == b'\t' {
                return Some(i);
            }
        }
        if c == b'#' {
            return None;
        }
    }
    None
}

fn parse_scalar(line_no: u32, raw: &str, value_offset: usize, after: &str) -> Option<ScalarValue> {
    let mut text = after;
    let mut start = value_offset;

    // leading whitespace
    let ws = text.len() - text.trim_start().len();
    start += ws;
    text = text.trim_start();

    // strip a trailing comment outside quotes
    if !text.starts_with('"') && !text.starts_with('\'') {
        if let Some(hash) = text.find(" #") {
            text = &text[..hash];
        }
    }
    text = text.trim_end();
    if text.is_empty() || text == "|" || text == ">" || text.starts_with('&') {
        return None;
    }

    // strip matching quotes, keeping the range on the content
    if text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
    {
        start += 1;
        text = &text[1..text.len() - 1];
    }

    Some(ScalarValue {
        text: text.to_string(),
        range: Range::on_line(
            line_no,
            utf16_col(raw, start),
            utf16_col(raw, start + text.len()),
        ),
    })
}

/// The entry at `pos`'s line, if the cursor is anywhere on a mapping entry.
#[must_use]
pub fn entry_at(doc: &Document, pos: Position) -> Option<LineEntry> {
    parse_entry(pos.line, doc.line(pos.line)?)
}

/// Nearest entry above `line` with strictly smaller indent: the enclosing
/// block key. Stops at document separators.
#[must_use]
pub fn parent_block(doc: &Document, line: u32, indent: usize) -> Option<LineEntry> {
    for n in (0..line).rev() {
        let raw = doc.line(n)?;
        if raw.trim_start().starts_with("---") {
            return None;
        }
        if let Some(entry) = parse_entry(n, raw) {
            if entry.indent < indent {
                return Some(entry);
            }
        }
    }
    None
}

/// Scalar entries inside the block opened at `block_line` with the given
/// indent. Collection stops at the first entry at or below the block's
/// indent, or at a document separator; blank and comment lines are skipped,
/// so a flag separated from its siblings by unrelated lines is still
/// associated with the block it is indented under.
#[must_use]
pub fn block_scalars(doc: &Document, block_line: u32, block_indent: usize) -> Vec<LineEntry> {
    let mut out = Vec::new();
    for n in block_line + 1..doc.line_count() {
        let Some(raw) = doc.line(n) else { break };
        if raw.trim_start().starts_with("---") {
            break;
        }
        let Some(entry) = parse_entry(n, raw) else {
            continue;
        };
        if entry.indent <= block_indent {
            break;
        }
        out.push(entry);
    }
    out
}

/// Entries of a single-line flow mapping (`key: { name: x, key: y }`),
/// with ranges computed against the raw line. Nested flow collections are
/// not descended into; fields holding them are skipped.
#[must_use]
pub fn flow_map_entries(line_no: u32, raw: &str) -> Vec<LineEntry> {
    let Some(open) = raw.find('{') else {
        return Vec::new();
    };
    let Some(close) = raw.rfind('}') else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cursor = open + 1;
    for part in raw[open + 1..close].split(',') {
        let part_start = cursor;
        cursor += part.len() + 1;
        let Some((k, v)) = part.split_once(':') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() || key.contains('{') {
            continue;
        }
        let key_off = part_start + (k.len() - k.trim_start().len());
        let mut val = v.trim();
        let mut val_off = part_start + k.len() + 1 + (v.len() - v.trim_start().len());
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val_off += 1;
            val = &val[1..val.len() - 1];
        }
        if val.is_empty() || val.contains('{') {
            continue;
        }
        out.push(LineEntry {
            line: line_no,
            indent: key_off,
            list_item: false,
            key: key.to_string(),
            value: Some(ScalarValue {
                text: val.to_string(),
                range: Range::on_line(
                    line_no,
                    utf16_col(raw, val_off),
                    utf16_col(raw, val_off + val.len()),
                ),
            }),
            key_range: Range::on_line(
                line_no,
                utf16_col(raw, key_off),
                utf16_col(raw, key_off + key.len()),
            ),
        });
    }
    out
}

/// Walk ancestors of an entry (nearest first), calling `f` on each block
/// key until it returns `true` or the document (or `---`) boundary is hit.
#[must_use]
pub fn any_ancestor(doc: &Document, mut line: u32, mut indent: usize, key: &str) -> bool {
    while let Some(parent) = parent_block(doc, line, indent) {
        if parent.key == key {
            return true;
        }
        line = parent.line;
        indent = parent.indent;
    }
    false
}

/// Split a document into its `---`-separated YAML documents, returning
/// `(first_line, last_line)` pairs (inclusive).
#[must_use]
pub fn document_spans(doc: &Document) -> Vec<(u32, u32)> {
    let mut spans = Vec::new();
    let mut start = 0u32;
    let mut last_content = 0u32;
    let mut saw_content = false;
    for (n, raw) in doc.lines() {
        if raw.trim_start().starts_with("---") {
            if saw_content {
                spans.push((start, last_content));
            }
            start = n + 1;
            saw_content = false;
        } else if !raw.trim().is_empty() {
            saw_content = true;
            last_content = n;
        }
    }
    if saw_content {
        spans.push((start, last_content));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parses_plain_and_list_entries() {
        let e = parse_entry(0, "  name: hello").unwrap();
        assert_eq!(e.key, "name");
        assert_eq!(e.indent, 2);
        assert!(!e.list_item);
        assert_eq!(e.value.as_ref().unwrap().text, "hello");

        let e = parse_entry(1, "  - name: step-a").unwrap();
        assert_eq!(e.key, "name");
        assert_eq!(e.indent, 4);
        assert!(e.list_item);
    }

    #[test]
    fn block_keys_have_no_value() {
        let e = parse_entry(0, "    configMapKeyRef:").unwrap();
        assert!(e.is_block());
        assert_eq!(e.key, "configMapKeyRef");
    }

    #[test]
    fn quoted_values_keep_inner_range() {
        let raw = r#"  key: "database-url""#;
        let e = parse_entry(5, raw).unwrap();
        let v = e.value.unwrap();
        assert_eq!(v.text, "database-url");
        assert_eq!(v.range, Range::on_line(5, 8, 20));
    }

    #[test]
    fn trailing_comments_are_stripped() {
        let e = parse_entry(0, "replicas: 3 # three is plenty").unwrap();
        assert_eq!(e.value.unwrap().text, "3");
    }

    #[test]
    fn ignores_comments_separators_and_plain_scalars() {
        assert!(parse_entry(0, "# a comment").is_none());
        assert!(parse_entry(0, "---").is_none());
        assert!(parse_entry(0, "   ").is_none());
        assert!(parse_entry(0, "- just-a-scalar").is_none());
        assert!(parse_entry(0, "http://no.key.here").is_none());
    }

    #[test]
    fn parent_and_block_scalars_respect_indentation() {
        let doc = Document::new(
            "file:///m.yaml",
            indoc! {"
                valueFrom:
                  configMapKeyRef:
                    name: app-config

                    key: database-url
                next: sibling
            "},
        );
        let name = entry_at(&doc, Position::new(2, 5)).unwrap();
        let parent = parent_block(&doc, name.line, name.indent).unwrap();
        assert_eq!(parent.key, "configMapKeyRef");

        let kids = block_scalars(&doc, parent.line, parent.indent);
        let keys: Vec<_> = kids.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["name", "key"]);
    }

    #[test]
    fn flow_mappings_yield_ranged_fields() {
        let raw = "      configMapKeyRef: { name: app-config, key: database-url }";
        let fields = flow_map_entries(3, raw);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].key, "name");
        let v = fields[0].value.as_ref().unwrap();
        assert_eq!(v.text, "app-config");
        assert_eq!(v.range, Range::on_line(3, 31, 41));
        let v = fields[1].value.as_ref().unwrap();
        assert_eq!(v.text, "database-url");
        assert_eq!(v.range, Range::on_line(3, 48, 60));
    }

    #[test]
    fn document_spans_split_on_separators() {
        let doc = Document::new(
            "file:///multi.yaml",
            indoc! {"
                kind: ConfigMap
                ---
                kind: Secret
            "},
        );
        assert_eq!(document_spans(&doc), vec![(0, 0), (2, 2)]);
    }
}
