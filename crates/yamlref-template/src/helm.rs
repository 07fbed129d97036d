//! Detectors for Helm template expressions: `.Values` paths, `include` /
//! `template` calls, `define` / `block` definitions (with nested
//! `define`/`end` matching and doc-comment recovery), `.Release.*` /
//! `.Capabilities.*` built-ins, and Go-template keywords.

use yamlref_core::{byte_at_utf16, utf16_col, Document, Position, Range, Reference, ReferenceKind};

use crate::expr::{scan_line_exprs, tokenize, ExprToken, LineExpr};

/// Go-template keywords recognized under the cursor.
pub const KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "block", "template", "include", "toYaml",
    "tpl", "required", "default", "printf", "quote", "nindent", "indent",
];

fn token_range(line_no: u32, line: &str, tok: &ExprToken) -> Range {
    Range::on_line(
        line_no,
        utf16_col(line, tok.start),
        utf16_col(line, tok.end),
    )
}

fn values_tail(text: &str) -> Option<&str> {
    text.strip_prefix(".Values.")
        .or_else(|| text.strip_prefix("$.Values."))
        .filter(|t| !t.is_empty())
}

fn scan_line(uri: &str, line_no: u32, line: &str) -> Vec<Reference> {
    let mut out = Vec::new();
    for expr in scan_line_exprs(line) {
        let toks = tokenize(line, &expr);
        let mut first_word_seen = false;
        for (i, tok) in toks.iter().enumerate() {
            if tok.quoted {
                continue;
            }
            let text = tok.text.as_str();
            if text == "-" {
                continue;
            }

            // leading keyword of the expression
            if !first_word_seen {
                first_word_seen = true;
                if KEYWORDS.contains(&text) {
                    out.push(Reference {
                        kind: ReferenceKind::GoTemplateKeyword {
                            keyword: text.to_string(),
                        },
                        range: token_range(line_no, line, tok),
                        uri: uri.to_string(),
                    });
                }
            }

            if let Some(tail) = values_tail(text) {
                out.push(Reference {
                    kind: ReferenceKind::ValuesPath {
                        path: tail.to_string(),
                    },
                    range: token_range(line_no, line, tok),
                    uri: uri.to_string(),
                });
            } else if let Some(tail) = strip_builtin(text, "Release") {
                out.push(Reference {
                    kind: ReferenceKind::ReleaseVariable {
                        name: tail.to_string(),
                    },
                    range: token_range(line_no, line, tok),
                    uri: uri.to_string(),
                });
            } else if let Some(tail) = strip_builtin(text, "Capabilities") {
                out.push(Reference {
                    kind: ReferenceKind::CapabilitiesVariable {
                        name: tail.to_string(),
                    },
                    range: token_range(line_no, line, tok),
                    uri: uri.to_string(),
                });
            }

            // `include "name"` / `template "name"` / `define "name"` / `block "name"`
            if matches!(text, "include" | "template" | "define" | "block") {
                if let Some(name_tok) = toks.get(i + 1).filter(|t| t.quoted && !t.text.is_empty())
                {
                    let kind = if text == "include" || text == "template" {
                        ReferenceKind::IncludeRef {
                            name: name_tok.text.clone(),
                        }
                    } else {
                        ReferenceKind::DefineBlock {
                            name: name_tok.text.clone(),
                        }
                    };
                    out.push(Reference {
                        kind,
                        range: token_range(line_no, line, name_tok),
                        uri: uri.to_string(),
                    });
                }
            }
        }
    }
    out
}

fn strip_builtin<'a>(text: &'a str, base: &str) -> Option<&'a str> {
    let tail = text
        .strip_prefix('$')
        .unwrap_or(text)
        .strip_prefix('.')?
        .strip_prefix(base)?;
    tail.strip_prefix('.').filter(|t| !t.is_empty())
}

/// All Helm expression references in the document.
#[must_use]
pub fn find_all(doc: &Document) -> Vec<Reference> {
    doc.lines()
        .flat_map(|(n, line)| scan_line(doc.uri(), n, line))
        .collect()
}

/// The Helm expression reference at `pos`, if any. When several detected
/// spans cover the position the most specific (shortest) one wins.
#[must_use]
pub fn at_position(doc: &Document, pos: Position) -> Option<Reference> {
    let line = doc.line(pos.line)?;
    scan_line(doc.uri(), pos.line, line)
        .into_iter()
        .filter(|r| r.range.contains_inclusive(pos))
        .min_by_key(|r| r.range.end.character - r.range.start.character)
}

/// The partial `.Values.` path typed before `pos`, for completion.
/// `.Values.image.re|` yields `"image.re"`; `.Values.|` yields `""`.
#[must_use]
pub fn values_prefix_at(doc: &Document, pos: Position) -> Option<String> {
    let line = doc.line(pos.line)?;
    let cursor = byte_at_utf16(line, pos.character)?;
    for expr in scan_line_exprs(line) {
        for tok in tokenize(line, &expr) {
            if tok.quoted || tok.start > cursor || cursor > tok.end {
                continue;
            }
            let typed = &line[tok.start..cursor];
            if let Some(prefix) = typed
                .strip_prefix(".Values")
                .or_else(|| typed.strip_prefix("$.Values"))
            {
                return Some(prefix.strip_prefix('.').unwrap_or("").to_string());
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// define / end block matching
// ---------------------------------------------------------------------------

/// A `{{ define "name" }}` (or `block`) definition with its extent and the
/// descriptive comment found immediately above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineBlockInfo {
    pub name: String,
    pub name_range: Range,
    pub start_line: u32,
    pub end_line: u32,
    pub doc: Option<String>,
}

enum ExprClass {
    Open { name: String, name_range: Range },
    End,
    Other,
}

fn classify_expr(line_no: u32, line: &str, expr: &LineExpr) -> ExprClass {
    let toks = tokenize(line, expr);
    let Some(head) = toks.iter().find(|t| !t.quoted && t.text != "-") else {
        return ExprClass::Other;
    };
    match head.text.as_str() {
        "define" | "block" => {
            let name_tok = toks.iter().find(|t| t.quoted && !t.text.is_empty());
            match name_tok {
                Some(tok) => ExprClass::Open {
                    name: tok.text.clone(),
                    name_range: token_range(line_no, line, tok),
                },
                None => ExprClass::Other,
            }
        }
        "end" => ExprClass::End,
        _ => ExprClass::Other,
    }
}

/// Find every `define`/`block` definition in the document.
///
/// Nesting is resolved with a depth counter: scanning forward from a
/// `define`, each nested `define`/`block` increments and each `end`
/// decrements; the block closes where depth reaches zero. An unclosed
/// block extends to the last line.
#[must_use]
pub fn define_blocks(doc: &Document) -> Vec<DefineBlockInfo> {
    let mut exprs: Vec<(u32, ExprClass)> = Vec::new();
    for (n, line) in doc.lines() {
        for expr in scan_line_exprs(line) {
            exprs.push((n, classify_expr(n, line, &expr)));
        }
    }

    let mut out = Vec::new();
    for (i, (line, class)) in exprs.iter().enumerate() {
        let ExprClass::Open { name, name_range } = class else {
            continue;
        };
        let mut depth = 1u32;
        let mut end_line = doc.line_count().saturating_sub(1);
        for (later_line, later) in exprs.iter().skip(i + 1) {
            match later {
                ExprClass::Open { .. } => depth += 1,
                ExprClass::End => {
                    depth -= 1;
                    if depth == 0 {
                        end_line = *later_line;
                        break;
                    }
                }
                ExprClass::Other => {}
            }
        }
        out.push(DefineBlockInfo {
            name: name.clone(),
            name_range: *name_range,
            start_line: *line,
            end_line,
            doc: doc_comment_above(doc, *line),
        });
    }
    out
}

fn strip_comment_delimiters(raw: &str) -> &str {
    let mut s = raw.trim();
    for open in ["{{- /*", "{{-/*", "{{/*"] {
        if let Some(rest) = s.strip_prefix(open) {
            s = rest.trim_start();
            break;
        }
    }
    for close in ["*/ -}}", "*/-}}", "*/}}"] {
        if let Some(rest) = s.strip_suffix(close) {
            s = rest.trim_end();
            break;
        }
    }
    s
}

/// Recover the descriptive comment directly above `line`: either a run of
/// `#` lines or a `{{/* ... */}}` comment whose closing delimiter sits on
/// the previous line. Scanning stops at the first non-comment line or at
/// the comment's opening delimiter.
#[must_use]
pub fn doc_comment_above(doc: &Document, line: u32) -> Option<String> {
    if line == 0 {
        return None;
    }
    let prev = doc.line(line - 1)?.trim();

    if prev.ends_with("*/}}") || prev.ends_with("*/ -}}") || prev.ends_with("*/-}}") {
        let mut body = Vec::new();
        let mut n = line - 1;
        loop {
            let raw = doc.line(n)?.trim();
            let opened = raw.starts_with("{{/*") || raw.starts_with("{{- /*") || raw.starts_with("{{-/*");
            let cleaned = strip_comment_delimiters(raw);
            if !cleaned.is_empty() {
                body.push(cleaned.to_string());
            }
            if opened || n == 0 {
                break;
            }
            n -= 1;
        }
        body.reverse();
        return (!body.is_empty()).then(|| body.join("\n"));
    }

    if prev.starts_with('#') {
        let mut body = Vec::new();
        let mut n = line;
        while n > 0 {
            let raw = doc.line(n - 1)?.trim();
            if let Some(rest) = raw.strip_prefix('#') {
                body.push(rest.trim().to_string());
                n -= 1;
            } else {
                break;
            }
        }
        body.reverse();
        return (!body.is_empty()).then(|| body.join("\n"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn doc(text: &str) -> Document {
        Document::new("file:///templates/helpers.tpl", text)
    }

    #[test]
    fn values_path_detected_with_tail() {
        let d = doc("image: {{ .Values.image.repository }}");
        let r = at_position(&d, Position::new(0, 20)).unwrap();
        assert_eq!(
            r.kind,
            ReferenceKind::ValuesPath {
                path: "image.repository".into()
            }
        );
    }

    #[test]
    fn include_name_detected_inside_quotes() {
        let d = doc(r#"labels: {{ include "mychart.labels" . | nindent 4 }}"#);
        let r = at_position(&d, Position::new(0, 25)).unwrap();
        assert_eq!(
            r.kind,
            ReferenceKind::IncludeRef {
                name: "mychart.labels".into()
            }
        );
    }

    #[test]
    fn release_and_capabilities_tails() {
        let d = doc("a: {{ .Release.Name }} {{ .Capabilities.KubeVersion.Minor }}");
        let r = at_position(&d, Position::new(0, 12)).unwrap();
        assert_eq!(r.kind, ReferenceKind::ReleaseVariable { name: "Name".into() });
        let r = at_position(&d, Position::new(0, 45)).unwrap();
        assert_eq!(
            r.kind,
            ReferenceKind::CapabilitiesVariable {
                name: "KubeVersion.Minor".into()
            }
        );
    }

    #[test]
    fn keyword_under_cursor() {
        let d = doc("{{- if .Values.enabled }}");
        let r = at_position(&d, Position::new(0, 5)).unwrap();
        assert_eq!(r.kind, ReferenceKind::GoTemplateKeyword { keyword: "if".into() });
    }

    #[test]
    fn nested_defines_close_innermost_first() {
        let d = doc(r#"{{ define "a" }}{{ define "b" }}X{{ end }}{{ end }}"#);
        let blocks = define_blocks(&d);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "a");
        assert_eq!(blocks[1].name, "b");
        // both close on line 0 here; multi-line nesting below
        let d = doc(indoc! {r#"
            {{ define "a" }}
            {{ define "b" }}
            X
            {{ end }}
            {{ end }}
            trailing
        "#});
        let blocks = define_blocks(&d);
        assert_eq!(blocks[0].end_line, 4);
        assert_eq!(blocks[1].end_line, 3);
    }

    #[test]
    fn define_doc_comment_recovered_from_helm_comment() {
        let d = doc(indoc! {r#"
            {{/*
            Expand the name of the chart.
            */}}
            {{- define "mychart.name" -}}
            {{- end -}}
        "#});
        let blocks = define_blocks(&d);
        assert_eq!(blocks[0].doc.as_deref(), Some("Expand the name of the chart."));
    }

    #[test]
    fn define_doc_comment_from_hash_lines() {
        let d = doc(indoc! {r#"
            # Common labels,
            # used everywhere.
            {{- define "mychart.labels" -}}
            {{- end -}}
        "#});
        let blocks = define_blocks(&d);
        assert_eq!(
            blocks[0].doc.as_deref(),
            Some("Common labels,\nused everywhere.")
        );
    }

    #[test]
    fn values_prefix_for_completion() {
        let d = doc("image: {{ .Values.image.re }}");
        // cursor right after `.Values.image.re`
        let prefix = values_prefix_at(&d, Position::new(0, 26)).unwrap();
        assert_eq!(prefix, "image.re");
        let d = doc("image: {{ .Values. }}");
        let prefix = values_prefix_at(&d, Position::new(0, 18)).unwrap();
        assert_eq!(prefix, "");
    }
}
