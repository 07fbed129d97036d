/// Line-scoped scanner for Go-template blocks.
///
/// Recognizes `{{ ... }}` and `{{- ... -}}` and keeps byte ranges within the
/// line. Inside a block it respects `"..."` and `` `...` `` strings so a
/// `}}` in a literal does not terminate the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineExpr {
    /// Byte offset of `{{` within the line.
    pub start: usize,
    /// Byte offset just after `}}`.
    pub end: usize,
    /// First byte of the inner expression (after `{{`/`{{-` and spaces).
    pub inner_start: usize,
    /// First byte after the inner expression (before `-}}`/`}}`).
    pub inner_end: usize,
}

impl LineExpr {
    #[must_use]
    pub fn inner<'a>(&self, line: &'a str) -> &'a str {
        line[self.inner_start..self.inner_end]
            .trim_end()
            .trim_end_matches('-')
            .trim_end()
    }
}

/// Scan a single line for template expression blocks.
#[must_use]
pub fn scan_line_exprs(line: &str) -> Vec<LineExpr> {
    let b = line.as_bytes();
    let mut i = 0;
    let mut out = Vec::new();
    while i + 1 < b.len() {
        if b[i] != b'{' || b[i + 1] != b'{' {
            i += 1;
            continue;
        }
        let start = i;
        i += 2;
        if i < b.len() && b[i] == b'-' {
            i += 1;
        }
        while i < b.len() && (b[i] == b' ' || b[i] == b'\t') {
            i += 1;
        }
        let inner_start = i;

        // Scan to the matching `}}`, respecting strings.
        let mut dq = false;
        let mut bt = false;
        let mut esc = false;
        let mut closed = false;
        while i < b.len() {
            let c = b[i];
            if bt {
                if c == b'`' {
                    bt = false;
                }
                i += 1;
                continue;
            }
            if dq {
                if esc {
                    esc = false;
                } else if c == b'\\' {
                    esc = true;
                } else if c == b'"' {
                    dq = false;
                }
                i += 1;
                continue;
            }
            if c == b'`' {
                bt = true;
                i += 1;
                continue;
            }
            if c == b'"' {
                dq = true;
                i += 1;
                continue;
            }
            if c == b'}' && i + 1 < b.len() && b[i + 1] == b'}' {
                let inner_end = i;
                let end = i + 2;
                out.push(LineExpr {
                    start,
                    end,
                    inner_start,
                    inner_end,
                });
                i = end;
                closed = true;
                break;
            }
            i += 1;
        }
        if !closed {
            // unterminated block: nothing more on this line
            break;
        }
    }
    out
}

/// A token within an expression block: a maximal run of path characters
/// (identifiers, dots, `$`, `-`) or a quoted string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprToken {
    pub text: String,
    /// Byte offsets within the owning line.
    pub start: usize,
    pub end: usize,
    pub quoted: bool,
}

fn is_path_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b'$' | b'=')
}

/// Tokenize the inner span of an expression block.
#[must_use]
pub fn tokenize(line: &str, expr: &LineExpr) -> Vec<ExprToken> {
    let b = line.as_bytes();
    let mut i = expr.inner_start;
    let end = expr.inner_end;
    let mut out = Vec::new();
    while i < end {
        let c = b[i];
        if c == b'"' || c == b'`' {
            let quote = c;
            let tok_start = i;
            i += 1;
            let text_start = i;
            let mut esc = false;
            while i < end {
                if quote == b'"' {
                    if esc {
                        esc = false;
                    } else if b[i] == b'\\' {
                        esc = true;
                    } else if b[i] == quote {
                        break;
                    }
                } else if b[i] == quote {
                    break;
                }
                i += 1;
            }
            let text_end = i.min(end);
            if i < end {
                i += 1; // closing quote
            }
            out.push(ExprToken {
                text: line[text_start..text_end].to_string(),
                start: tok_start,
                end: i,
                quoted: true,
            });
        } else if is_path_byte(c) {
            let tok_start = i;
            while i < end && is_path_byte(b[i]) {
                i += 1;
            }
            out.push(ExprToken {
                text: line[tok_start..i].to_string(),
                start: tok_start,
                end: i,
                quoted: false,
            });
        } else {
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_plain_and_trimmed_blocks() {
        let line = "name: {{ .Values.name }} and {{- include \"x\" . -}}";
        let exprs = scan_line_exprs(line);
        assert_eq!(exprs.len(), 2);
        assert_eq!(exprs[0].inner(line), ".Values.name");
        assert_eq!(exprs[1].inner(line), "include \"x\" .");
    }

    #[test]
    fn braces_in_strings_do_not_close_block() {
        let line = r#"{{ printf "}}" }}"#;
        let exprs = scan_line_exprs(line);
        assert_eq!(exprs.len(), 1);
        assert_eq!(exprs[0].inner(line), r#"printf "}}""#);
    }

    #[test]
    fn unterminated_block_yields_nothing() {
        assert!(scan_line_exprs("{{ .Values.na").is_empty());
    }

    #[test]
    fn tokenizes_paths_and_quoted_names() {
        let line = r#"{{ include "mychart.labels" .Values.ctx }}"#;
        let exprs = scan_line_exprs(line);
        let toks = tokenize(line, &exprs[0]);
        let texts: Vec<_> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["include", "mychart.labels", ".Values.ctx"]);
        assert!(toks[1].quoted);
        assert!(!toks[2].quoted);
    }

    #[test]
    fn compact_argo_expression() {
        let line = "value: {{workflow.parameters.message}}";
        let exprs = scan_line_exprs(line);
        assert_eq!(exprs.len(), 1);
        assert_eq!(exprs[0].inner(line), "workflow.parameters.message");
    }
}
