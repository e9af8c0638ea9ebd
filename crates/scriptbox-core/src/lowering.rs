//! Source lowering for two pieces of syntax the embedded parser rejects.
//!
//! * `while COND:` becomes `for _ in range(WHILE_ITERATION_LIMIT):` with
//!   `if not (COND): break` as the first statement of the body. `break` and
//!   `continue` keep their meaning, since the condition is re-tested at the
//!   top of every pass.
//! * A set display `{a, b}` (or `{x for x in xs}`) becomes `set([a, b])`.
//!   Braces holding a top-level `:` are dictionaries and stay as they are.
//!
//! Only code is rewritten. String literals and comments are classified first
//! and never touched, so `"while x: {1}"` inside a literal survives intact.

/// Upper bound on `while` iterations. Any script deadline expires long
/// before a loop gets this far.
pub const WHILE_ITERATION_LIMIT: i32 = i32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Code,
    Literal,
    Comment,
}

/// Rewrite `script` into syntax the parser accepts.
pub fn lower(script: &str) -> String {
    let sets_lowered = if script.contains('{') {
        lower_set_displays(script)
    } else {
        script.to_owned()
    };
    if sets_lowered.contains("while") {
        lower_while_loops(&sets_lowered)
    } else {
        sets_lowered
    }
}

/// Classify every byte of `src` as code, string literal or comment.
fn classify(src: &str) -> Vec<Class> {
    let bytes = src.as_bytes();
    let mut classes = vec![Class::Code; bytes.len()];
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    classes[i] = Class::Comment;
                    i += 1;
                }
            }
            quote @ (b'"' | b'\'') => {
                let triple = bytes[i..].starts_with(&[quote; 3]);
                let delimiter = if triple { 3 } else { 1 };
                let start = i;
                i += delimiter;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 2,
                        // Unterminated; the parser reports it.
                        b'\n' if !triple => break,
                        b if b == quote && (!triple || bytes[i..].starts_with(&[quote; 3])) => {
                            i += delimiter;
                            break;
                        }
                        _ => i += 1,
                    }
                }
                i = i.min(bytes.len());
                classes[start..i].fill(Class::Literal);
            }
            _ => i += 1,
        }
    }
    classes
}

/// Apply non-overlapping `(start, end, replacement)` edits.
fn apply(src: &str, mut edits: Vec<(usize, usize, String)>) -> String {
    if edits.is_empty() {
        return src.to_owned();
    }
    edits.sort_by_key(|(start, _, _)| *start);
    let mut out = String::with_capacity(src.len() + edits.len() * 48);
    let mut cursor = 0;
    for (start, end, replacement) in edits {
        out.push_str(&src[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&src[cursor..]);
    out
}

fn has_code(src: &str, classes: &[Class], start: usize, end: usize) -> bool {
    src.as_bytes()[start..end]
        .iter()
        .zip(&classes[start..end])
        .any(|(b, class)| *class == Class::Code && !b.is_ascii_whitespace())
}

struct OpenBracket {
    byte: u8,
    at: usize,
    colon: bool,
}

fn lower_set_displays(src: &str) -> String {
    let classes = classify(src);
    let mut stack: Vec<OpenBracket> = Vec::new();
    let mut edits = Vec::new();

    for (i, &b) in src.as_bytes().iter().enumerate() {
        if classes[i] != Class::Code {
            continue;
        }
        match b {
            b'(' | b'[' | b'{' => stack.push(OpenBracket {
                byte: b,
                at: i,
                colon: false,
            }),
            b':' => {
                if let Some(top) = stack.last_mut() {
                    top.colon = true;
                }
            }
            b')' | b']' | b'}' => {
                let Some(open) = stack.pop() else {
                    continue;
                };
                if b == b'}'
                    && open.byte == b'{'
                    && !open.colon
                    && has_code(src, &classes, open.at + 1, i)
                {
                    edits.push((open.at, open.at + 1, "set([".to_string()));
                    edits.push((i, i + 1, "])".to_string()));
                }
            }
            _ => {}
        }
    }
    apply(src, edits)
}

/// Byte offsets of every physical line start.
fn line_starts(src: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(src.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

fn line_end(src: &str, from: usize) -> usize {
    src[from..].find('\n').map_or(src.len(), |i| from + i)
}

fn indent_end(src: &str, line_start: usize) -> usize {
    let bytes = src.as_bytes();
    let mut i = line_start;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

/// Offsets of the first non-blank byte of every line that begins a new
/// statement: not inside brackets, a literal, or a backslash continuation.
fn statement_starts(src: &str, classes: &[Class]) -> Vec<usize> {
    let bytes = src.as_bytes();
    let mut starts = Vec::new();
    let mut depth = 0usize;
    let mut continued = false;

    for line_start in line_starts(src) {
        let end = line_end(src, line_start);
        let first = indent_end(src, line_start);
        let opens_statement = depth == 0
            && !continued
            && (line_start == bytes.len() || classes[line_start] == Class::Code);
        if opens_statement && first < end && classes[first] == Class::Code {
            starts.push(first);
        }

        continued = false;
        for i in line_start..end {
            if classes[i] != Class::Code {
                continue;
            }
            match bytes[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'\\' if i + 1 == end => continued = true,
                _ => {}
            }
        }
    }
    starts
}

fn is_keyword_at(src: &str, classes: &[Class], at: usize, keyword: &str) -> bool {
    let after = at + keyword.len();
    classes[at] == Class::Code
        && src[at..].starts_with(keyword)
        && src
            .as_bytes()
            .get(after)
            .map_or(true, |b| !(b.is_ascii_alphanumeric() || *b == b'_'))
}

/// The `:` closing a compound statement header that starts at `from`.
fn header_colon(src: &str, classes: &[Class], from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = from;
    while i < bytes.len() {
        if classes[i] == Class::Code {
            match bytes[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b':' if depth == 0 => return Some(i),
                b'\\' if bytes.get(i + 1) == Some(&b'\n') => i += 1,
                b'\n' if depth == 0 => return None,
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Indentation of the first statement line at or after `from`.
fn next_statement_indent<'s>(src: &'s str, classes: &[Class], from: usize) -> Option<&'s str> {
    let mut line_start = from;
    while line_start < src.len() {
        let end = line_end(src, line_start);
        let first = indent_end(src, line_start);
        if first < end && classes[first] == Class::Code {
            return Some(&src[line_start..first]);
        }
        line_start = end + 1;
    }
    None
}

fn lower_while_loops(src: &str) -> String {
    let classes = classify(src);
    let mut edits = Vec::new();

    for start in statement_starts(src, &classes) {
        if !is_keyword_at(src, &classes, start, "while") {
            continue;
        }
        let Some(colon) = header_colon(src, &classes, start + "while".len()) else {
            continue;
        };
        let line_start = src[..start].rfind('\n').map_or(0, |i| i + 1);
        let indent = &src[line_start..start];
        let condition = src[start + "while".len()..colon].trim();
        let header = format!("{indent}for _ in range({WHILE_ITERATION_LIMIT}):");
        let rest_end = line_end(src, colon + 1);

        if has_code(src, &classes, colon + 1, rest_end) {
            // `while COND: stmt` on one line.
            let body = src[colon + 1..rest_end].trim_start();
            edits.push((
                line_start,
                rest_end,
                format!(
                    "{header}\n{indent}    if not ({condition}):\n{indent}        break\n{indent}    {body}"
                ),
            ));
        } else {
            let Some(body_indent) = next_statement_indent(src, &classes, rest_end + 1) else {
                continue;
            };
            if body_indent.len() <= indent.len() {
                continue;
            }
            edits.push((
                line_start,
                colon + 1,
                format!("{header}\n{body_indent}if not ({condition}):\n{body_indent}    break"),
            ));
        }
    }
    apply(src, edits)
}
