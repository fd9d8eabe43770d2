/*!
format.rs

Formatting helpers for human-readable command output.

  - StyleOptions::detect()  NO_COLOR disables ANSI, COLUMNS sets the width
  - color(role, text, &style)
  - table(headers, rows, &style)  left-aligned columns, last column truncated

JSON output paths do not use these helpers.
*/

use std::borrow::Cow;

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            term_width: width,
        }
    }

    pub fn plain(term_width: usize) -> Self {
        StyleOptions {
            use_color: false,
            term_width,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Accent,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",
        Role::Accent => "38;5;213",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

/// Render rows under `headers`. Columns are padded to their widest cell; the
/// last column is cut with an ellipsis when the line would exceed the width.
pub fn table(headers: &[&str], rows: &[Vec<String>], style: &StyleOptions) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let fixed: usize = widths[..cols - 1].iter().map(|w| w + 2).sum();
    let last_budget = style.term_width.saturating_sub(fixed).max(8);

    let render = |cells: Vec<&str>| -> String {
        let mut line = String::new();
        for (i, cell) in cells.into_iter().enumerate() {
            if i + 1 == cols {
                line.push_str(&truncate_ellipsis(cell, last_budget));
            } else {
                line.push_str(cell);
                line.push_str(&" ".repeat(widths[i] - display_width(cell) + 2));
            }
        }
        line.trim_end().to_string()
    };

    let mut out = vec![color(Role::Accent, render(headers.to_vec()), style)];
    for row in rows {
        let cells = (0..cols)
            .map(|c| row.get(c).map(String::as_str).unwrap_or(""))
            .collect();
        out.push(render(cells));
    }
    out.join("\n")
}

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 1 {
        return "…".into();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    // ESC '[' ... final letter
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut buf = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for inner in chars.by_ref() {
                if inner.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        buf.push(c);
    }
    Cow::Owned(buf)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}
