//! Text helpers for tabular export.

use chrono::NaiveDate;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Separator that stands in for a newline inside a single-line cell.
pub const LINE_JOIN: &str = " | ";

// ============================================================================
// Wrapping
// ============================================================================

/// Hard-wrap `text` so no line is wider than `width` display columns.
///
/// Breaks on whitespace; a single token wider than `width` is cut at the
/// column limit. Existing line breaks are preserved. `width == 0` disables
/// wrapping.
#[must_use]
pub fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }
    text.lines()
        .map(|line| wrap_line(line, width).join("\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in line.split_whitespace() {
        let word_width = word.width();

        if word_width > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let mut pieces = hard_cut(word, width);
            let last = pieces.pop().unwrap_or_default();
            out.extend(pieces);
            current_width = last.width();
            current = last;
            continue;
        }

        let needed = if current.is_empty() {
            word_width
        } else {
            current_width + 1 + word_width
        };
        if needed > width {
            out.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_width = needed;
        }
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

fn hard_cut(word: &str, width: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_width = 0;
    for c in word.chars() {
        let w = c.width().unwrap_or(0);
        if piece_width + w > width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            piece_width = 0;
        }
        piece.push(c);
        piece_width += w;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

// ============================================================================
// Cells
// ============================================================================

/// Collapse embedded newlines into [`LINE_JOIN`] so each record stays on one line.
#[must_use]
pub fn single_line(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join(LINE_JOIN)
}

/// ISO-8601 calendar date, as used in export file names.
#[must_use]
pub fn iso_date_stamp(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_breaks_on_words() {
        assert_eq!(wrap_text("the quick brown fox", 10), "the quick\nbrown fox");
        assert_eq!(wrap_text("short", 10), "short");
    }

    #[test]
    fn test_wrap_cuts_long_tokens() {
        assert_eq!(wrap_text("abcdefghijkl xy", 5), "abcde\nfghij\nkl xy");
    }

    #[test]
    fn test_wrap_counts_display_width() {
        // Each CJK character occupies two columns.
        assert_eq!(wrap_text("日本語テキスト", 6), "日本語\nテキス\nト");
    }

    #[test]
    fn test_wrap_keeps_paragraphs() {
        assert_eq!(wrap_text("a b\nc d", 80), "a b\nc d");
        assert_eq!(wrap_text("x", 0), "x");
    }

    #[test]
    fn test_single_line_joins() {
        assert_eq!(single_line("1. Open app\r\n2. Log in"), "1. Open app | 2. Log in");
        assert_eq!(single_line("plain"), "plain");
    }

    #[test]
    fn test_date_stamp() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(iso_date_stamp(date), "2026-03-09");
    }
}
