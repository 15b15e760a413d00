#![forbid(unsafe_code)]

//! Text frame rendered by `Model::view`.

use std::fmt;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// A frame of plain-text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    lines: Vec<String>,
}

impl Frame {
    /// Create an empty frame; lines wider than `width` columns are cut.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
        }
    }

    /// Append a line, truncated to the frame width in display columns.
    pub fn line(&mut self, text: impl AsRef<str>) {
        self.lines.push(truncate_to_width(text.as_ref(), self.width));
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Append a full-width rule.
    ///
    /// Wide glyphs repeat as many times as fit; zero-width ones count as one column.
    pub fn rule(&mut self, ch: char) {
        let cell = ch.width().unwrap_or(1).max(1);
        self.lines.push(std::iter::repeat_n(ch, self.width / cell).collect());
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Longest prefix of `text` that fits in `max_width` columns.
///
/// Cuts on grapheme boundaries so combining marks stay with their base.
#[must_use]
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        if used + w > max_width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lines_are_truncated_to_width() {
        let mut frame = Frame::new(5);
        frame.line("abcdefgh");
        frame.rule('-');
        assert_eq!(frame.lines(), &["abcde".to_string(), "-----".to_string()]);
    }

    #[test]
    fn wide_glyphs_are_cut_by_columns() {
        let mut frame = Frame::new(10);
        frame.line("東京駅から新宿駅まで行く");
        assert_eq!(frame.lines()[0], "東京駅から");
        assert_eq!(frame.lines()[0].width(), 10);

        let mut odd = Frame::new(5);
        odd.line("新宿駅");
        assert_eq!(odd.lines()[0], "新宿");
    }

    #[test]
    fn combining_marks_stay_with_base() {
        let mut frame = Frame::new(3);
        frame.line("Se\u{301}oul");
        assert_eq!(frame.lines()[0], "Se\u{301}o");
    }

    #[test]
    fn wide_rule_fits_width() {
        let mut frame = Frame::new(7);
        frame.rule('═');
        frame.rule('＝');
        assert_eq!(frame.lines()[0].width(), 7);
        assert_eq!(frame.lines()[1], "＝＝＝");
    }

    #[test]
    fn display_joins_lines() {
        let mut frame = Frame::new(10);
        frame.line("a");
        frame.blank();
        frame.line("b");
        assert_eq!(frame.to_string(), "a\n\nb\n");
        assert!(frame.contains("b"));
    }

    proptest! {
        #[test]
        fn no_line_exceeds_width(width in 0usize..40, text in "[ -~À-ÿぁ-ゖ一-龥]{0,80}") {
            let mut frame = Frame::new(width);
            frame.line(&text);
            frame.rule('=');
            frame.rule('＝');
            for line in frame.lines() {
                prop_assert!(line.width() <= width);
            }
        }
    }
}
