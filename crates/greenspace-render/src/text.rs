use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// Font request for measurement; `font_size` is in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: f64,
    pub bold: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 3.5,
            bold: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub line_count: usize,
}

pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;
}

/// Font-free estimate: every display column is `char_width_factor` em wide.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
    pub bold_factor: f64,
}

impl DeterministicTextMeasurer {
    pub fn lines(text: &str) -> Vec<&str> {
        text.lines().collect::<Vec<_>>()
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let char_width_factor = if self.char_width_factor == 0.0 {
            0.55
        } else {
            self.char_width_factor
        };
        let line_height_factor = if self.line_height_factor == 0.0 {
            1.2
        } else {
            self.line_height_factor
        };
        let bold_factor = if !style.bold {
            1.0
        } else if self.bold_factor == 0.0 {
            1.08
        } else {
            self.bold_factor
        };

        let lines = Self::lines(text);
        let line_count = lines.len().max(1);
        let font_size = style.font_size.max(0.0);
        let columns = lines.iter().map(|l| l.width()).max().unwrap_or(0);

        TextMetrics {
            width: columns as f64 * font_size * char_width_factor * bold_factor,
            height: line_count as f64 * font_size * line_height_factor,
            line_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_follows_the_longest_line() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle {
            font_size: 10.0,
            ..Default::default()
        };
        let one = m.measure("abcd", &style);
        let two = m.measure("ab\nabcd", &style);
        assert_eq!(one.width, two.width);
        assert_eq!(two.line_count, 2);
        assert!((two.height - 24.0).abs() < 1e-9);
    }

    #[test]
    fn bold_text_is_wider() {
        let m = DeterministicTextMeasurer::default();
        let regular = TextStyle {
            font_size: 7.0,
            ..Default::default()
        };
        let bold = TextStyle {
            bold: true,
            ..regular.clone()
        };
        assert!(m.measure("Toronto", &bold).width > m.measure("Toronto", &regular).width);
    }

    #[test]
    fn empty_text_still_occupies_one_line() {
        let metrics = DeterministicTextMeasurer::default().measure("", &TextStyle::default());
        assert_eq!(metrics.width, 0.0);
        assert_eq!(metrics.line_count, 1);
    }
}
