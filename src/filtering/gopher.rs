//! Gopher-style quality heuristics.
//!
//! A document passes when it has enough words, is mostly alphabetic,
//! has a plausible mean word length and is not dominated by
//! ellipsis-terminated lines.
use unicode_segmentation::UnicodeSegmentation;

/// Hard ceiling on token count.
const MAX_WORDS: usize = 100_000;
/// Minimum fraction of tokens containing at least one ASCII letter.
const MIN_ALPHA_FRACTION: f64 = 0.8;
/// Accepted mean token length, in codepoints.
const MEAN_LENGTH_RANGE: (f64, f64) = (3.0, 10.0);
/// Maximum fraction of non-empty lines ending in an ellipsis.
const MAX_ELLIPSIS_FRACTION: f64 = 0.30;

/// Disposition of a checked document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Ok,
    TooShort,
    TooLong,
    LowAlpha,
    AvgLenOob,
    ExcessEllipsis,
}

impl Reason {
    /// Counter-friendly tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Reason::Ok => "ok",
            Reason::TooShort => "too_short",
            Reason::TooLong => "too_long",
            Reason::LowAlpha => "low_alpha",
            Reason::AvgLenOob => "avg_len_oob",
            Reason::ExcessEllipsis => "excess_ellipsis",
        }
    }
}

/// Quality filter combining token count, alphabetic fraction, mean
/// token length and ellipsis-line fraction.
pub struct GopherQuality {
    min_words: usize,
}

impl GopherQuality {
    pub fn with_min_words(min_words: usize) -> Self {
        Self { min_words }
    }

    /// Check a document, stopping at the first violated heuristic.
    pub fn check(&self, text: &str) -> Reason {
        let tokens: Vec<&str> = text
            .split_word_bounds()
            .filter(|piece| !piece.trim().is_empty())
            .collect();
        let total = tokens.len();

        // strict bound: a text with exactly min_words tokens is too short
        if total < self.min_words || total == 0 {
            return Reason::TooShort;
        }
        if total > MAX_WORDS {
            return Reason::TooLong;
        }

        let mut alpha = 0usize;
        let mut length_sum = 0usize;
        for token in &tokens {
            if token.chars().any(|c| c.is_ascii_alphabetic()) {
                alpha += 1;
            }
            length_sum += token.chars().count();
        }

        if (alpha as f64) / (total as f64) < MIN_ALPHA_FRACTION {
            return Reason::LowAlpha;
        }

        let mean_length = (length_sum as f64) / (total as f64);
        if mean_length < MEAN_LENGTH_RANGE.0 || mean_length > MEAN_LENGTH_RANGE.1 {
            return Reason::AvgLenOob;
        }

        if Self::ellipsis_line_fraction(text) > MAX_ELLIPSIS_FRACTION {
            return Reason::ExcessEllipsis;
        }

        Reason::Ok
    }

    /// Fraction of non-empty lines ending in `...` or `…`, trailing
    /// whitespace ignored.
    fn ellipsis_line_fraction(text: &str) -> f64 {
        let mut lines = 0usize;
        let mut ellipsis = 0usize;
        for line in text.lines() {
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            lines += 1;
            if trimmed.ends_with("...") || trimmed.ends_with('…') {
                ellipsis += 1;
            }
        }

        if lines == 0 {
            return 0.0;
        }
        (ellipsis as f64) / (lines as f64)
    }
}

impl Default for GopherQuality {
    /// Word floor of 50, matching typical web-corpus settings.
    fn default() -> Self {
        Self { min_words: 50 }
    }
}
