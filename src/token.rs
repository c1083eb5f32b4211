use std::sync::Arc;

const SIMPLE_CHARS_PER_TOKEN: usize = 4;
const ENHANCED_WORD_MULTIPLIER: f64 = 1.3;
const ENHANCED_SPECIAL_DIVISOR: usize = 10;

/// How the splitter measures the length of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthFunction {
    /// Unicode scalar values (the default)
    #[default]
    Characters,
    /// Simple character-based token estimate (~4 chars per token)
    SimpleTokens,
    /// Token estimate mixing word, character and punctuation counts
    EnhancedTokens,
}

impl LengthFunction {
    /// Creates the measuring implementation for this kind.
    #[must_use]
    pub fn create(self) -> Arc<dyn TextLength> {
        match self {
            Self::Characters => Arc::new(CharacterLength),
            Self::SimpleTokens => Arc::new(SimpleTokenizer),
            Self::EnhancedTokens => Arc::new(EnhancedTokenizer),
        }
    }

    /// Short name used in logs and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::SimpleTokens => "simple-tokens",
            Self::EnhancedTokens => "enhanced-tokens",
        }
    }
}

/// Measures text for chunk sizing.
///
/// Implementations must be thread-safe.
pub trait TextLength: Send + Sync {
    /// Returns the length of `text` in this measure's units.
    fn measure(&self, text: &str) -> usize;
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CharacterLength;

impl TextLength for CharacterLength {
    fn measure(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// Simple character-based tokenizer.
///
/// Uses a heuristic of approximately 4 characters per token.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SimpleTokenizer;

impl TextLength for SimpleTokenizer {
    fn measure(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        text.chars()
            .count()
            .saturating_add(SIMPLE_CHARS_PER_TOKEN - 1)
            .saturating_div(SIMPLE_CHARS_PER_TOKEN)
            .max(1)
    }
}

/// Enhanced tokenizer with multiple heuristics.
///
/// Averages a word-based estimate (words * 1.3) with a character-based one
/// (chars / 4) and adds a penalty for punctuation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EnhancedTokenizer;

impl TextLength for EnhancedTokenizer {
    fn measure(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let words = text.split_whitespace().count();
        let chars = text.chars().count();
        let special_chars = count_special_chars(text);

        let word_estimate = (words as f64 * ENHANCED_WORD_MULTIPLIER) as usize;
        let char_estimate = chars.saturating_div(SIMPLE_CHARS_PER_TOKEN);
        let special_penalty = special_chars.saturating_div(ENHANCED_SPECIAL_DIVISOR);

        word_estimate
            .saturating_add(char_estimate)
            .saturating_div(2)
            .saturating_add(special_penalty)
            .max(1)
    }
}

#[inline]
fn count_special_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count()
}
