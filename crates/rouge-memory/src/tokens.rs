/// Character-ratio token estimate used wherever a real tokenizer count is unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimator {
    chars_per_token: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: Self::DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl TokenEstimator {
    pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

    /// Non-finite or non-positive ratios fall back to the default.
    #[must_use]
    pub fn new(chars_per_token: f64) -> Self {
        if chars_per_token.is_finite() && chars_per_token > 0.0 {
            Self { chars_per_token }
        } else {
            tracing::warn!(chars_per_token, "invalid chars_per_token, using default");
            Self::default()
        }
    }

    #[must_use]
    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }

    /// Tokens for `text`, rounded up so any non-empty text costs at least one token.
    #[must_use]
    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_chars(text.chars().count())
    }

    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn estimate_chars(&self, chars: usize) -> usize {
        (chars as f64 / self.chars_per_token).ceil() as usize
    }

    /// A stored tokenizer count wins over the character estimate.
    #[must_use]
    pub fn estimate_with_hint(&self, text: &str, token_count: Option<u64>) -> usize {
        match token_count.and_then(|n| usize::try_from(n).ok()) {
            Some(n) => n,
            None => self.estimate(text),
        }
    }
}
