use std::fmt;

/// Identity attached to an outstanding asynchronous request.
///
/// Tokens are compared by value. A completion carrying any other token is
/// not the answer to the pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationToken(u64);

impl CorrelationToken {
    /// Wrap a raw token value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Hands out monotonically increasing tokens, starting at 1.
///
/// Zero is never issued.
#[derive(Debug)]
pub struct TokenGenerator {
    next: u64,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue a fresh token.
    pub fn next_token(&mut self) -> CorrelationToken {
        let token = CorrelationToken(self.next);
        self.next = self.next.checked_add(1).unwrap_or(1);
        token
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_increasing() {
        let mut tokens = TokenGenerator::new();
        let first = tokens.next_token();
        let second = tokens.next_token();
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
        assert_ne!(first, second);
    }

    #[test]
    fn wraps_past_zero() {
        let mut tokens = TokenGenerator { next: u64::MAX };
        assert_eq!(tokens.next_token().get(), u64::MAX);
        assert_eq!(tokens.next_token().get(), 1);
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(CorrelationToken::from_raw(7), CorrelationToken::from_raw(7));
        assert_eq!(CorrelationToken::from_raw(255).to_string(), "0xff");
    }
}
