//! API token rotation.

use parking_lot::Mutex;
use std::sync::Arc;

/// A pool of API tokens rotated through on rejection.
///
/// Replaces the process-wide mutable token index of earlier deployments with
/// an explicit object that can be passed around and tested in isolation.
/// Cheap to clone; all clones share the same rotation position.
#[derive(Clone)]
pub struct TokenPool {
    inner: Arc<Inner>,
}

struct Inner {
    tokens: Vec<String>,
    index: Mutex<usize>,
}

impl TokenPool {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tokens,
                index: Mutex::new(0),
            }),
        }
    }

    /// Build a pool from a comma-separated token list.
    pub fn from_list(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.tokens.len()
    }

    /// The token at the current rotation position, if any.
    pub fn current(&self) -> Option<String> {
        if self.inner.tokens.is_empty() {
            return None;
        }
        let index = *self.inner.index.lock();
        Some(self.inner.tokens[index % self.inner.tokens.len()].clone())
    }

    /// Advance to the next token and return it.
    pub fn rotate(&self) -> Option<String> {
        if self.inner.tokens.is_empty() {
            return None;
        }
        let mut index = self.inner.index.lock();
        *index = (*index + 1) % self.inner.tokens.len();
        Some(self.inner.tokens[*index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_stable_until_rotated() {
        let pool = TokenPool::new(vec!["a".into(), "b".into()]);

        assert_eq!(pool.current().as_deref(), Some("a"));
        assert_eq!(pool.current().as_deref(), Some("a"));
    }

    #[test]
    fn rotate_cycles_and_wraps() {
        let pool = TokenPool::new(vec!["a".into(), "b".into(), "c".into()]);

        assert_eq!(pool.rotate().as_deref(), Some("b"));
        assert_eq!(pool.rotate().as_deref(), Some("c"));
        assert_eq!(pool.rotate().as_deref(), Some("a"));
    }

    #[test]
    fn clones_share_the_rotation_position() {
        let pool = TokenPool::new(vec!["a".into(), "b".into()]);
        let clone = pool.clone();

        clone.rotate();
        assert_eq!(pool.current().as_deref(), Some("b"));
    }

    #[test]
    fn empty_pool_yields_no_tokens() {
        let pool = TokenPool::from_list(" , ");

        assert!(pool.is_empty());
        assert!(pool.current().is_none());
        assert!(pool.rotate().is_none());
    }

    #[test]
    fn parses_comma_separated_list() {
        let pool = TokenPool::from_list("hf_a, hf_b ,hf_c");

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.current().as_deref(), Some("hf_a"));
    }
}
