//! Thread-local compilation cache for rewrite patterns.
//!
//! Pattern compilation is pure and deterministic, so compiled patterns
//! are memoized keyed on their source text. The cache is capped at 256
//! entries; when full it is cleared and rebuilt on demand, which is
//! adequate for batch plan runs that reuse a handful of patterns.

use crate::pattern::{Pattern, PatternError};
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static PATTERN_CACHE: RefCell<HashMap<String, Pattern>> =
        RefCell::new(HashMap::new());
}

/// Get a compiled pattern from cache, or compile and cache it.
///
/// Compilation failures are not cached; a malformed pattern fails the
/// same way on every call.
pub fn get_or_compile(source: &str) -> Result<Pattern, PatternError> {
    PATTERN_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(p) = cache.get(source) {
            return Ok(p.clone());
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled = Pattern::compile(source)?;
        cache.insert(source.to_string(), compiled.clone());
        Ok(compiled)
    })
}

/// Clear the pattern cache (mainly for testing).
pub fn clear_cache() {
    PATTERN_CACHE.with(|cache| {
        cache.borrow_mut().clear();
    });
}

/// Current number of cached patterns.
pub fn cache_size() -> usize {
    PATTERN_CACHE.with(|cache| cache.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_compiled_patterns() {
        clear_cache();
        let a = get_or_compile("path: '{route:expr}',").unwrap();
        let b = get_or_compile("path: '{route:expr}',").unwrap();
        assert_eq!(a, b);
        assert_eq!(cache_size(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        clear_cache();
        assert!(get_or_compile("{oops").is_err());
        assert_eq!(cache_size(), 0);
    }
}
