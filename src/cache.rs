//! Thread-local pattern compilation cache for ast-grep patterns.
//!
//! Every keystroke-level search re-runs the same pattern over one file at a
//! time, so compiled patterns are kept per thread. The cache is capped at
//! 256 entries and cleared wholesale when full.

use crate::sg::errors::SearchError;
use ast_grep_core::Pattern;
use ast_grep_language::SupportLang;
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    // Keyed by "<lang>:<pattern>"; `$A` means different things per grammar.
    static PATTERN_CACHE: RefCell<HashMap<String, Pattern>> =
        RefCell::new(HashMap::new());
}

/// Get a compiled pattern from cache, or compile and cache it.
///
/// Patterns that fail to compile are not cached.
pub fn get_or_compile_pattern(pattern_str: &str, lang: SupportLang) -> Result<Pattern, SearchError> {
    let cache_key = format!("{lang:?}:{pattern_str}");

    PATTERN_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(p) = cache.get(&cache_key) {
            return Ok(p.clone());
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled =
            Pattern::try_new(pattern_str, lang).map_err(|e| SearchError::InvalidPattern {
                message: e.to_string(),
            })?;
        cache.insert(cache_key, compiled.clone());
        Ok(compiled)
    })
}

/// Number of patterns cached on this thread.
pub fn cache_size() -> usize {
    PATTERN_CACHE.with(|cache| cache.borrow().len())
}
