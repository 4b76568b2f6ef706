use glob::Pattern;

use crate::bucket::BucketRouter;
use crate::error::KVError;
use crate::store::ByteRead;

/// Characters that start a glob construct.
const META: [char; 3] = ['*', '?', '['];

/// Compiled key pattern.
///
/// Dialect is that of `glob::Pattern`: `*` matches any run of characters
/// (including `/`), `?` exactly one, `[abc]`, `[!abc]` and `[a-z]` a set.
/// Matching is case-sensitive.
pub struct KeyPattern {
    pattern: Pattern,
    head: String,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self, KVError> {
        // Keys are not paths: `**` means the same as `*` here, and glob
        // would otherwise reject it next to other characters.
        let pattern = &collapse_stars(pattern);
        let compiled = Pattern::new(pattern)
            .map_err(|e| KVError::Validation(format!("bad key pattern {:?}: {}", pattern, e)))?;
        Ok(Self {
            pattern: compiled,
            head: literal_head(pattern).to_string(),
        })
    }

    /// Literal text every matching key must start with.
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn matches(&self, key: &str) -> bool {
        self.pattern.matches(key)
    }
}

/// Replace every run of `*` with a single `*`.
fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && out.ends_with('*') {
            continue;
        }
        out.push(c);
    }
    out
}

/// The part of `pattern` before its first glob construct.
fn literal_head(pattern: &str) -> &str {
    match pattern.find(META) {
        Some(idx) => &pattern[..idx],
        None => pattern,
    }
}

/// Keys of the active bucket in `region` matching `pattern`, in ascending
/// byte order. Empty when nothing matches.
pub fn list_keys(
    view: &dyn ByteRead,
    region: &str,
    router: &BucketRouter,
    pattern: &KeyPattern,
) -> Result<Vec<String>, KVError> {
    let prefix = router.prefix(pattern.head());
    let mut keys = Vec::new();

    for (physical, _) in view.scan(region, &prefix)? {
        let Some(key) = router.strip(&physical) else {
            continue;
        };
        if pattern.matches(&key) {
            keys.push(key);
        }
    }

    Ok(keys)
}
