//! PatternRegistry - pattern to receiver bindings
//!
//! Exact patterns are indexed by hash, wildcard patterns are scanned in
//! registration order. Lookup results from both kinds are merged by global
//! registration order, so the outcome never depends on hashing.

use std::collections::HashMap;

use contracts::{MorphError, Pattern};

struct Bucket<T> {
    pattern: Pattern,
    /// (registration sequence, value)
    entries: Vec<(u64, T)>,
}

/// Ordered registry of pattern bindings
pub struct PatternRegistry<T> {
    buckets: Vec<Bucket<T>>,
    by_source: HashMap<String, usize>,
    wildcards: Vec<usize>,
    next_seq: u64,
}

impl<T> Default for PatternRegistry<T> {
    fn default() -> Self {
        Self {
            buckets: Vec::new(),
            by_source: HashMap::new(),
            wildcards: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T: Clone> PatternRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `pattern`, after every earlier binding
    pub fn register(&mut self, pattern: &str, value: T) -> Result<(), MorphError> {
        let index = match self.by_source.get(pattern) {
            Some(&index) => index,
            None => {
                let compiled = Pattern::parse(pattern)?;
                let index = self.buckets.len();
                if !compiled.is_exact() {
                    self.wildcards.push(index);
                }
                self.buckets.push(Bucket {
                    pattern: compiled,
                    entries: Vec::new(),
                });
                self.by_source.insert(pattern.to_string(), index);
                index
            }
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.buckets[index].entries.push((seq, value));
        Ok(())
    }

    /// Values of every pattern matching `path`, in registration order
    pub fn lookup(&self, path: &str) -> Vec<T> {
        let exact = self
            .by_source
            .get(path)
            .map(|&index| &self.buckets[index])
            .filter(|bucket| bucket.pattern.is_exact());

        let mut matched: Vec<&(u64, T)> = Vec::new();
        for &index in &self.wildcards {
            let bucket = &self.buckets[index];
            if bucket.pattern.matches(path) {
                matched.extend(bucket.entries.iter());
            }
        }

        if matched.is_empty() {
            return exact
                .map(|bucket| bucket.entries.iter().map(|(_, v)| v.clone()).collect())
                .unwrap_or_default();
        }

        if let Some(bucket) = exact {
            matched.extend(bucket.entries.iter());
        }
        matched.sort_by_key(|(seq, _)| *seq);
        matched.into_iter().map(|(_, v)| v.clone()).collect()
    }

    /// Whether any pattern matches `path`
    pub fn has_match(&self, path: &str) -> bool {
        let exact = self
            .by_source
            .get(path)
            .is_some_and(|&index| self.buckets[index].pattern.is_exact());
        exact
            || self
                .wildcards
                .iter()
                .any(|&index| self.buckets[index].pattern.matches(path))
    }

    /// Registered patterns in first-registration order
    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.buckets.iter().map(|bucket| &bucket.pattern)
    }

    /// Number of distinct patterns
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
