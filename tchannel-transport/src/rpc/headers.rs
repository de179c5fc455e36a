//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use serde::{Deserialize, Serialize};

/// How header keys are spelled when written to the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderCase {
    /// Keys are lowercased.
    #[default]
    Canonical,
    /// Keys keep the spelling the application used.
    Original,
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    original: String,
    value: String,
}

/// Application headers with case-insensitive keys.
///
/// Lookups ignore ASCII case, but the spelling a key was first set with is
/// remembered so it can be written back with [`HeaderCase::Original`].
/// Iteration follows insertion order.
///
/// # Examples
///
/// ```rust
/// use tchannel_transport::rpc::Headers;
///
/// let headers = Headers::new().with("Trace-Id", "abc");
/// assert_eq!(headers.get("trace-id"), Some("abc"));
/// assert_eq!(headers.original_iter().next(), Some(("Trace-Id", "abc")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<Entry>,
}

fn canonical(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl Headers {
    /// Creates an empty header set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty header set with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns the header set with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets `key` to `value`, replacing any existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let original = key.into();
        let key = canonical(&original);
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.original = original;
                entry.value = value;
            }
            None => self.entries.push(Entry {
                key,
                original,
                value,
            }),
        }
    }

    /// Returns the value for `key`, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.value.as_str())
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.key.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(index).value)
    }

    /// Keeps only the entries for which `keep(canonical_key, value)` is true.
    ///
    /// Returns the number of entries removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| keep(&entry.key, &entry.value));
        before - self.entries.len()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(canonical_key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
    }

    /// Iterates `(original_key, value)` pairs in insertion order.
    pub fn original_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.original.as_str(), entry.value.as_str()))
    }

    /// Iterates pairs with keys spelled according to `case`.
    pub fn iter_cased(&self, case: HeaderCase) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(move |entry| {
            let key = match case {
                HeaderCase::Canonical => entry.key.as_str(),
                HeaderCase::Original => entry.original.as_str(),
            };
            (key, entry.value.as_str())
        })
    }
}

/// Two header sets are equal when they map the same canonical keys to the
/// same values, regardless of order or original spelling.
impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl Eq for Headers {}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K, V> Extend<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}
