//! Business-domain paths.
//!
//! Tables are tagged with a hierarchical domain such as `Finance-Billing-Invoices`.
//! Internally a path is an ordered list of segments; it is only turned back into a
//! string to produce bucket keys, so segment names containing the delimiter never
//! alias a different prefix.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Characters accepted as segment delimiters in wire-format paths.
const DELIMITERS: [char; 2] = ['-', '/'];

/// Separator used when serializing a path into a bucket key.
const KEY_SEPARATOR: char = '-';

/// An ordered, non-empty hierarchy of domain segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainPath {
    segments: Vec<String>,
}

impl DomainPath {
    /// Build a path from explicit segments.
    ///
    /// Segments are trimmed and empty ones discarded. Returns `None` when nothing
    /// is left, which callers treat as "no domain".
    pub fn from_segments<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments: Vec<String> = segments
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// Parse a wire-format path (`"Finance-Billing"` or `"Finance/Billing"`).
    pub fn parse(raw: &str) -> Option<Self> {
        Self::from_segments(raw.split(DELIMITERS))
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, used as a display label.
    pub fn leaf(&self) -> &str {
        // Non-empty by construction
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The prefix of the given length, or `None` if `len` is zero or too long.
    pub fn prefix(&self, len: usize) -> Option<DomainPath> {
        if len == 0 || len > self.segments.len() {
            return None;
        }
        Some(Self {
            segments: self.segments[..len].to_vec(),
        })
    }

    /// All cumulative prefixes, shortest first (`A`, `A-B`, `A-B-C`).
    pub fn prefixes(&self) -> impl DoubleEndedIterator<Item = DomainPath> + '_ {
        (1..=self.segments.len()).filter_map(move |len| self.prefix(len))
    }

    /// The immediate parent prefix, or `None` for a single-segment path.
    pub fn parent(&self) -> Option<DomainPath> {
        self.prefix(self.segments.len().saturating_sub(1))
    }

    /// True if `self` is `other` or one of its prefixes.
    pub fn is_prefix_of(&self, other: &DomainPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// True if `self` is a prefix of `other` and strictly shorter.
    pub fn is_strict_prefix_of(&self, other: &DomainPath) -> bool {
        self.segments.len() < other.segments.len() && self.is_prefix_of(other)
    }

    /// Serialize to the bucket key form.
    ///
    /// Backslashes and separators inside segments are escaped, so two different
    /// segment lists never produce the same key.
    pub fn key(&self) -> String {
        let mut key = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            for c in segment.chars() {
                if c == '\\' || c == KEY_SEPARATOR {
                    key.push('\\');
                }
                key.push(c);
            }
        }
        key
    }

    /// Parse a bucket key produced by [`DomainPath::key`].
    ///
    /// Unlike [`DomainPath::parse`], only the key separator splits segments and
    /// escapes are honoured.
    pub fn from_key(key: &str) -> Option<Self> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = key.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                }
                KEY_SEPARATOR => segments.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        segments.push(current);
        Self::from_segments(segments)
    }
}

impl fmt::Display for DomainPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl Serialize for DomainPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.key())
    }
}

/// Accepts either a delimited string or an explicit array of segments.
impl<'de> Deserialize<'de> for DomainPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Segments(Vec<String>),
        }

        let parsed = match Repr::deserialize(deserializer)? {
            Repr::Text(s) => DomainPath::parse(&s),
            Repr::Segments(segments) => DomainPath::from_segments(segments),
        };
        parsed.ok_or_else(|| serde::de::Error::custom("domain path has no segments"))
    }
}
