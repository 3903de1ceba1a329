//! Maven-style version ordering.
//!
//! Versions are split into items at `.`, `-` and digit/letter transitions.
//! Integer items compare numerically, qualifiers compare by their position in
//! the well-known qualifier sequence, and trailing "null" items (`0`, `ga`,
//! `final`, `release`) are dropped, so `1`, `1.0` and `1.0.0.Final` are equal.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];

/// Position of the empty (release) qualifier in [`QUALIFIERS`].
const RELEASE_INDEX: usize = 5;

#[derive(Debug, Clone)]
enum Item {
    /// Decimal digits with leading zeros stripped; `"0"` for zero.
    Int(String),
    Str(String),
    List(Vec<Item>),
}

impl Item {
    fn int(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            Item::Int("0".to_owned())
        } else {
            Item::Int(trimmed.to_owned())
        }
    }

    fn qualifier(value: &str, followed_by_digit: bool) -> Self {
        let value = if followed_by_digit && value.len() == 1 {
            match value {
                "a" => "alpha",
                "b" => "beta",
                "m" => "milestone",
                other => other,
            }
        } else {
            value
        };
        let value = match value {
            "ga" | "final" | "release" => "",
            "cr" => "rc",
            other => other,
        };
        Item::Str(value.to_owned())
    }

    fn is_null(&self) -> bool {
        match self {
            Item::Int(v) => v == "0",
            Item::Str(v) => v.is_empty(),
            Item::List(items) => items.is_empty(),
        }
    }

    /// Compare against another item, where `None` stands for a missing
    /// trailing item on the other side.
    fn compare(&self, other: Option<&Item>) -> Ordering {
        match (self, other) {
            (Item::Int(v), None) => {
                if v == "0" {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            (Item::Int(a), Some(Item::Int(b))) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Item::Int(_), Some(Item::Str(_) | Item::List(_)))
            | (Item::List(_), Some(Item::Str(_))) => Ordering::Greater,

            (Item::Str(v), None) => comparable_qualifier(v).cmp(&RELEASE_INDEX.to_string()),
            (Item::Str(_), Some(Item::Int(_) | Item::List(_)))
            | (Item::List(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::Str(a), Some(Item::Str(b))) => {
                comparable_qualifier(a).cmp(&comparable_qualifier(b))
            }

            (Item::List(items), None) => items
                .iter()
                .map(|i| i.compare(None))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal),
            (Item::List(a), Some(Item::List(b))) => compare_lists(a, b),
        }
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Item::Int(v) | Item::Str(v) => out.push_str(v),
            Item::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(if matches!(item, Item::List(_)) { '-' } else { '.' });
                    }
                    item.write_canonical(out);
                }
            }
        }
    }
}

fn comparable_qualifier(q: &str) -> String {
    match QUALIFIERS.iter().position(|k| *k == q) {
        Some(idx) => idx.to_string(),
        None => format!("{}-{q}", QUALIFIERS.len()),
    }
}

fn compare_lists(a: &[Item], b: &[Item]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ord = match (a.get(i), b.get(i)) {
            (None, None) => Ordering::Equal,
            (None, Some(r)) => r.compare(None).reverse(),
            (Some(l), r) => l.compare(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn normalize(items: &mut Vec<Item>) {
    // Drop trailing null items; non-empty sub-lists are stepped over, so the
    // `0` in `1.0-snapshot` is trailing too.
    let mut idx = items.len();
    while idx > 0 {
        idx -= 1;
        if items[idx].is_null() {
            items.remove(idx);
        } else if !matches!(items[idx], Item::List(_)) {
            break;
        }
    }
}

fn parse_item(is_digit: bool, buf: &str) -> Item {
    if is_digit {
        Item::int(buf)
    } else {
        Item::qualifier(buf, false)
    }
}

fn parse_items(version: &str) -> Vec<Item> {
    let version = version.to_lowercase();
    // stack[0] is the root list; every deeper entry is the trailing sub-list
    // of the entry below it.
    let mut stack: Vec<Vec<Item>> = vec![Vec::new()];
    let mut is_digit = false;
    let mut start = 0usize;

    for (i, c) in version.char_indices() {
        let current = stack.len() - 1;
        match c {
            '.' => {
                if i == start {
                    stack[current].push(Item::int("0"));
                } else {
                    stack[current].push(parse_item(is_digit, &version[start..i]));
                }
                start = i + 1;
            }
            '-' => {
                if i == start {
                    stack[current].push(Item::int("0"));
                } else {
                    stack[current].push(parse_item(is_digit, &version[start..i]));
                }
                start = i + 1;
                stack.push(Vec::new());
            }
            c if c.is_ascii_digit() => {
                if !is_digit && i > start {
                    stack[current].push(Item::qualifier(&version[start..i], true));
                    start = i;
                    stack.push(Vec::new());
                }
                is_digit = true;
            }
            _ => {
                if is_digit && i > start {
                    stack[current].push(parse_item(true, &version[start..i]));
                    start = i;
                    stack.push(Vec::new());
                }
                is_digit = false;
            }
        }
    }
    if version.len() > start {
        let current = stack.len() - 1;
        stack[current].push(parse_item(is_digit, &version[start..]));
    }

    let mut done = Vec::new();
    while let Some(mut list) = stack.pop() {
        if !done.is_empty() {
            list.push(Item::List(std::mem::take(&mut done)));
        }
        normalize(&mut list);
        done = list;
    }
    done
}

/// A version string with Maven `ComparableVersion` ordering.
///
/// The original spelling is preserved for display and serialization;
/// equality, ordering and hashing use the normalized form.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MavenVersion {
    raw: String,
    items: Vec<Item>,
    canonical: String,
}

impl MavenVersion {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let items = parse_items(&raw);
        let mut canonical = String::new();
        Item::List(items.clone()).write_canonical(&mut canonical);
        Self {
            raw,
            items,
            canonical,
        }
    }

    /// The lowest meaningful version, used as the base of unbounded ranges.
    pub fn zero() -> Self {
        Self::new("0")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Normalized form, e.g. `1.0.0.Final` -> `1`.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Debug for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MavenVersion({})", self.raw)
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lists(&self.items, &other.items)
    }
}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MavenVersion {}

impl Hash for MavenVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl From<String> for MavenVersion {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for MavenVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<MavenVersion> for String {
    fn from(v: MavenVersion) -> Self {
        v.raw
    }
}

impl FromStr for MavenVersion {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// A set of versions expressed the way Maven version ranges are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// `[0,)`: every version.
    All,
    /// `[v,)`: `v` and everything above it.
    AtLeast(MavenVersion),
    /// `(v,)`: strictly above `v`.
    GreaterThan(MavenVersion),
    /// `[v]`: exactly `v`.
    Exact(MavenVersion),
}

impl VersionRange {
    pub fn contains(&self, version: &MavenVersion) -> bool {
        match self {
            VersionRange::All => true,
            VersionRange::AtLeast(base) => version >= base,
            VersionRange::GreaterThan(base) => version > base,
            VersionRange::Exact(base) => version == base,
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::All => write!(f, "[0,)"),
            VersionRange::AtLeast(v) => write!(f, "[{v},)"),
            VersionRange::GreaterThan(v) => write!(f, "({v},)"),
            VersionRange::Exact(v) => write!(f, "[{v}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> MavenVersion {
        MavenVersion::new(s)
    }

    fn assert_ascending(versions: &[&str]) {
        for pair in versions.windows(2) {
            assert!(
                v(pair[0]) < v(pair[1]),
                "expected {} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn numeric_segments_are_not_lexicographic() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("1.2.10") > v("1.2.9"));
        assert!(v("10.0") > v("9.99.99"));
    }

    #[test]
    fn qualifier_ordering() {
        assert_ascending(&[
            "1.0-alpha1",
            "1.0-beta1",
            "1.0-milestone1",
            "1.0-rc1",
            "1.0-SNAPSHOT",
            "1.0",
            "1.0-sp",
            "1.0.1",
            "1.1",
            "2",
        ]);
    }

    #[test]
    fn single_letter_aliases() {
        assert_eq!(v("1.0a1"), v("1.0-alpha-1"));
        assert_eq!(v("1.0b2"), v("1.0-beta-2"));
        assert_eq!(v("1.0m3"), v("1.0-milestone-3"));
        assert_eq!(v("1.0-cr1"), v("1.0-rc1"));
    }

    #[test]
    fn release_aliases_and_trailing_zeros_are_equal() {
        assert_eq!(v("1"), v("1.0"));
        assert_eq!(v("1"), v("1.0.0"));
        assert_eq!(v("1.0.0.Final"), v("1"));
        assert_eq!(v("1-ga"), v("1"));
        assert_eq!(v("1.release"), v("1"));
    }

    #[test]
    fn unknown_qualifiers_sort_after_known() {
        assert!(v("1.0-xyz") > v("1.0-sp"));
        assert!(v("1.0-abc") < v("1.0-xyz"));
        assert!(v("1.0-xyz") < v("1.0.1"));
    }

    #[test]
    fn large_numbers_do_not_overflow() {
        assert!(v("1.99999999999999999999999") > v("1.9999999999999999999999"));
        assert_eq!(v("1.0000000000000000000001"), v("1.1"));
    }

    #[test]
    fn equal_versions_hash_equally() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(v("2.0"));
        assert!(set.contains(&v("2.0.0.final")));
    }

    #[test]
    fn display_preserves_original_spelling() {
        assert_eq!(v("1.0.0.Final").to_string(), "1.0.0.Final");
        assert_eq!(v("1.0.0.Final").canonical(), "1");
        assert_eq!(v("1.0-SNAPSHOT").canonical(), "1-snapshot");
    }

    #[test]
    fn serde_uses_raw_string() {
        let json = serde_json::to_string(&v("26.1.0.Final")).unwrap();
        assert_eq!(json, "\"26.1.0.Final\"");
        let back: MavenVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "26.1.0.Final");
    }

    #[test]
    fn range_membership() {
        let base = v("1.2.3");
        assert!(VersionRange::All.contains(&v("0.0.1")));
        assert!(VersionRange::AtLeast(base.clone()).contains(&v("1.2.3")));
        assert!(!VersionRange::GreaterThan(base.clone()).contains(&v("1.2.3")));
        assert!(VersionRange::GreaterThan(base.clone()).contains(&v("1.2.4")));
        assert!(VersionRange::Exact(base).contains(&v("1.2.3.0")));
    }

    #[test]
    fn range_display_uses_maven_notation() {
        assert_eq!(VersionRange::All.to_string(), "[0,)");
        assert_eq!(VersionRange::AtLeast(v("1.0")).to_string(), "[1.0,)");
        assert_eq!(VersionRange::GreaterThan(v("1.0")).to_string(), "(1.0,)");
        assert_eq!(VersionRange::Exact(v("1.0")).to_string(), "[1.0]");
    }
}
