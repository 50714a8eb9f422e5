use core::fmt;

use indexmap::IndexMap;

use crate::disclosure::DisclosureBuf;

/// A single step of a [`ClaimPath`]: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClaimPathStep {
    /// Object key.
    Key(String),

    /// Array index, relative to the processed (fully substituted) array.
    Index(usize),
}

/// Path identifying a node in a processed claim tree.
///
/// Paths render in the RFC 6901 style (`/address/country`, `/nationalities/0`)
/// with `~` and `/` escaped inside keys, but compare step-wise, so an escaped
/// key never collides with a nested path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClaimPath(Vec<ClaimPathStep>);

impl ClaimPath {
    /// The empty path, identifying the payload root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns this path extended with an object-key step.
    pub fn key(&self, name: impl Into<String>) -> Self {
        let mut steps = self.0.clone();
        steps.push(ClaimPathStep::Key(name.into()));
        Self(steps)
    }

    /// Returns this path extended with an array-index step.
    pub fn index(&self, i: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(ClaimPathStep::Index(i));
        Self(steps)
    }

    /// Returns the path of the enclosing container, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        match self.0.split_last() {
            Some((_, init)) => Some(Self(init.to_vec())),
            None => None,
        }
    }

    pub fn steps(&self) -> &[ClaimPathStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClaimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            f.write_str("/")?;
            match step {
                ClaimPathStep::Key(key) => {
                    for c in key.chars() {
                        match c {
                            '~' => f.write_str("~0")?,
                            '/' => f.write_str("~1")?,
                            c => write!(f, "{c}")?,
                        }
                    }
                }
                ClaimPathStep::Index(i) => write!(f, "{i}")?,
            }
        }

        Ok(())
    }
}

impl FromIterator<ClaimPathStep> for ClaimPath {
    fn from_iter<T: IntoIterator<Item = ClaimPathStep>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-path record of the disclosures consumed while recreating a claim set.
///
/// For a node reached by path `p`, the entry contains every disclosure
/// consumed on the walk from the root to `p`, in consumption order. A node is
/// selectively disclosed iff its entry is strictly longer than its parent's.
#[derive(Debug, Clone, Default)]
pub struct DisclosureLedger {
    entries: IndexMap<ClaimPath, Vec<DisclosureBuf>>,
}

impl DisclosureLedger {
    pub(crate) fn record(&mut self, path: ClaimPath, trail: Vec<DisclosureBuf>) {
        self.entries.insert(path, trail);
    }

    /// The disclosures consumed on the walk from the root to `path`.
    ///
    /// Paths the recreation pass never visited have no disclosures.
    pub fn disclosures_at(&self, path: &ClaimPath) -> &[DisclosureBuf] {
        self.entries.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the node at `path` was itself selectively disclosed, rather
    /// than merely contained in a disclosed ancestor.
    pub fn is_selectively_disclosed(&self, path: &ClaimPath) -> bool {
        let own = self.disclosures_at(path).len();
        match path.parent() {
            Some(parent) => own > self.disclosures_at(&parent).len(),
            None => own > 0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClaimPath, &[DisclosureBuf])> {
        self.entries
            .iter()
            .map(|(path, trail)| (path, trail.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
