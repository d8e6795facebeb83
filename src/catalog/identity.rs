use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Name shared by every version of a technique (e.g., `apacheServer`).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechniqueName(pub String);

/// Version of a technique.
///
/// Versions order segment by segment on `.`, `-` and `~`. All-digit segments
/// compare numerically (`1.10 > 1.9`) and sort before any other segment;
/// other segments compare lexically. Versions whose segments all compare
/// equal fall back to plain string order so the ordering agrees with
/// equality.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechniqueVersion(pub String);

/// Identity of one technique: name plus version.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TechniqueId {
    pub name: TechniqueName,
    pub version: TechniqueVersion,
}

/// Key of a sub-category, its slash-separated path below the root
/// (e.g., `applications/web`).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubCategoryId(pub String);

/// Either the library root or one of its sub-categories.
///
/// Serialized as `/` for the root and the sub-category path otherwise.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TechniqueCategoryId {
    Root,
    Sub(SubCategoryId),
}

/// A template file shipped with one technique, addressed by its path relative
/// to the technique's version directory.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TemplateId {
    pub technique: TechniqueId,
    pub path: String,
}

impl TechniqueName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TechniqueVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(['.', '-', '~'])
    }
}

impl Ord for TechniqueVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments();
        let mut right = other.segments();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return self.0.cmp(&other.0),
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let ordering = match (numeric_segment(a), numeric_segment(b)) {
                        (Some(x), Some(y)) => x.cmp(&y),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => a.cmp(b),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
            }
        }
    }
}

fn numeric_segment(segment: &str) -> Option<u128> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Longer digit runs saturate; the string tie-break still orders them.
    Some(segment.parse().unwrap_or(u128::MAX))
}

impl PartialOrd for TechniqueVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TechniqueId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: TechniqueName(name.into()),
            version: TechniqueVersion(version.into()),
        }
    }
}

impl fmt::Display for TechniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name.0, self.version.0)
    }
}

impl fmt::Display for SubCategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TechniqueCategoryId {
    pub fn as_str(&self) -> &str {
        match self {
            TechniqueCategoryId::Root => "/",
            TechniqueCategoryId::Sub(id) => id.0.as_str(),
        }
    }

    fn from_str(value: &str) -> Self {
        match value.trim_matches('/') {
            "" => TechniqueCategoryId::Root,
            path => TechniqueCategoryId::Sub(SubCategoryId(path.to_string())),
        }
    }
}

impl fmt::Display for TechniqueCategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TechniqueCategoryId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TechniqueCategoryId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_str(&value))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.technique, self.path)
    }
}
