//! Labels that classify suites by the cluster flavors they apply to.

use std::{fmt, str::FromStr};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Informing,
    Blocking,
    Osd,
    Rosa,
    HyperShift,
    Sts,
    PrivateLink,
}

/// Selects suites by label.
///
/// A filter is a comma-separated list of labels; a suite is selected when it
/// carries any of them. A label prefixed with `!` excludes every suite that
/// carries it, regardless of the other terms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelFilter {
    include: Vec<Label>,
    exclude: Vec<Label>,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown label {0:?}")]
pub struct UnknownLabel(String);

// === impl Label ===

impl Label {
    pub const ALL: [Label; 7] = [
        Label::Informing,
        Label::Blocking,
        Label::Osd,
        Label::Rosa,
        Label::HyperShift,
        Label::Sts,
        Label::PrivateLink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informing => "Informing",
            Self::Blocking => "Blocking",
            Self::Osd => "OSD",
            Self::Rosa => "ROSA",
            Self::HyperShift => "HyperShift",
            Self::Sts => "STS",
            Self::PrivateLink => "PrivateLink",
        }
    }
}

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl LabelFilter ===

impl LabelFilter {
    pub fn matches(&self, labels: &[Label]) -> bool {
        if labels.iter().any(|l| self.exclude.contains(l)) {
            return false;
        }
        self.include.is_empty() || labels.iter().any(|l| self.include.contains(l))
    }
}

impl FromStr for LabelFilter {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut filter = Self::default();
        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match term.strip_prefix('!') {
                Some(label) => filter.exclude.push(label.trim().parse()?),
                None => filter.include.push(term.parse()?),
            }
        }
        Ok(filter)
    }
}
