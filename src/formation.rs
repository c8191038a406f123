use std::collections::btree_map::{self, BTreeMap};
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::dyno::DynoType;

/// Quantity of dynos per size
///
/// A quantity of zero is the same as the size being absent, entries with zero
/// dynos are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<DynoType, u32>")]
pub struct Formation(BTreeMap<DynoType, u32>);

impl Formation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A formation with a single dyno size
    pub fn single(size: DynoType, quantity: u32) -> Self {
        Formation::new().with(size, quantity)
    }

    pub fn with(mut self, size: DynoType, quantity: u32) -> Self {
        self.set(size, quantity);
        self
    }

    pub fn set(&mut self, size: DynoType, quantity: u32) {
        if quantity == 0 {
            self.0.remove(&size);
        } else {
            self.0.insert(size, quantity);
        }
    }

    pub fn get(&self, size: DynoType) -> u32 {
        self.0.get(&size).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|q| u64::from(*q)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DynoType, u32)> + '_ {
        self.0.iter().map(|(size, quantity)| (*size, *quantity))
    }

    /// Compute the operations that take `self` to `desired`
    ///
    /// Removals come first, in size order, followed by every size whose
    /// desired quantity differs from the current one. Sizes that already have
    /// the desired quantity produce no operation.
    pub fn diff(&self, desired: &Formation) -> Vec<ScaleOp> {
        let removals = self
            .iter()
            .filter(|(size, _)| desired.get(*size) == 0)
            .map(|(size, from)| ScaleOp {
                size,
                from,
                quantity: 0,
            });

        let changes = desired
            .iter()
            .filter(|(size, quantity)| self.get(*size) != *quantity)
            .map(|(size, quantity)| ScaleOp {
                size,
                from: self.get(size),
                quantity,
            });

        removals.chain(changes).collect()
    }

    /// Apply a list of operations
    pub fn apply(&mut self, ops: &[ScaleOp]) {
        for op in ops {
            self.set(op.size, op.quantity);
        }
    }
}

impl From<BTreeMap<DynoType, u32>> for Formation {
    fn from(map: BTreeMap<DynoType, u32>) -> Self {
        map.into_iter().collect()
    }
}

impl FromIterator<(DynoType, u32)> for Formation {
    fn from_iter<I: IntoIterator<Item = (DynoType, u32)>>(iter: I) -> Self {
        let mut formation = Formation::new();
        for (size, quantity) in iter {
            formation.set(size, quantity);
        }
        formation
    }
}

impl IntoIterator for Formation {
    type Item = (DynoType, u32);
    type IntoIter = btree_map::IntoIter<DynoType, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for Formation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (size, quantity)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{size}: {quantity}")?;
        }
        write!(f, "}}")
    }
}

/// How a scale operation changes the running capacity
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScaleKind {
    /// From zero to some dynos
    Start,
    /// From some dynos to zero
    Stop,
    /// From some dynos to a different number of dynos
    Rescale,
}

impl ScaleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleKind::Start => "started",
            ScaleKind::Stop => "stopped",
            ScaleKind::Rescale => "rescaled",
        }
    }
}

/// Set the quantity of one dyno size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleOp {
    pub size: DynoType,
    /// quantity observed before the operation
    pub from: u32,
    pub quantity: u32,
}

impl ScaleOp {
    pub fn kind(&self) -> ScaleKind {
        match (self.from, self.quantity) {
            (0, _) => ScaleKind::Start,
            (_, 0) => ScaleKind::Stop,
            _ => ScaleKind::Rescale,
        }
    }
}

impl Display for ScaleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.size, self.from, self.quantity)
    }
}
