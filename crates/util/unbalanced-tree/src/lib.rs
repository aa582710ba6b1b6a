//! Unbalanced binary tree store.
//!
//! Holds one value per node of a binary merge tree over a fixed number of leaves. The tree has
//! `ceil(log2 n)` levels below the root; level `l` holds `ceil(n / 2^(levels - l))` slots.
//! When the last slot of a level with an odd number of slots has no sibling, its node is
//! promoted to the parent position, repeatedly, until it has a sibling. Every node therefore
//! lives at exactly one canonical location, and every non-root node has a sibling.
//!
//! Nodes are stored in a flat arena with one presence slot per location. Values are never
//! removed or overwritten once set.

use std::fmt;

use serde::{Deserialize, Serialize};

mod error;

pub use error::TreeError;

/// Location of a node in the tree. Level 0, index 0 is the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeNodeLocation {
    pub level: usize,
    pub index: usize,
}

impl TreeNodeLocation {
    pub const ROOT: TreeNodeLocation = TreeNodeLocation { level: 0, index: 0 };

    pub const fn new(level: usize, index: usize) -> Self {
        Self { level, index }
    }

    pub fn is_root(&self) -> bool {
        self.level == 0
    }
}

impl fmt::Display for TreeNodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.level, self.index)
    }
}

#[derive(Debug, Clone)]
pub struct UnbalancedTreeStore<T> {
    num_leaves: usize,
    num_levels: usize,
    /// Index into `nodes` of the first slot of each level.
    level_offsets: Vec<usize>,
    nodes: Vec<Option<T>>,
}

impl<T> UnbalancedTreeStore<T> {
    pub fn new(num_leaves: usize) -> Result<Self, TreeError> {
        if num_leaves == 0 {
            return Err(TreeError::NoLeaves);
        }

        let num_levels = ceil_log2(num_leaves);
        let mut level_offsets = Vec::with_capacity(num_levels + 1);
        let mut total = 0;
        for level in 0..=num_levels {
            level_offsets.push(total);
            total += level_size(num_leaves, num_levels, level);
        }

        let mut nodes = Vec::with_capacity(total);
        nodes.resize_with(total, || None);

        Ok(Self {
            num_leaves,
            num_levels,
            level_offsets,
            nodes,
        })
    }

    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Number of levels below the root. A single-leaf tree has none: its leaf is the root.
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Stores a leaf value and returns the location it landed at.
    pub fn set_leaf(&mut self, leaf_index: usize, value: T) -> Result<TreeNodeLocation, TreeError> {
        let location = self.leaf_location(leaf_index)?;
        self.set_node(location, value)?;
        Ok(location)
    }

    /// Stores a value at an internal location.
    pub fn set_node(&mut self, location: TreeNodeLocation, value: T) -> Result<(), TreeError> {
        let slot = self
            .slot(location)
            .ok_or(TreeError::InvalidLocation(location))?;
        let entry = &mut self.nodes[slot];
        if entry.is_some() {
            return Err(TreeError::NodeAlreadySet(location));
        }
        *entry = Some(value);
        Ok(())
    }

    pub fn get_node(&self, location: TreeNodeLocation) -> Option<&T> {
        self.slot(location).and_then(|slot| self.nodes[slot].as_ref())
    }

    pub fn get_leaf(&self, leaf_index: usize) -> Option<&T> {
        self.leaf_location(leaf_index)
            .ok()
            .and_then(|location| self.get_node(location))
    }

    /// Canonical location of a leaf.
    pub fn leaf_location(&self, leaf_index: usize) -> Result<TreeNodeLocation, TreeError> {
        if leaf_index >= self.num_leaves {
            return Err(TreeError::LeafOutOfRange {
                index: leaf_index,
                num_leaves: self.num_leaves,
            });
        }
        Ok(self.promote(TreeNodeLocation::new(self.num_levels, leaf_index)))
    }

    pub fn get_parent_location(
        &self,
        location: TreeNodeLocation,
    ) -> Result<TreeNodeLocation, TreeError> {
        if location.is_root() {
            return Err(TreeError::RootHasNoParent);
        }
        self.check_location(location)?;
        Ok(self.promote(TreeNodeLocation::new(
            location.level - 1,
            location.index / 2,
        )))
    }

    pub fn get_sibling_location(
        &self,
        location: TreeNodeLocation,
    ) -> Result<TreeNodeLocation, TreeError> {
        if location.is_root() {
            return Err(TreeError::RootHasNoSibling);
        }
        self.check_location(location)?;
        Ok(TreeNodeLocation::new(location.level, location.index ^ 1))
    }

    /// Locations of both children of a node, or `None` if the node is a leaf.
    pub fn get_child_locations(&self, location: TreeNodeLocation) -> Option<[TreeNodeLocation; 2]> {
        self.slot(location)?;

        // Walk down through positions this node was promoted from.
        let mut current = location;
        loop {
            let level = current.level + 1;
            if level > self.num_levels {
                return None;
            }
            let left = TreeNodeLocation::new(level, current.index * 2);
            if self.is_promoted(left) {
                current = left;
                continue;
            }
            return Some([left, TreeNodeLocation::new(level, left.index + 1)]);
        }
    }

    pub fn get_children(&self, location: TreeNodeLocation) -> (Option<&T>, Option<&T>) {
        match self.get_child_locations(location) {
            Some([left, right]) => (self.get_node(left), self.get_node(right)),
            None => (None, None),
        }
    }

    pub fn get_sibling(&self, location: TreeNodeLocation) -> Option<&T> {
        self.get_sibling_location(location)
            .ok()
            .and_then(|sibling| self.get_node(sibling))
    }

    pub fn get_parent(&self, location: TreeNodeLocation) -> Option<&T> {
        self.get_parent_location(location)
            .ok()
            .and_then(|parent| self.get_node(parent))
    }

    fn level_size(&self, level: usize) -> usize {
        level_size(self.num_leaves, self.num_levels, level)
    }

    /// Whether the position is the sibling-less last slot of an odd-sized level.
    fn is_promoted(&self, location: TreeNodeLocation) -> bool {
        let size = self.level_size(location.level);
        location.level > 0 && size % 2 == 1 && location.index + 1 == size
    }

    fn promote(&self, mut location: TreeNodeLocation) -> TreeNodeLocation {
        while self.is_promoted(location) {
            location = TreeNodeLocation::new(location.level - 1, location.index / 2);
        }
        location
    }

    fn check_location(&self, location: TreeNodeLocation) -> Result<(), TreeError> {
        self.slot(location)
            .map(|_| ())
            .ok_or(TreeError::InvalidLocation(location))
    }

    /// Arena slot of a canonical location.
    fn slot(&self, location: TreeNodeLocation) -> Option<usize> {
        if location.level > self.num_levels
            || location.index >= self.level_size(location.level)
            || self.is_promoted(location)
        {
            return None;
        }
        Some(self.level_offsets[location.level] + location.index)
    }
}

fn ceil_log2(x: usize) -> usize {
    if x <= 1 {
        0
    } else {
        (usize::BITS - (x - 1).leading_zeros()) as usize
    }
}

fn level_size(num_leaves: usize, num_levels: usize, level: usize) -> usize {
    let shift = num_levels - level;
    (num_leaves + (1 << shift) - 1) >> shift
}
