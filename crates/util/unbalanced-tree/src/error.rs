use thiserror::Error;

use crate::TreeNodeLocation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree must have at least one leaf")]
    NoLeaves,

    #[error("leaf index {index} out of range for a tree of {num_leaves} leaves")]
    LeafOutOfRange { index: usize, num_leaves: usize },

    #[error("location {0} is not a node of this tree")]
    InvalidLocation(TreeNodeLocation),

    #[error("node at {0} is already set")]
    NodeAlreadySet(TreeNodeLocation),

    #[error("tree root does not have a parent")]
    RootHasNoParent,

    #[error("tree root does not have a sibling")]
    RootHasNoSibling,
}
