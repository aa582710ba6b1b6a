//! Lookup of verification keys in the tree of allowed circuit keys.

use rollup_primitives::{
    block::SiblingPath,
    buf::Buf32,
    hash,
    proof::VerificationKey,
    rollup::VkData,
};

use crate::errors::VkTreeError;

/// Read-only index over the tree of verification keys a rollup circuit accepts.
pub trait VkTreeIndex: Send + Sync {
    fn vk_leaf_index(&self, vk: &VerificationKey) -> Result<u64, VkTreeError>;

    fn vk_sibling_path(&self, leaf_index: u64) -> Result<SiblingPath, VkTreeError>;

    fn vk_tree_root(&self) -> Buf32;

    /// Builds the membership witness for `vk`.
    fn vk_data(&self, vk: &VerificationKey) -> Result<VkData, VkTreeError> {
        let leaf_index = self.vk_leaf_index(vk)?;
        let sibling_path = self.vk_sibling_path(leaf_index)?;
        Ok(VkData::new(vk.clone(), leaf_index, sibling_path))
    }
}

/// SHA-256 merkle tree over a fixed list of verification-key hashes, padded with zero leaves
/// to a power of two.
#[derive(Debug, Clone)]
pub struct StaticVkTree {
    /// `layers[0]` are the leaves, the last layer holds only the root.
    layers: Vec<Vec<Buf32>>,
}

impl StaticVkTree {
    pub fn new(vks: &[VerificationKey]) -> Self {
        let mut leaves: Vec<Buf32> = vks.iter().map(VerificationKey::hash).collect();
        let width = leaves.len().max(1).next_power_of_two();
        leaves.resize(width, Buf32::zero());

        let mut layers = vec![leaves];
        while let Some(layer) = layers.last().filter(|l| l.len() > 1) {
            let next = layer
                .chunks(2)
                .map(|pair| hash::hash_pair(&pair[0], &pair[1]))
                .collect();
            layers.push(next);
        }

        Self { layers }
    }

    pub fn num_leaves(&self) -> usize {
        self.layers[0].len()
    }

    pub fn height(&self) -> usize {
        self.layers.len() - 1
    }
}

impl VkTreeIndex for StaticVkTree {
    fn vk_leaf_index(&self, vk: &VerificationKey) -> Result<u64, VkTreeError> {
        let vk_hash = vk.hash();
        self.layers[0]
            .iter()
            .position(|leaf| *leaf == vk_hash)
            .map(|i| i as u64)
            .ok_or(VkTreeError::UnknownVerificationKey(vk_hash))
    }

    fn vk_sibling_path(&self, leaf_index: u64) -> Result<SiblingPath, VkTreeError> {
        let num_leaves = self.num_leaves();
        let mut index = usize::try_from(leaf_index)
            .ok()
            .filter(|i| *i < num_leaves)
            .ok_or(VkTreeError::LeafIndexOutOfRange {
                index: leaf_index,
                num_leaves,
            })?;

        let mut path = Vec::with_capacity(self.height());
        for layer in &self.layers[..self.height()] {
            path.push(layer[index ^ 1]);
            index /= 2;
        }
        Ok(path)
    }

    fn vk_tree_root(&self) -> Buf32 {
        self.layers[self.height()][0]
    }
}
