use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, HashWriter};

/// A 3D position, used by the swarm target and path records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    fn hash_into(&self, w: &mut HashWriter) {
        w.write(&self.x.to_le_bytes());
        w.write(&self.y.to_le_bytes());
        w.write(&self.z.to_le_bytes());
    }
}

/// The application content carried by a block.
///
/// A closed set of record kinds: file-naming records, swarm
/// target-assignment records and path-assignment records. The serializer
/// dispatches on the enum discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockContent {
    Naming {
        metahash: Vec<u8>,
        filename: String,
    },
    Mapping {
        pattern_id: String,
        targets: Vec<Vec3>,
    },
    Path {
        pattern_id: String,
        paths: Vec<Vec<Vec3>>,
    },
}

impl BlockContent {
    /// Content digest. Field order is fixed; the digest feeds the block
    /// hash and must be identical across nodes.
    pub fn hash(&self) -> Hash {
        let mut w = HashWriter::new();
        match self {
            BlockContent::Naming { metahash, filename } => {
                w.write(metahash);
                w.write(filename.as_bytes());
            }
            BlockContent::Mapping {
                pattern_id,
                targets,
            } => {
                w.write(pattern_id.as_bytes());
                for t in targets {
                    t.hash_into(&mut w);
                }
            }
            BlockContent::Path { pattern_id, paths } => {
                w.write(pattern_id.as_bytes());
                for path in paths {
                    for p in path {
                        p.hash_into(&mut w);
                    }
                }
            }
        }
        w.finish()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BlockContent::Naming { .. } => "naming",
            BlockContent::Mapping { .. } => "mapping",
            BlockContent::Path { .. } => "path",
        }
    }
}

/// One block of the hash-linked chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Height of the block, 0 for genesis. Not part of the hash.
    pub block_number: u64,
    /// Hash of the previous block, zeros for genesis.
    pub previous_hash: Hash,
    pub content: BlockContent,
}

impl Block {
    /// Create the genesis block (height 0, zero-filled previous hash).
    pub fn genesis(content: BlockContent) -> Self {
        Block {
            block_number: 0,
            previous_hash: Hash::ZERO,
            content,
        }
    }

    /// Create a successor block.
    pub fn next(block_number: u64, previous_hash: Hash, content: BlockContent) -> Self {
        Block {
            block_number,
            previous_hash,
            content,
        }
    }

    /// Block hash: H(previous_hash || content hash). The block number is
    /// not included.
    pub fn hash(&self) -> Hash {
        let mut w = HashWriter::new();
        w.write(self.previous_hash.as_bytes());
        w.write(self.content.hash().as_bytes());
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming_content() -> BlockContent {
        BlockContent::Naming {
            metahash: vec![0xaa; 32],
            filename: "test1.txt".into(),
        }
    }

    #[test]
    fn test_genesis_block() {
        let block = Block::genesis(naming_content());
        assert_eq!(block.block_number, 0);
        assert_eq!(block.previous_hash, Hash::ZERO);
    }

    #[test]
    fn test_block_hash_links_previous() {
        let genesis = Block::genesis(naming_content());
        let child = Block::next(1, genesis.hash(), naming_content());
        assert_eq!(child.previous_hash, genesis.hash());
        assert_ne!(child.hash(), genesis.hash());
    }

    #[test]
    fn test_block_number_excluded_from_hash() {
        let a = Block::next(1, Hash::ZERO, naming_content());
        let b = Block::next(7, Hash::ZERO, naming_content());
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_content_hash_differs_per_kind() {
        let naming = naming_content();
        let mapping = BlockContent::Mapping {
            pattern_id: "p1".into(),
            targets: vec![Vec3::new(1.0, 2.0, 3.0)],
        };
        assert_ne!(naming.hash(), mapping.hash());
    }

    #[test]
    fn test_mapping_hash_sensitive_to_targets() {
        let a = BlockContent::Mapping {
            pattern_id: "p1".into(),
            targets: vec![Vec3::new(1.0, 2.0, 3.0)],
        };
        let b = BlockContent::Mapping {
            pattern_id: "p1".into(),
            targets: vec![Vec3::new(1.0, 2.0, 4.0)],
        };
        assert_ne!(a.hash(), b.hash());
    }
}
