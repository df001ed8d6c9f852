//! Shard assignment of addresses

use simchain_core::Address;
use std::fmt;

/// Maps addresses to shards
pub trait ShardCoordinator: Send + Sync + fmt::Debug {
    /// Shard an address belongs to
    fn compute_shard(&self, address: &Address) -> u32;

    /// Shard this world simulates
    fn self_shard(&self) -> u32;

    /// Whether an address lives in this world
    fn is_local(&self, address: &Address) -> bool {
        self.compute_shard(address) == self.self_shard()
    }
}

/// Everything lives in shard 0
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleShard;

impl ShardCoordinator for SingleShard {
    fn compute_shard(&self, _address: &Address) -> u32 {
        0
    }

    fn self_shard(&self) -> u32 {
        0
    }
}

/// Assigns shards by the last address byte modulo the shard count
#[derive(Debug, Clone, Copy)]
pub struct ModuloShard {
    num_shards: u32,
    self_shard: u32,
}

impl ModuloShard {
    /// A zero shard count is treated as one shard
    pub fn new(num_shards: u32, self_shard: u32) -> Self {
        Self {
            num_shards: num_shards.max(1),
            self_shard,
        }
    }
}

impl ShardCoordinator for ModuloShard {
    fn compute_shard(&self, address: &Address) -> u32 {
        let last = address.as_bytes().last().copied().unwrap_or(0);
        u32::from(last) % self.num_shards
    }

    fn self_shard(&self) -> u32 {
        self.self_shard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_shard() {
        assert!(SingleShard.is_local(&Address::new(vec![7])));
        assert!(SingleShard.is_local(&Address::default()));
    }

    #[test]
    fn test_modulo_shard() {
        let shards = ModuloShard::new(3, 1);
        assert_eq!(shards.compute_shard(&Address::new(vec![0xaa, 4])), 1);
        assert!(shards.is_local(&Address::new(vec![4])));
        assert!(!shards.is_local(&Address::new(vec![5])));
        assert_eq!(shards.compute_shard(&Address::default()), 0);

        let degenerate = ModuloShard::new(0, 0);
        assert!(degenerate.is_local(&Address::new(vec![9])));
    }
}
