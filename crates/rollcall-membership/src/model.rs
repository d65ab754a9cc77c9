use std::fmt::{Display, Formatter};

use serde::Serialize;

/// A node's position in the cluster at the time of the read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    /// Ordinal assigned to the node, always below `total`
    pub ordinal: u64,
    /// Number of live nodes
    pub total: u64,
}

impl NodeInfo {
    /// Whether this node owns `partition` under modulo sharding
    pub fn owns_partition(&self, partition: u64) -> bool {
        partition % self.total == self.ordinal
    }

    /// The partitions in `0..partition_count` owned by this node
    pub fn partitions(&self, partition_count: u64) -> impl Iterator<Item = u64> + use<> {
        (self.ordinal..partition_count).step_by(self.total as usize)
    }
}

impl Display for NodeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ordinal, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_ownership() {
        let info = NodeInfo {
            ordinal: 1,
            total: 3,
        };
        assert!(info.owns_partition(1));
        assert!(info.owns_partition(7));
        assert!(!info.owns_partition(0));
        assert_eq!(info.partitions(10).collect::<Vec<_>>(), vec![1, 4, 7]);
        assert_eq!(info.to_string(), "1/3");
    }

    #[test]
    fn test_partitions_cover_every_partition_once() {
        let total = 4;
        let mut seen: Vec<u64> = (0..total)
            .flat_map(|ordinal| NodeInfo { ordinal, total }.partitions(17))
            .collect();
        seen.sort();
        assert_eq!(seen, (0..17).collect::<Vec<_>>());
    }
}
