/// Supplies the current set of peer nodes. Per the spec's scope, the core
/// reads only the cluster's size (to compute quorum) — it never dials,
/// enumerates, or addresses peers itself; that is the transport's job.
pub trait ClusterMembership: Send + Sync {
    /// Total number of nodes in the cluster, including this one.
    fn size(&self) -> usize;
}

/// A fixed cluster size, useful for tests and for deployments where
/// membership is configured once at startup rather than discovered.
#[derive(Debug, Clone, Copy)]
pub struct StaticMembership(pub usize);

impl ClusterMembership for StaticMembership {
    fn size(&self) -> usize {
        self.0
    }
}
