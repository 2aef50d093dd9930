//! NUMA-aware thread binding.
//!
//! Pinning search workers to NUMA nodes is a platform-specific allocator
//! concern, not a search-correctness one — it's modeled as a pluggable trait
//! so the pool's call site never changes when a real binding is added for a
//! given OS/topology.

/// Binds the calling thread to a NUMA node before it starts searching.
pub trait NumaBinding: Send + Sync {
    /// Bind the current thread to `node`. `node` is the pool's worker index
    /// modulo the number of NUMA nodes the binding knows about.
    fn bind_current_thread(&self, node: usize);
}

/// Default binding: does nothing. Every worker runs wherever the OS
/// scheduler puts it.
#[derive(Debug, Default)]
pub struct NoBinding;

impl NumaBinding for NoBinding {
    fn bind_current_thread(&self, _node: usize) {}
}
