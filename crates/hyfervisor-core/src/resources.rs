//! CPU and memory sizing for the guest.

use crate::error::{CoreError, Result};

/// Framework bounds on CPU count and memory size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Minimum CPU count.
    pub min_cpus: u64,
    /// Maximum CPU count.
    pub max_cpus: u64,
    /// Minimum memory in bytes.
    pub min_memory: u64,
    /// Maximum memory in bytes.
    pub max_memory: u64,
}

impl Limits {
    /// Reads the limits from Virtualization.framework.
    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    pub fn from_framework() -> Self {
        Self {
            min_cpus: hyfervisor_vz::min_cpu_count(),
            max_cpus: hyfervisor_vz::max_cpu_count(),
            min_memory: hyfervisor_vz::min_memory_size(),
            max_memory: hyfervisor_vz::max_memory_size(),
        }
    }
}

/// Number of logical CPUs on the host.
pub fn host_cpu_count() -> u64 {
    std::thread::available_parallelism().map_or(1, |n| n.get() as u64)
}

/// CPU count for the guest.
///
/// Without a request, leaves one host CPU free. The result is always within
/// the framework bounds.
pub fn compute_cpu_count(requested: Option<u32>, host_cpus: u64, limits: &Limits) -> u64 {
    let wanted = requested.map_or_else(|| host_cpus.saturating_sub(1), u64::from);
    clamp(wanted, limits.min_cpus, limits.max_cpus)
}

/// Memory size in bytes for the guest, clamped to the framework bounds.
pub fn compute_memory_size(requested_bytes: u64, limits: &Limits) -> u64 {
    clamp(requested_bytes, limits.min_memory, limits.max_memory)
}

/// Checks a sized guest against a restore image's minimum requirements.
pub fn check_requirements(
    cpu_count: u64,
    memory_size: u64,
    min_cpu_count: u64,
    min_memory_size: u64,
) -> Result<()> {
    if cpu_count < min_cpu_count {
        return Err(CoreError::Unsupported(format!(
            "restore image needs at least {min_cpu_count} CPUs, configured {cpu_count}"
        )));
    }
    if memory_size < min_memory_size {
        return Err(CoreError::Unsupported(format!(
            "restore image needs at least {min_memory_size} bytes of memory, configured {memory_size}"
        )));
    }
    Ok(())
}

/// `max` wins when the bounds are inverted, e.g. when the framework is absent.
fn clamp(value: u64, min: u64, max: u64) -> u64 {
    value.max(min).min(max.max(min))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GIB;

    const LIMITS: Limits = Limits {
        min_cpus: 1,
        max_cpus: 10,
        min_memory: 2 * GIB,
        max_memory: 64 * GIB,
    };

    #[test]
    fn test_cpu_count_leaves_one_free() {
        assert_eq!(compute_cpu_count(None, 8, &LIMITS), 7);
    }

    #[test]
    fn test_cpu_count_clamped() {
        assert_eq!(compute_cpu_count(None, 1, &LIMITS), 1);
        assert_eq!(compute_cpu_count(None, 24, &LIMITS), 10);
        assert_eq!(compute_cpu_count(Some(0), 8, &LIMITS), 1);
        assert_eq!(compute_cpu_count(Some(64), 8, &LIMITS), 10);
        assert_eq!(compute_cpu_count(Some(4), 8, &LIMITS), 4);
    }

    #[test]
    fn test_memory_clamped() {
        assert_eq!(compute_memory_size(4 * GIB, &LIMITS), 4 * GIB);
        assert_eq!(compute_memory_size(GIB, &LIMITS), 2 * GIB);
        assert_eq!(compute_memory_size(128 * GIB, &LIMITS), 64 * GIB);
    }

    #[test]
    fn test_requirements() {
        check_requirements(4, 8 * GIB, 2, 4 * GIB).unwrap();
        check_requirements(2, 4 * GIB, 2, 4 * GIB).unwrap();
        assert!(matches!(
            check_requirements(1, 8 * GIB, 2, 4 * GIB),
            Err(CoreError::Unsupported(_))
        ));
        assert!(matches!(
            check_requirements(4, 2 * GIB, 2, 4 * GIB),
            Err(CoreError::Unsupported(_))
        ));
    }

    #[test]
    fn test_host_cpu_count() {
        assert!(host_cpu_count() >= 1);
    }
}
