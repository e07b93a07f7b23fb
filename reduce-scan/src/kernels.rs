//! Device kernel text and the host-side description of how it is dispatched.

use bytemuck::{Pod, Zeroable};

/// WGSL module holding every entry point. Compiled once per [`crate::DeviceContext`].
pub const KERNEL_SOURCE: &str = include_str!("kernels.wgsl");

/// Work-group size of the per-group passes; must match `GROUP_SIZE` in the WGSL.
pub const GROUP_SIZE: usize = 128;

pub const BINDING_VALUES: u32 = 0;
pub const BINDING_PARTIALS: u32 = 1;
pub const BINDING_SCANNED: u32 = 2;
pub const BINDING_PARAMS: u32 = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    Reduce,
    ReduceFanIn,
    ScanTiles,
    ScanPartials,
    ScanAddCarry,
}

impl Kernel {
    pub const ALL: [Kernel; 5] = [
        Kernel::Reduce,
        Kernel::ReduceFanIn,
        Kernel::ScanTiles,
        Kernel::ScanPartials,
        Kernel::ScanAddCarry,
    ];

    pub fn entry_point(self) -> &'static str {
        match self {
            Kernel::Reduce => "reduce",
            Kernel::ReduceFanIn => "reduce_fan_in",
            Kernel::ScanTiles => "scan_tiles",
            Kernel::ScanPartials => "scan_partials",
            Kernel::ScanAddCarry => "scan_add_carry",
        }
    }

    /// Bindings the entry point actually uses. Pipelines use derived layouts,
    /// so a bind group must name exactly these.
    pub fn bindings(self) -> &'static [u32] {
        match self {
            Kernel::Reduce => &[BINDING_VALUES, BINDING_PARTIALS, BINDING_PARAMS],
            Kernel::ReduceFanIn | Kernel::ScanPartials => &[BINDING_PARTIALS, BINDING_PARAMS],
            Kernel::ScanTiles => &[
                BINDING_VALUES,
                BINDING_PARTIALS,
                BINDING_SCANNED,
                BINDING_PARAMS,
            ],
            Kernel::ScanAddCarry => &[BINDING_PARTIALS, BINDING_SCANNED, BINDING_PARAMS],
        }
    }

    /// Serial kernels run as a single work item.
    pub fn is_serial(self) -> bool {
        matches!(self, Kernel::ReduceFanIn | Kernel::ScanPartials)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Reduce,
    ScanInclusive,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Reduce => "reduce",
            Algorithm::ScanInclusive => "scan-inclusive",
        }
    }

    /// Kernels in dispatch order. Each one starts only after the previous
    /// pass has finished on every work-group.
    pub fn passes(self) -> &'static [Kernel] {
        match self {
            Algorithm::Reduce => &[Kernel::Reduce, Kernel::ReduceFanIn],
            Algorithm::ScanInclusive => &[
                Kernel::ScanTiles,
                Kernel::ScanPartials,
                Kernel::ScanAddCarry,
            ],
        }
    }

    pub fn needs_scanned_buffer(self) -> bool {
        matches!(self, Algorithm::ScanInclusive)
    }
}

/// Uniform block shared by every entry point; layout mirrors `Params` in the WGSL.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Params {
    pub n: u32,
    pub groups: u32,
    pub groups_x: u32,
    pub _pad: u32,
}

/// Work-groups covering `n` elements; the last one may be partial.
pub fn group_count(n: usize) -> usize {
    n.div_ceil(GROUP_SIZE)
}

/// 2D dispatch grid for `groups` work-groups with at most `max_dim` per axis.
/// Returns `None` when even a square grid cannot cover them.
pub fn grid(groups: usize, max_dim: u32) -> Option<(u32, u32)> {
    let max_dim = max_dim.max(1) as usize;
    let x = groups.clamp(1, max_dim);
    let y = groups.div_ceil(x).max(1);
    if y > max_dim {
        return None;
    }
    Some((x as u32, y as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgsl_group_size_matches() {
        let decl = format!("const GROUP_SIZE: u32 = {GROUP_SIZE}u;");
        assert!(KERNEL_SOURCE.contains(&decl));
    }

    #[test]
    fn every_entry_point_is_in_the_source() {
        for kernel in Kernel::ALL {
            let signature = format!("fn {}(", kernel.entry_point());
            assert!(KERNEL_SOURCE.contains(&signature), "{signature}");
        }
    }

    #[test]
    fn reduction_and_scan_argument_order() {
        assert_eq!(&Kernel::Reduce.bindings()[..2], &[BINDING_VALUES, BINDING_PARTIALS]);
        assert_eq!(
            &Kernel::ScanTiles.bindings()[..3],
            &[BINDING_VALUES, BINDING_PARTIALS, BINDING_SCANNED]
        );
    }

    #[test]
    fn fan_in_runs_after_group_pass() {
        assert_eq!(Algorithm::Reduce.passes(), &[Kernel::Reduce, Kernel::ReduceFanIn]);
        assert!(Kernel::ReduceFanIn.is_serial());
        assert!(!Kernel::Reduce.is_serial());
    }

    #[test]
    fn group_count_rounds_up() {
        assert_eq!(group_count(128), 1);
        assert_eq!(group_count(129), 2);
        assert_eq!(group_count(1), 1);
        assert_eq!(group_count(10 * 1024 * 1024), 81_920);
    }

    #[test]
    fn grid_splits_over_dimension_limit() {
        assert_eq!(grid(81_920, 65_535), Some((65_535, 2)));
        assert_eq!(grid(8_192, 65_535), Some((8_192, 1)));
        assert_eq!(grid(0, 65_535), Some((1, 1)));
        assert_eq!(grid(10, 3), None);
    }

    #[test]
    fn params_is_one_uniform_block() {
        assert_eq!(std::mem::size_of::<Params>(), 16);
    }
}
