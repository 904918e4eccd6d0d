// vim: tw=80

//! The left-symmetric RAID-5 layout
//!
//! The array's physical sectors form a grid of `disks` columns by `sectors`
//! rows.  The last row of every disk is reserved for the drive header.  In
//! each remaining row exactly one column holds parity, and the parity column
//! rotates by one disk per row so that no single disk absorbs the whole
//! parity write load.  Logical sectors are numbered row by row through the
//! non-parity cells, in increasing column order.

use crate::types::*;

/// Describes the location of one logical sector within the array
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SectorLoc {
    /// Which disk (0-indexed) holds the data
    pub disk: DiskT,

    /// The data's physical sector index on that disk
    pub row: LbaT,

    /// Which disk holds the row's parity
    pub parity: DiskT,
}

/// The placement transform for one array
///
/// A pure mapping; it issues no I/O.  The forward and inverse mappings are a
/// bijection between `[0, datasectors())` and the non-parity cells of the
/// grid.
#[derive(Clone, Copy, Debug)]
pub struct Layout {
    /// Number of disks in the array
    disks: DiskT,

    /// Number of data rows.  Excludes the header row.
    depth: LbaT,
}

impl Layout {
    pub fn new(disks: DiskT, sectors: LbaT) -> Self {
        assert!((MIN_DISKS..=MAX_DISKS).contains(&disks));
        assert!(sectors >= MIN_SECTORS);
        Layout{disks, depth: sectors - 1}
    }

    /// Number of logical sectors addressable through this layout
    pub fn datasectors(&self) -> LbaT {
        (self.disks as LbaT - 1) * self.depth
    }

    /// Number of data rows
    pub fn depth(&self) -> LbaT {
        self.depth
    }

    /// The row holding every disk's header sector
    pub fn label_row(&self) -> LbaT {
        self.depth
    }

    /// The disk holding `row`'s parity sector
    pub fn parity_disk(&self, row: LbaT) -> DiskT {
        debug_assert!(row < self.depth);
        (row % self.disks as LbaT) as DiskT
    }

    /// Map a logical sector to its physical location
    pub fn id2loc(&self, lba: LbaT) -> SectorLoc {
        debug_assert!(lba < self.datasectors());
        let width = self.disks as LbaT - 1;
        let row = lba / width;
        let parity = self.parity_disk(row);
        let col = (lba % width) as DiskT;
        let disk = if col < parity { col } else { col + 1 };
        SectorLoc{disk, row, parity}
    }

    /// Inverse of `id2loc`
    ///
    /// Returns the logical sector stored at the given cell, or `None` if the
    /// cell holds parity.
    pub fn loc2id(&self, disk: DiskT, row: LbaT) -> Option<LbaT> {
        debug_assert!(disk >= 0 && disk < self.disks);
        debug_assert!(row < self.depth);
        let parity = self.parity_disk(row);
        if disk == parity {
            return None;
        }
        let col = if disk < parity { disk } else { disk - 1 };
        Some(row * (self.disks as LbaT - 1) + col as LbaT)
    }
}
