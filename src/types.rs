// vim: tw=80
//! Common type definitions used throughout raidvol

use std::fmt;

/// Indexes a disk within the array.
pub type DiskT = i16;

/// Indexes a sector, physical or logical.  Sectors are always `SECTOR_SIZE`
/// bytes.
pub type LbaT = u32;

/// Size of one sector in bytes, the unit of all physical I/O
pub const SECTOR_SIZE: usize = 512;
const _: () = assert!(SECTOR_SIZE % 4 == 0);

/// Fewest disks that can form an array: two data columns plus parity
pub const MIN_DISKS: DiskT = 3;

/// Most disks that can form an array
pub const MAX_DISKS: DiskT = 16;

/// Fewest sectors per disk: one data row plus the header row
pub const MIN_SECTORS: LbaT = 2;

/// Most sectors per disk
pub const MAX_SECTORS: LbaT = 2 * 1024 * 1024;

/// raidvol's error type.  Basically just an errno
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// Invalid argument: misaligned buffer, out-of-range sector, or a
    /// malformed device descriptor.  Never changes the volume's state.
    EINVAL,

    /// A disk failure exhausted the array's redundancy during this operation
    EIO,

    /// The operation was rejected because the volume is already faulted
    ENXIO,

    /// The on-disk headers contradict each other
    EINTEGRITY,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents the health of a volume
///
/// The ordering reflects which Health is "sicker".  That is, a degraded
/// volume is sicker than an online one, and a faulted volume is sickest of
/// all.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Health {
    /// Perfectly healthy
    Online,
    /// Operating without redundancy.  The payload is the failed disk; all
    /// logical I/O still succeeds by reconstructing its contents from the
    /// survivors.
    Degraded(DiskT),
    /// Faulted.  Two disks have failed; no I/O is possible.
    Faulted,
}

impl Health {
    /// If this volume is degraded, which disk has failed?
    pub fn as_degraded(self) -> Option<DiskT> {
        if let Health::Degraded(d) = self {
            Some(d)
        } else {
            None
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Online => "Online".fmt(f),
            Self::Degraded(d) => write!(f, "Degraded({d})"),
            Self::Faulted => "Faulted".fmt(f),
        }
    }
}
