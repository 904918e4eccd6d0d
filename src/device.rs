// vim: tw=80

//! The disk driver interface consumed by the volume

#[cfg(test)] use mockall::automock;
use crate::types::*;

/// A shelf of independent, sector-addressable disks
///
/// This is the volume's only route to stable storage.  The transfer methods
/// return the number of sectors actually moved; any value less than the
/// requested count is a failure of that disk for that access.  A failure is
/// not assumed sticky for other sectors or other disks; it is the volume's
/// state machine that decides when a disk is dead.
///
/// The volume assumes exclusive use of every disk's full sector range.
#[cfg_attr(test, automock)]
pub trait BlockDev {
    /// Number of disks in the shelf
    fn disks(&self) -> DiskT;

    /// Number of sectors on each disk
    fn sectors(&self) -> LbaT;

    /// Read `count` sectors from `disk` starting at `lba` into `buf`
    fn read(&self, disk: DiskT, lba: LbaT, buf: &mut [u8], count: usize)
        -> usize;

    /// Write `count` sectors from `buf` to `disk` starting at `lba`
    fn write(&self, disk: DiskT, lba: LbaT, buf: &[u8], count: usize)
        -> usize;
}

/// Reject descriptors the geometry can't support
pub(crate) fn validate<D: BlockDev>(dev: &D) -> Result<()> {
    if !(MIN_DISKS..=MAX_DISKS).contains(&dev.disks()) {
        return Err(Error::EINVAL);
    }
    if !(MIN_SECTORS..=MAX_SECTORS).contains(&dev.sectors()) {
        return Err(Error::EINVAL);
    }
    Ok(())
}
