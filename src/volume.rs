// vim: tw=80

//! The RAID-5 volume: lifecycle, datapath, and rebuild
//!
//! A `RaidVolume` presents one logical sector array over `N` disks, laid out
//! by [`Layout`] with single-parity redundancy.  All I/O is synchronous and
//! the object is not safe for concurrent callers; the harness serializes.

use tracing::{debug, warn};

use crate::{
    codec,
    device::{self, BlockDev},
    label::{self, Label},
    layout::{Layout, SectorLoc},
    types::*,
};

/// The error side of a single disk operation: which disk failed
type DiskResult<T> = std::result::Result<T, DiskT>;

/// One logical RAID-5 array over an exclusive set of disks
///
/// `start` acquires the disk binding and `stop` releases it; a stopped
/// volume is simply the absence of the value.  Health transitions made by
/// reads and writes live in memory only and are persisted by `stop` or
/// `resync`.  Multiple volumes over disjoint shelves don't interfere.
pub struct RaidVolume<D: BlockDev> {
    /// The underlying disk shelf
    dev: D,

    /// Placement transform, fixed at start
    layout: Layout,

    health: Health,

    /// Generation adopted from the header quorum; bumped by a clean stop
    generation: u32,
}

impl<D: BlockDev> RaidVolume<D> {
    /// Provision headers on a fresh shelf
    ///
    /// Writes an initial header (no failed disk, generation 0) to every
    /// disk.  Returns `EINVAL` for a malformed descriptor and `EIO` if any
    /// disk rejects its header.
    pub fn create(dev: &D) -> Result<()> {
        device::validate(dev)?;
        let row = Layout::new(dev.disks(), dev.sectors()).label_row();
        let mut sector = [0u8; SECTOR_SIZE];
        Label::new(None, 0).write_into(&mut sector);
        for disk in 0..dev.disks() {
            if dev.write(disk, row, &sector, 1) != 1 {
                return Err(Error::EIO);
            }
        }
        Ok(())
    }

    /// Bind `dev` and reconcile the on-disk headers
    ///
    /// Returns `EINVAL` without issuing any I/O if the descriptor is
    /// malformed.  An unusable header quorum is not an error; it yields a
    /// volume that is already [`Health::Faulted`].
    pub fn start(dev: D) -> Result<Self> {
        device::validate(&dev)?;
        let layout = Layout::new(dev.disks(), dev.sectors());
        let mut headers = [None; 3];
        let mut sector = [0u8; SECTOR_SIZE];
        for (disk, header) in headers.iter_mut().enumerate() {
            if dev.read(disk as DiskT, layout.label_row(), &mut sector, 1)
                == 1
            {
                *header = Label::read_from(&sector).ok();
            }
        }
        let (health, generation) = label::reconcile(&headers, dev.disks());
        debug!(%health, generation, "reconciled drive headers");
        Ok(RaidVolume{dev, layout, health, generation})
    }

    /// Persist headers and release the disk binding
    ///
    /// A faulted volume's headers are left untouched: it can no longer
    /// guarantee the parity invariant, so the previous generation is the
    /// safe one to restart from.
    pub fn stop(mut self) -> D {
        if self.health == Health::Faulted {
            return self.dev;
        }
        self.generation += 1;
        let row = self.layout.label_row();
        let mut sector = [0u8; SECTOR_SIZE];
        'persist: loop {
            let failed = self.health.as_degraded();
            Label::new(failed, self.generation).write_into(&mut sector);
            for disk in 0..self.dev.disks() {
                if Some(disk) == failed {
                    continue;
                }
                if self.leaf_write(disk, row, &sector).is_ok() {
                    continue;
                }
                if self.health == Health::Online {
                    // Start over so the survivors hear the new verdict
                    warn!(disk, "disk failed while persisting headers");
                    self.health = Health::Degraded(disk);
                    continue 'persist;
                } else {
                    warn!(disk, "second disk failed; headers not persisted");
                    self.health = Health::Faulted;
                    break 'persist;
                }
            }
            break;
        }
        self.dev
    }

    pub fn status(&self) -> Health {
        self.health
    }

    /// Number of logical sectors addressable through the volume
    pub fn size(&self) -> LbaT {
        self.layout.datasectors()
    }

    /// The generation adopted at start
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Read logical sectors starting at `lba`
    ///
    /// `data`'s length selects the sector count and must be an exact
    /// multiple of `SECTOR_SIZE`.  An empty slice is a no-op.
    pub fn read(&mut self, lba: LbaT, data: &mut [u8]) -> Result<()> {
        self.validate_xfer(lba, data.len())?;
        for (i, sector) in data.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            self.read_sector(lba + i as LbaT, sector)?;
        }
        Ok(())
    }

    /// Write logical sectors starting at `lba`
    ///
    /// Same addressing contract as [`read`](Self::read).  After success, a
    /// read of the same range returns the same bytes even if one disk fails
    /// in between.
    pub fn write(&mut self, lba: LbaT, data: &[u8]) -> Result<()> {
        self.validate_xfer(lba, data.len())?;
        for (i, sector) in data.chunks_exact(SECTOR_SIZE).enumerate() {
            self.write_sector(lba + i as LbaT, sector)?;
        }
        Ok(())
    }

    /// Rebuild the failed disk's contents onto its replacement
    ///
    /// Reconstructs every data row of the failed disk from the survivors,
    /// then rewrites all headers to declare the array whole again.  Returns
    /// the resulting health: `Online` on success, `Degraded` if the
    /// replacement (or a header write) failed, `Faulted` if a second disk
    /// failed mid-rebuild.  A volume that isn't degraded is returned as is.
    pub fn resync(&mut self) -> Health {
        let failed = match self.health {
            Health::Degraded(d) => d,
            _ => return self.health,
        };
        let mut buf = [0u8; SECTOR_SIZE];
        for row in 0..self.layout.depth() {
            if let Err(d) = self.xor_row(row, failed, None, &mut buf) {
                self.fault(d);
                return self.health;
            }
            if self.leaf_write(failed, row, &buf).is_err() {
                // The replacement isn't ready.  No harm done; stay
                // degraded.
                return self.health;
            }
        }
        // Redundancy is restored.  Let every header say so, the replaced
        // disk first so a crash mid-loop can't orphan it.
        Label::new(None, self.generation).write_into(&mut buf);
        let row = self.layout.label_row();
        if self.leaf_write(failed, row, &buf).is_err() {
            return self.health;
        }
        for disk in 0..self.dev.disks() {
            if disk == failed {
                continue;
            }
            if self.leaf_write(disk, row, &buf).is_err() {
                self.degrade(disk);
                return self.health;
            }
        }
        debug!(disk = failed, "resync complete");
        self.health = Health::Online;
        self.health
    }

    /// Common argument validation for read and write.  Rejection never
    /// mutates state.
    fn validate_xfer(&self, lba: LbaT, len: usize) -> Result<()> {
        if len % SECTOR_SIZE != 0 {
            return Err(Error::EINVAL);
        }
        let count = (len / SECTOR_SIZE) as u64;
        if u64::from(lba) + count > u64::from(self.size()) {
            return Err(Error::EINVAL);
        }
        if self.health == Health::Faulted {
            return Err(Error::ENXIO);
        }
        Ok(())
    }

    fn read_sector(&mut self, lba: LbaT, out: &mut [u8]) -> Result<()> {
        let loc = self.layout.id2loc(lba);
        match self.health {
            Health::Degraded(failed) if failed == loc.disk => {
                // The target is dead; its contents are the XOR of the
                // survivors
                if let Err(d) = self.xor_row(loc.row, failed, None, out) {
                    self.fault(d);
                    return Err(Error::EIO);
                }
                Ok(())
            }
            Health::Online | Health::Degraded(_) => {
                if self.leaf_read(loc.disk, loc.row, out).is_ok() {
                    return Ok(());
                }
                if self.health == Health::Online {
                    // Retry the same logical sector in degraded mode
                    self.degrade(loc.disk);
                    self.read_sector(lba, out)
                } else {
                    self.fault(loc.disk);
                    Err(Error::EIO)
                }
            }
            Health::Faulted => Err(Error::ENXIO),
        }
    }

    fn write_sector(&mut self, lba: LbaT, data: &[u8]) -> Result<()> {
        let loc = self.layout.id2loc(lba);
        match self.health {
            Health::Online => {
                match self.write_sector_online(&loc, data) {
                    Ok(()) => Ok(()),
                    Err(d) => {
                        // Retry the same logical sector in degraded mode
                        self.degrade(d);
                        self.write_sector(lba, data)
                    }
                }
            }
            Health::Degraded(failed) => {
                match self.write_sector_degraded(&loc, failed, data) {
                    Ok(()) => Ok(()),
                    Err(d) => {
                        self.fault(d);
                        Err(Error::EIO)
                    }
                }
            }
            Health::Faulted => Err(Error::ENXIO),
        }
    }

    /// Healthy-path write: data first, then freshly computed parity
    fn write_sector_online(&self, loc: &SectorLoc, data: &[u8])
        -> DiskResult<()>
    {
        self.leaf_write(loc.disk, loc.row, data)?;
        let mut parity = [0u8; SECTOR_SIZE];
        self.xor_row(loc.row, loc.parity, None, &mut parity)?;
        self.leaf_write(loc.parity, loc.row, &parity)
    }

    fn write_sector_degraded(&self, loc: &SectorLoc, failed: DiskT,
                             data: &[u8]) -> DiskResult<()>
    {
        if loc.disk == failed {
            // The target is dead.  Adjust parity alone so the row
            // reconstructs to `data`; resync will later materialize it on
            // the replacement.
            let mut parity = [0u8; SECTOR_SIZE];
            self.xor_row(loc.row, loc.parity, Some((failed, data)),
                         &mut parity)?;
            self.leaf_write(loc.parity, loc.row, &parity)
        } else if loc.parity == failed {
            // The row's parity is dead; the data write is all there is
            self.leaf_write(loc.disk, loc.row, data)
        } else {
            // The dead disk holds some other column of this row.  Capture
            // its current value before the data write changes the row,
            // then fold that value back into the new parity.
            let mut dead = [0u8; SECTOR_SIZE];
            self.xor_row(loc.row, failed, None, &mut dead)?;
            self.leaf_write(loc.disk, loc.row, data)?;
            let mut parity = [0u8; SECTOR_SIZE];
            self.xor_row(loc.row, loc.parity, Some((failed, &dead[..])),
                         &mut parity)?;
            self.leaf_write(loc.parity, loc.row, &parity)
        }
    }

    /// XOR together every sector of `row` except `skip`'s, substituting
    /// `subst`'s buffer for its disk instead of reading it
    ///
    /// Reads are issued in ascending disk order.  The combine stops at the
    /// first read failure and returns the failing disk.
    fn xor_row(&self, row: LbaT, skip: DiskT, subst: Option<(DiskT, &[u8])>,
               out: &mut [u8]) -> DiskResult<()>
    {
        debug_assert!(subst.map_or(true, |(d, _)| d != skip));
        out.fill(0);
        let mut scratch = [0u8; SECTOR_SIZE];
        for disk in 0..self.dev.disks() {
            if disk == skip {
                continue;
            }
            if let Some((ovr, buf)) = subst {
                if disk == ovr {
                    codec::xor_into(out, buf);
                    continue;
                }
            }
            self.leaf_read(disk, row, &mut scratch)?;
            codec::xor_into(out, &scratch);
        }
        Ok(())
    }

    fn leaf_read(&self, disk: DiskT, lba: LbaT, buf: &mut [u8])
        -> DiskResult<()>
    {
        if self.dev.read(disk, lba, buf, 1) == 1 {
            Ok(())
        } else {
            Err(disk)
        }
    }

    fn leaf_write(&self, disk: DiskT, lba: LbaT, buf: &[u8])
        -> DiskResult<()>
    {
        if self.dev.write(disk, lba, buf, 1) == 1 {
            Ok(())
        } else {
            Err(disk)
        }
    }

    /// Declare `disk` dead and drop to degraded operation
    fn degrade(&mut self, disk: DiskT) {
        warn!(disk, "disk failed; volume is now degraded");
        self.health = Health::Degraded(disk);
    }

    /// A second disk is dead; the array is beyond redundancy
    fn fault(&mut self, disk: DiskT) {
        warn!(disk, "second disk failed; volume is now faulted");
        self.health = Health::Faulted;
    }
}
