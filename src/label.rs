// vim: tw=80

use serde_derive::{Deserialize, Serialize};
use crate::types::*;

/*
 * On-disk header format, one sector per disk (the last sector of each):
 *
 * FailedDisk:  4 bytes     i32, index of the failed disk, or -1 for none
 * Generation:  4 bytes     u32, bumped at every clean stop
 * Pad:         zeros       fills the remainder of the sector
 *
 * bincode's default options are little-endian fixed-width integers, so the
 * serialized record is exactly these eight bytes.
 */

/// What a disk believes about its array
///
/// Written at `create`, at every clean `stop`, and by `resync`.  Startup
/// reconciles the headers of the first three disks by majority vote.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Label {
    failed_disk: i32,

    /// Generation number, monotonic across clean stop/start cycles
    pub generation: u32,
}

// The header record must fit in a sector
const _: () = assert!(SECTOR_SIZE >= Label::LEN);

impl Label {
    /// Serialized size of the header record
    pub const LEN: usize = 8;

    pub fn new(failed: Option<DiskT>, generation: u32) -> Self {
        let failed_disk = failed.map(i32::from).unwrap_or(-1);
        Label{failed_disk, generation}
    }

    /// The failed disk this header records, if any
    pub fn failed(&self) -> Option<DiskT> {
        if self.failed_disk < 0 {
            None
        } else {
            Some(self.failed_disk as DiskT)
        }
    }

    /// Deserialize from a header sector
    pub fn read_from(sector: &[u8]) -> Result<Label> {
        bincode::deserialize(&sector[..Label::LEN])
            .map_err(|_| Error::EINTEGRITY)
    }

    /// Serialize into a header sector, zero-filling the remainder
    pub fn write_into(&self, sector: &mut [u8]) {
        debug_assert!(sector.len() >= Label::LEN);
        sector.fill(0);
        // A fixed-size record into a large enough buffer; can't fail
        bincode::serialize_into(&mut sector[..Label::LEN], self).unwrap();
    }
}

/// Reconcile the header sectors read from the first three disks
///
/// `headers[i]` is `None` if disk `i`'s header could not be read.  Returns
/// the resulting health together with the generation the volume adopts.
///
/// At most one disk may be lost at a time, and a clean stop leaves at least
/// `disks - 1` identical headers behind, so the majority generation is
/// trustworthy.  Any combination that implies two simultaneous losses is
/// unrecoverable.
pub(crate) fn reconcile(headers: &[Option<Label>; 3], disks: DiskT)
    -> (Health, u32)
{
    match *headers {
        [Some(a), Some(b), Some(c)] => reconcile3(a, b, c, disks),
        [None, Some(a), Some(b)] => reconcile2(a, b, 0),
        [Some(a), None, Some(b)] => reconcile2(a, b, 1),
        [Some(a), Some(b), None] => reconcile2(a, b, 2),
        _ => (Health::Faulted, 0),
    }
}

/// All three headers were readable
fn reconcile3(a: Label, b: Label, c: Label, disks: DiskT) -> (Health, u32) {
    if a.generation == b.generation && b.generation == c.generation {
        if a.failed_disk == b.failed_disk && b.failed_disk == c.failed_disk {
            verdict(a, disks)
        } else {
            (Health::Faulted, 0)
        }
    } else {
        // One stale header is tolerable iff the fresh majority already
        // blames that very disk: that's what a dirty stop with one dead
        // disk leaves behind.
        let (x, y, outlier) = if a.generation == b.generation {
            (a, b, 2)
        } else if a.generation == c.generation {
            (a, c, 1)
        } else if b.generation == c.generation {
            (b, c, 0)
        } else {
            return (Health::Faulted, 0);
        };
        if x.failed_disk == y.failed_disk && x.failed_disk == outlier {
            (Health::Degraded(outlier as DiskT), x.generation)
        } else {
            (Health::Faulted, 0)
        }
    }
}

/// Two headers were readable and one was not
fn reconcile2(a: Label, b: Label, missing: DiskT) -> (Health, u32) {
    if a.generation != b.generation || a.failed_disk != b.failed_disk {
        return (Health::Faulted, 0);
    }
    match a.failed_disk {
        // The unreadable disk is the array's only casualty
        -1 => (Health::Degraded(missing), a.generation),
        // The survivors already blame the unreadable disk.  Still only one
        // casualty.
        f if f == i32::from(missing) => (Health::Degraded(missing),
                                         a.generation),
        // The blamed disk and the unreadable disk are two separate losses
        _ => (Health::Faulted, 0),
    }
}

fn verdict(l: Label, disks: DiskT) -> (Health, u32) {
    match l.failed_disk {
        -1 => (Health::Online, l.generation),
        f if f >= 0 && f < i32::from(disks) =>
            (Health::Degraded(f as DiskT), l.generation),
        _ => (Health::Faulted, 0),
    }
}
