// vim: tw=80

//! Test infrastructure: an in-memory disk shelf with fault injection

use std::{
    cell::RefCell,
    collections::HashSet,
    rc::Rc,
};

use raidvol::{device::BlockDev, DiskT, LbaT, SECTOR_SIZE};

struct Inner {
    store: RefCell<Vec<Vec<u8>>>,
    dead: RefCell<HashSet<DiskT>>,
    sectors: LbaT,
}

/// A shelf of RAM-backed disks that can be told to fail
///
/// Clones share the same storage, so a test can keep a handle for fault
/// injection while the volume owns another.
#[derive(Clone)]
pub struct RamDev(Rc<Inner>);

impl RamDev {
    pub fn new(disks: DiskT, sectors: LbaT) -> Self {
        let store = vec![
            vec![0u8; sectors as usize * SECTOR_SIZE];
            disks as usize
        ];
        RamDev(Rc::new(Inner{
            store: RefCell::new(store),
            dead: RefCell::new(HashSet::new()),
            sectors,
        }))
    }

    /// Every access to `disk` fails until it is replaced
    pub fn kill(&self, disk: DiskT) {
        self.0.dead.borrow_mut().insert(disk);
    }

    /// Swap in a blank replacement for `disk`
    pub fn replace(&self, disk: DiskT) {
        self.0.dead.borrow_mut().remove(&disk);
        let mut store = self.0.store.borrow_mut();
        store[disk as usize].fill(0);
    }

    /// Overwrite one physical sector, bypassing fault injection
    pub fn patch_sector(&self, disk: DiskT, lba: LbaT, buf: &[u8]) {
        assert_eq!(buf.len(), SECTOR_SIZE);
        let mut store = self.0.store.borrow_mut();
        let ofs = lba as usize * SECTOR_SIZE;
        store[disk as usize][ofs..ofs + SECTOR_SIZE].copy_from_slice(buf);
    }

    /// Assert that every row of every stripe XORs to zero
    pub fn assert_parity(&self) {
        let store = self.0.store.borrow();
        for row in 0..(self.0.sectors - 1) {
            let ofs = row as usize * SECTOR_SIZE;
            let mut acc = [0u8; SECTOR_SIZE];
            for disk in store.iter() {
                for (a, b) in acc.iter_mut()
                    .zip(&disk[ofs..ofs + SECTOR_SIZE])
                {
                    *a ^= *b;
                }
            }
            assert!(acc.iter().all(|b| *b == 0),
                    "parity does not verify for row {row}");
        }
    }
}

impl BlockDev for RamDev {
    fn disks(&self) -> DiskT {
        self.0.store.borrow().len() as DiskT
    }

    fn sectors(&self) -> LbaT {
        self.0.sectors
    }

    fn read(&self, disk: DiskT, lba: LbaT, buf: &mut [u8], count: usize)
        -> usize
    {
        if self.0.dead.borrow().contains(&disk) {
            return 0;
        }
        let store = self.0.store.borrow();
        let ofs = lba as usize * SECTOR_SIZE;
        let len = count * SECTOR_SIZE;
        buf[..len].copy_from_slice(&store[disk as usize][ofs..ofs + len]);
        count
    }

    fn write(&self, disk: DiskT, lba: LbaT, buf: &[u8], count: usize)
        -> usize
    {
        if self.0.dead.borrow().contains(&disk) {
            return 0;
        }
        let mut store = self.0.store.borrow_mut();
        let ofs = lba as usize * SECTOR_SIZE;
        let len = count * SECTOR_SIZE;
        store[disk as usize][ofs..ofs + len].copy_from_slice(&buf[..len]);
        count
    }
}
