// vim: tw=80

//! raidvol: a software RAID-5 volume manager
//!
//! The [`volume::RaidVolume`] layers one logical sector array over N >= 3
//! independent disks, reached through the caller-supplied
//! [`device::BlockDev`].  The array's contents survive the failure of any
//! one disk, and a replaced disk is brought back into service by
//! `resync`.

pub mod codec;
pub mod device;
pub mod label;
pub mod layout;
pub mod types;
pub mod volume;

pub use crate::types::*;
