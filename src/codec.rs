// vim: tw=80
//! XOR parity arithmetic
//!
//! RAID-5 parity is erasure coding in GF(2): each row's parity sector is the
//! XOR of the row's data sectors, so any one missing sector equals the XOR of
//! the survivors.  Byte order is irrelevant; XOR is commutative and
//! associative with identity zero.

/// `dst ^= src`, over a whole sector
///
/// Sectors are a multiple of 4 bytes, so nearly all of the work happens a
/// word at a time; the remainder loop only runs for odd-sized test buffers.
pub fn xor_into(dst: &mut [u8], src: &[u8]) {
    assert_eq!(dst.len(), src.len());
    let mut diter = dst.chunks_exact_mut(8);
    let mut siter = src.chunks_exact(8);
    for (d, s) in (&mut diter).zip(&mut siter) {
        let x = u64::from_ne_bytes(d.try_into().unwrap()) ^
                u64::from_ne_bytes(s.try_into().unwrap());
        d.copy_from_slice(&x.to_ne_bytes());
    }
    for (d, s) in diter.into_remainder().iter_mut().zip(siter.remainder()) {
        *d ^= *s;
    }
}
