//! Bit-level access to the raw allocation bitmaps.
//!
//! Both bitmaps live inside the metadata block and are operated on in place,
//! one bit per allocatable unit (inode slot or block).

use bitvec::prelude::*;

/// Reads the bit at `index`.
pub fn get(bytes: &[u8], index: usize) -> bool {
    bytes.view_bits::<Lsb0>()[index]
}

/// Sets the bit at `index` to `value`.
pub fn set(bytes: &mut [u8], index: usize, value: bool) {
    bytes.view_bits_mut::<Lsb0>().set(index, value);
}

/// The index of the first clear bit among the first `len` bits, if any.
pub fn first_zero(bytes: &[u8], len: usize) -> Option<usize> {
    bytes.view_bits::<Lsb0>()[..len].first_zero()
}

/// The number of clear bits among the first `len` bits.
pub fn count_zeros(bytes: &[u8], len: usize) -> usize {
    bytes.view_bits::<Lsb0>()[..len].count_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let mut bytes = [0u8; 4];

        set(&mut bytes, 9, true);

        assert!(get(&bytes, 9));
        assert!(!get(&bytes, 8));
        assert!(!get(&bytes, 10));
    }

    #[test]
    fn test_clear() {
        let mut bytes = [0xffu8; 2];

        set(&mut bytes, 3, false);

        assert!(!get(&bytes, 3));
        assert!(get(&bytes, 2));
    }

    #[test]
    fn test_first_zero_skips_set_bits() {
        let mut bytes = [0u8; 2];
        set(&mut bytes, 0, true);
        set(&mut bytes, 1, true);

        assert_eq!(first_zero(&bytes, 16), Some(2));
    }

    #[test]
    fn test_first_zero_respects_len() {
        let bytes = [0xffu8, 0x00];

        assert_eq!(first_zero(&bytes, 8), None);
        assert_eq!(first_zero(&bytes, 16), Some(8));
    }

    #[test]
    fn test_count_zeros() {
        let mut bytes = [0u8; 2];
        set(&mut bytes, 5, true);

        assert_eq!(count_zeros(&bytes, 16), 15);
        assert_eq!(count_zeros(&bytes, 8), 7);
    }
}
