/// Additive checksum used by every register exchange and frame: the payload
/// bytes summed modulo 256.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Check `data` against the checksum byte received after it
#[inline(always)]
pub fn verify(data: &[u8], received: u8) -> bool {
    checksum(data) == received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_test() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xff, 0x02]), 0x01, "sum should wrap at 256");
    }

    #[test]
    fn any_single_byte_change_is_detected() {
        let payload: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37)).collect();
        let sum = checksum(&payload);
        assert!(verify(&payload, sum));

        for i in 0..payload.len() {
            let mut corrupted = payload.clone();
            corrupted[i] ^= 0x5a;
            assert!(!verify(&corrupted, sum), "flip at {i} went unnoticed");
        }
    }
}
