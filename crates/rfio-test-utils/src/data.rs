//! Deterministic payloads.

/// `len` bytes of a pattern with period 251, so no two blocks of a
/// multi-block payload are identical.
pub fn pattern(len: usize) -> Vec<u8> {
    pattern_from(0, len)
}

/// The slice of [`pattern`] starting at byte `start`.
pub fn pattern_from(start: usize, len: usize) -> Vec<u8> {
    (start..start + len).map(|i| (i % 251) as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_deterministic() {
        assert_eq!(pattern(1000), pattern(1000));
        assert_eq!(pattern(0), Vec::<u8>::new());
    }

    #[test]
    fn pattern_from_matches_slice() {
        let full = pattern(2000);
        assert_eq!(pattern_from(700, 300), full[700..1000].to_vec());
    }
}
