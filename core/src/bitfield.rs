// EVENT BITFIELD
// ================================================================================================

/// Per-event flag bits driving reverse computation.
///
/// A forward handler sets a bit for every conditional state mutation it performs; the matching
/// reverse handler reads the bits to decide which mutations to undo. The field travels with the
/// event, so a handler pair always sees the bits it set itself.
///
/// The base LP zeroes the whole field after reverse dispatch: the host engine may reuse the slot
/// when it replays the event forward again.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BitField(u32);

impl BitField {
    /// Returns a new, all-zero [BitField].
    pub const fn new() -> Self {
        Self(0)
    }

    /// Sets the flag bit at `bit`.
    ///
    /// # Panics
    /// Panics if `bit` is not in `0..32`.
    #[inline(always)]
    pub fn set(&mut self, bit: u32) {
        assert!(bit < 32, "bitfield has 32 flag bits, got index {bit}");
        self.0 |= 1 << bit;
    }

    /// Returns true if the flag bit at `bit` is set.
    ///
    /// # Panics
    /// Panics if `bit` is not in `0..32`.
    #[inline(always)]
    pub fn test(&self, bit: u32) -> bool {
        assert!(bit < 32, "bitfield has 32 flag bits, got index {bit}");
        self.0 & (1 << bit) != 0
    }

    /// Zeroes every flag bit.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Returns true if no flag bit is set.
    #[inline(always)]
    pub fn is_clear(&self) -> bool {
        self.0 == 0
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::BitField;

    #[test]
    fn set_test_clear() {
        let mut bits = BitField::new();
        assert!(bits.is_clear());

        bits.set(0);
        bits.set(3);
        assert!(bits.test(0));
        assert!(!bits.test(1));
        assert!(bits.test(3));

        bits.clear();
        assert!(bits.is_clear());
    }

    #[test]
    #[should_panic(expected = "32 flag bits")]
    fn out_of_range() {
        let mut bits = BitField::new();
        bits.set(32);
    }
}
