//! Reference SPAD selection.

/// Number of reference SPADs in the map.
pub const SPAD_COUNT: usize = 48;

// 12 is the first aperture spad
const FIRST_APERTURE_SPAD: usize = 12;

/// Reference SPAD count and type as stored in the device NVM.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpadInfo {
    /// Number of reference SPADs to enable (0..=127).
    pub count: u8,
    /// Whether the reference SPADs are aperture SPADs.
    pub is_aperture: bool,
}

impl SpadInfo {
    pub(crate) fn from_register(value: u8) -> Self {
        SpadInfo {
            count: value & 0x7F,
            is_aperture: (value >> 7) & 0x01 == 1,
        }
    }
}

/// Enables the first `count` good SPADs of `ref_spad_map`, starting at 0 or at
/// the first aperture SPAD. Every other bit is cleared.
pub fn compute_spad_map(
    mut ref_spad_map: [u8; 6],
    count: u8,
    is_aperture: bool,
) -> [u8; 6] {
    let first_spad_to_enable =
        if is_aperture { FIRST_APERTURE_SPAD } else { 0 };
    let mut spads_enabled: u8 = 0;

    for i in 0..SPAD_COUNT {
        if i < first_spad_to_enable || spads_enabled == count {
            ref_spad_map[i / 8] &= !(1 << (i % 8));
        } else if (ref_spad_map[i / 8] >> (i % 8)) & 0x1 > 0 {
            spads_enabled += 1;
        }
    }

    ref_spad_map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enables_first_good_spads_in_order() {
        let map = compute_spad_map([0xFF; 6], 5, false);
        assert_eq!(map, [0x1F, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn aperture_spads_start_at_twelve() {
        let map = compute_spad_map([0xFF; 6], 3, true);
        assert_eq!(map, [0x00, 0x70, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn skips_spads_missing_from_the_map() {
        let source = [0b1010_1010, 0x00, 0x01, 0x00, 0x00, 0x80];
        let map = compute_spad_map(source, 5, false);
        assert_eq!(map, [0b1010_1010, 0x00, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn zero_count_clears_everything() {
        assert_eq!(compute_spad_map([0xFF; 6], 0, false), [0x00; 6]);
    }

    #[test]
    fn count_larger_than_available_keeps_all_good_spads() {
        let source = [0x0F, 0x00, 0xF0, 0x00, 0x00, 0x01];
        assert_eq!(compute_spad_map(source, 127, false), source);
    }

    #[test]
    fn decodes_count_and_type() {
        assert_eq!(
            SpadInfo::from_register(0x85),
            SpadInfo {
                count: 5,
                is_aperture: true
            }
        );
        assert_eq!(
            SpadInfo::from_register(0x2C),
            SpadInfo {
                count: 44,
                is_aperture: false
            }
        );
    }
}
