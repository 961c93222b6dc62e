//! Conversions between encoded timeout registers, macro clocks and
//! microseconds.
//!
//! All arithmetic is truncating integer arithmetic, matching the sensor's clock
//! model bit for bit.

/// Decodes a sequence step timeout register, format "(LSByte * 2^MSByte) + 1".
pub fn decode_timeout(register_value: u16) -> u32 {
    let ls_byte = u64::from(register_value & 0x00FF);
    let ms_byte = u32::from(register_value >> 8);
    // ls_byte < 2^8, so shifting by up to 40 stays inside a u64
    let mclks = (ls_byte << ms_byte.min(40)) + 1;
    cast::u32(mclks).unwrap_or(u32::MAX)
}

/// Encodes a timeout in macro clocks into the "(LSByte * 2^MSByte) + 1" format.
pub fn encode_timeout(timeout_mclks: u32) -> u16 {
    if timeout_mclks == 0 {
        return 0;
    }
    let timeout_mclks = timeout_mclks.min(0xFFFF);

    let mut ls_byte: u32 = timeout_mclks - 1;
    let mut ms_byte: u16 = 0;

    while (ls_byte & 0xFFFF_FF00) > 0 {
        ls_byte >>= 1;
        ms_byte += 1;
    }

    (ms_byte << 8) | ((ls_byte & 0xFF) as u16)
}

/// Macro period in nanoseconds for a vcsel period given in PCLKs.
pub fn calc_macro_period(vcsel_period_pclks: u8) -> u32 {
    ((2304u32 * u32::from(vcsel_period_pclks) * 1655u32) + 500u32) / 1000u32
}

/// Converts a timeout from macro clocks to microseconds.
pub fn timeout_mclks_to_microseconds(
    timeout_period_mclks: u32,
    vcsel_period_pclks: u8,
) -> u32 {
    let macro_period_nanoseconds =
        u64::from(calc_macro_period(vcsel_period_pclks));
    let microseconds = ((u64::from(timeout_period_mclks)
        * macro_period_nanoseconds)
        + (macro_period_nanoseconds / 2))
        / 1000;
    cast::u32(microseconds).unwrap_or(u32::MAX)
}

/// Converts a timeout from microseconds to macro clocks.
///
/// A vcsel period of zero has no macro period and yields zero clocks.
pub fn timeout_microseconds_to_mclks(
    timeout_period_microseconds: u32,
    vcsel_period_pclks: u8,
) -> u32 {
    let macro_period_nanoseconds =
        u64::from(calc_macro_period(vcsel_period_pclks));
    if macro_period_nanoseconds == 0 {
        return 0;
    }
    let mclks = ((u64::from(timeout_period_microseconds) * 1000)
        + (macro_period_nanoseconds / 2))
        / macro_period_nanoseconds;
    cast::u32(mclks).unwrap_or(u32::MAX)
}

/// Decodes a vcsel pulse period register into PCLKs, based on
/// VL53L0X_decode_vcsel_period().
pub fn decode_vcsel_period(register_value: u8) -> u8 {
    register_value.wrapping_add(1) << 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_follows_register_format() {
        assert_eq!(decode_timeout(0x0000), 1);
        assert_eq!(decode_timeout(0x0045), 70);
        assert_eq!(decode_timeout(0x01FF), 511);
        assert_eq!(decode_timeout(0x0282), 521);
        assert_eq!(decode_timeout(0xFFFF), u32::MAX);
    }

    #[test]
    fn encode_clamps_out_of_range_values() {
        assert_eq!(encode_timeout(0), 0);
        assert_eq!(encode_timeout(1), 0);
        assert_eq!(encode_timeout(0x10000), encode_timeout(0xFFFF));
        assert_eq!(encode_timeout(u32::MAX), encode_timeout(0xFFFF));
        assert_eq!(encode_timeout(0xFFFF), 0x08FF);
    }

    #[test]
    fn encode_shifts_until_fits_in_a_byte() {
        assert_eq!(encode_timeout(256), 0x00FF);
        assert_eq!(encode_timeout(257), 0x0180);
        assert_eq!(encode_timeout(333), 0x01A6);
        assert_eq!(encode_timeout(522), 0x0282);
    }

    #[test]
    fn encode_decode_stays_within_shift_error() {
        for mclks in 1..0xFFFFu32 {
            let encoded = encode_timeout(mclks);
            let shift = u32::from(encoded >> 8);
            let decoded = decode_timeout(encoded);
            let tolerance = (1u32 << shift) - 1;
            assert!(decoded <= mclks, "{} decoded to {}", mclks, decoded);
            assert!(
                mclks - decoded <= tolerance,
                "{} decoded to {}",
                mclks,
                decoded
            );
        }
    }

    #[test]
    fn macro_period_matches_sensor_clock() {
        assert_eq!(calc_macro_period(10), 38131);
        assert_eq!(calc_macro_period(12), 45757);
        assert_eq!(calc_macro_period(14), 53384);
    }

    #[test]
    fn mclks_and_microseconds_round_with_integer_division() {
        assert_eq!(timeout_mclks_to_microseconds(12, 14), 667);
        assert_eq!(timeout_mclks_to_microseconds(70, 14), 3763);
        assert_eq!(timeout_mclks_to_microseconds(441, 10), 16834);
        assert_eq!(timeout_microseconds_to_mclks(17224, 10), 452);
        assert_eq!(timeout_microseconds_to_mclks(10033, 10), 263);
    }

    #[test]
    fn clock_conversion_is_inverse_within_one_clock() {
        for &pclks in &[12u8, 18, 24] {
            for mclks in (0..0xFFFFu32).step_by(13) {
                let us = timeout_mclks_to_microseconds(mclks, pclks);
                let back = timeout_microseconds_to_mclks(us, pclks);
                let diff = if back > mclks {
                    back - mclks
                } else {
                    mclks - back
                };
                assert!(
                    diff <= 1,
                    "{} mclks at {} pclks came back as {}",
                    mclks,
                    pclks,
                    back
                );
            }
        }
    }

    #[test]
    fn zero_vcsel_period_yields_zero_clocks() {
        assert_eq!(timeout_microseconds_to_mclks(1000, 0), 0);
    }

    #[test]
    fn vcsel_period_decodes_to_pclks() {
        assert_eq!(decode_vcsel_period(0x06), 14);
        assert_eq!(decode_vcsel_period(0x04), 10);
        assert_eq!(decode_vcsel_period(0x05), 12);
    }
}
