//! Sequence step enables and per-step timeouts.

use crate::timeout::{
    decode_timeout, decode_vcsel_period, timeout_mclks_to_microseconds,
};

const FINAL_RANGE_BIT: u8 = 7;
const PRE_RANGE_BIT: u8 = 6;
const TCC_BIT: u8 = 4;
const DSS_BIT: u8 = 3;
const MSRC_BIT: u8 = 2;

const STEP_MASK: u8 = (1 << FINAL_RANGE_BIT)
    | (1 << PRE_RANGE_BIT)
    | (1 << TCC_BIT)
    | (1 << DSS_BIT)
    | (1 << MSRC_BIT);

/// Ranging phases enabled in `SYSTEM_SEQUENCE_CONFIG`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SequenceStepEnables {
    /// Target centre check.
    pub tcc: bool,
    /// Dynamic SPAD selection.
    pub dss: bool,
    /// Minimum signal rate check.
    pub msrc: bool,
    /// Pre-range phase.
    pub pre_range: bool,
    /// Final range phase.
    pub final_range: bool,
}

impl SequenceStepEnables {
    /// Decodes the `SYSTEM_SEQUENCE_CONFIG` register.
    pub fn from_register(sequence_config: u8) -> Self {
        let bit = |n: u8| ((sequence_config >> n) & 0x1) == 1;
        SequenceStepEnables {
            tcc: bit(TCC_BIT),
            dss: bit(DSS_BIT),
            msrc: bit(MSRC_BIT),
            pre_range: bit(PRE_RANGE_BIT),
            final_range: bit(FINAL_RANGE_BIT),
        }
    }

    /// Replaces the step bits of `sequence_config`, keeping the reserved bits.
    pub fn apply_to(self, sequence_config: u8) -> u8 {
        let flag = |on: bool, n: u8| -> u8 { if on { 1 << n } else { 0 } };
        (sequence_config & !STEP_MASK)
            | flag(self.final_range, FINAL_RANGE_BIT)
            | flag(self.pre_range, PRE_RANGE_BIT)
            | flag(self.tcc, TCC_BIT)
            | flag(self.dss, DSS_BIT)
            | flag(self.msrc, MSRC_BIT)
    }
}

/// Timeouts of the enabled sequence steps.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SequenceStepTimeouts {
    /// Pre-range vcsel period in PCLKs.
    pub pre_range_vcsel_pclks: u8,
    /// Final range vcsel period in PCLKs.
    pub final_range_vcsel_pclks: u8,
    /// Shared MSRC/DSS/TCC timeout in macro clocks.
    pub msrc_dss_tcc_mclks: u8,
    /// Pre-range timeout in macro clocks.
    pub pre_range_mclks: u32,
    /// Final range timeout in macro clocks, excluding the pre-range.
    pub final_range_mclks: u32,
    /// Shared MSRC/DSS/TCC timeout in microseconds.
    pub msrc_dss_tcc_us: u32,
    /// Pre-range timeout in microseconds.
    pub pre_range_us: u32,
    /// Final range timeout in microseconds.
    pub final_range_us: u32,
}

/// Raw register contents needed to derive [`SequenceStepTimeouts`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) struct RawStepTimeouts {
    pub pre_range_vcsel_period: u8,
    pub msrc_config_timeout: u8,
    pub pre_range_timeout: u16,
    pub final_range_vcsel_period: u8,
    pub final_range_timeout: u16,
}

impl SequenceStepTimeouts {
    pub(crate) fn from_raw(
        raw: RawStepTimeouts,
        pre_range_enabled: bool,
    ) -> Self {
        let pre_range_vcsel_pclks =
            decode_vcsel_period(raw.pre_range_vcsel_period);
        let final_range_vcsel_pclks =
            decode_vcsel_period(raw.final_range_vcsel_period);
        let msrc_dss_tcc_mclks = raw.msrc_config_timeout.wrapping_add(1);

        let pre_range_mclks = decode_timeout(raw.pre_range_timeout);
        let mut final_range_mclks = decode_timeout(raw.final_range_timeout);
        // the final range timeout register includes the pre-range
        if pre_range_enabled {
            final_range_mclks =
                final_range_mclks.saturating_sub(pre_range_mclks);
        }

        SequenceStepTimeouts {
            pre_range_vcsel_pclks,
            final_range_vcsel_pclks,
            msrc_dss_tcc_mclks,
            pre_range_mclks,
            final_range_mclks,
            msrc_dss_tcc_us: timeout_mclks_to_microseconds(
                u32::from(msrc_dss_tcc_mclks),
                pre_range_vcsel_pclks,
            ),
            pre_range_us: timeout_mclks_to_microseconds(
                pre_range_mclks,
                pre_range_vcsel_pclks,
            ),
            final_range_us: timeout_mclks_to_microseconds(
                final_range_mclks,
                final_range_vcsel_pclks,
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const RAW: RawStepTimeouts = RawStepTimeouts {
        pre_range_vcsel_period: 0x06,
        msrc_config_timeout: 0x0B,
        pre_range_timeout: 0x0045,
        final_range_vcsel_period: 0x04,
        final_range_timeout: 0x01FF,
    };

    #[test]
    fn decodes_step_bits() {
        let enables = SequenceStepEnables::from_register(0xE8);
        assert_eq!(
            enables,
            SequenceStepEnables {
                tcc: false,
                dss: true,
                msrc: false,
                pre_range: true,
                final_range: true,
            }
        );

        let all = SequenceStepEnables::from_register(0xFF);
        assert!(all.tcc && all.dss && all.msrc);
        assert!(all.pre_range && all.final_range);

        // reserved bits alone enable nothing
        assert_eq!(
            SequenceStepEnables::from_register(0x23),
            SequenceStepEnables::default()
        );
    }

    #[test]
    fn apply_keeps_reserved_bits() {
        let enables = SequenceStepEnables::from_register(0xE8);
        assert_eq!(enables.apply_to(0x00), 0xC8);
        assert_eq!(enables.apply_to(0x20), 0xE8);
        assert_eq!(enables.apply_to(0xFF), 0xEB);

        let none = SequenceStepEnables::default();
        assert_eq!(none.apply_to(0xFF), 0x23);
    }

    #[test]
    fn final_range_excludes_pre_range_when_enabled() {
        let timeouts = SequenceStepTimeouts::from_raw(RAW, true);
        assert_eq!(timeouts.pre_range_vcsel_pclks, 14);
        assert_eq!(timeouts.final_range_vcsel_pclks, 10);
        assert_eq!(timeouts.msrc_dss_tcc_mclks, 12);
        assert_eq!(timeouts.msrc_dss_tcc_us, 667);
        assert_eq!(timeouts.pre_range_mclks, 70);
        assert_eq!(timeouts.pre_range_us, 3763);
        assert_eq!(timeouts.final_range_mclks, 441);
        assert_eq!(timeouts.final_range_us, 16834);

        let timeouts = SequenceStepTimeouts::from_raw(RAW, false);
        assert_eq!(timeouts.final_range_mclks, 511);
    }

    #[test]
    fn msrc_timeout_wraps_at_a_byte() {
        let raw = RawStepTimeouts {
            msrc_config_timeout: 0xFF,
            ..RAW
        };
        let timeouts = SequenceStepTimeouts::from_raw(raw, true);
        assert_eq!(timeouts.msrc_dss_tcc_mclks, 0);
    }
}
