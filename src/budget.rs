//! Measurement timing budget arithmetic.

use crate::sequence::{SequenceStepEnables, SequenceStepTimeouts};
use crate::timeout::timeout_microseconds_to_mclks;
use crate::Error;

/// Smallest budget accepted by `set_measurement_timing_budget`.
pub const MIN_TIMING_BUDGET_US: u32 = 20_000;

const END_OVERHEAD: u32 = 960;
const MSRC_OVERHEAD: u32 = 660;
const TCC_OVERHEAD: u32 = 590;
const DSS_OVERHEAD: u32 = 690;
const PRE_RANGE_OVERHEAD: u32 = 660;
const FINAL_RANGE_OVERHEAD: u32 = 550;

// Phase time plus its fixed overhead, saturating on absurd register values.
fn step_us(timeout_us: u32, overhead: u32) -> u32 {
    timeout_us.saturating_add(overhead)
}

// uint32_t VL53L0X::getMeasurementTimingBudget()
pub(crate) fn measurement_timing_budget_us(
    enables: &SequenceStepEnables,
    timeouts: &SequenceStepTimeouts,
) -> u32 {
    let start_overhead: u32 = 1910;
    let msrc_dss_tcc_us = timeouts.msrc_dss_tcc_us;

    // "Start and end overhead times always present"
    let mut budget_microseconds = start_overhead + END_OVERHEAD;
    if enables.tcc {
        budget_microseconds = budget_microseconds
            .saturating_add(step_us(msrc_dss_tcc_us, TCC_OVERHEAD));
    }
    // the read side charges DSS once with the TCC overhead, unlike the
    // write side
    if enables.dss {
        budget_microseconds = budget_microseconds
            .saturating_add(step_us(msrc_dss_tcc_us, TCC_OVERHEAD));
    } else if enables.msrc {
        budget_microseconds = budget_microseconds
            .saturating_add(step_us(msrc_dss_tcc_us, MSRC_OVERHEAD));
    }
    if enables.pre_range {
        budget_microseconds = budget_microseconds
            .saturating_add(step_us(timeouts.pre_range_us, PRE_RANGE_OVERHEAD));
    }
    if enables.final_range {
        budget_microseconds = budget_microseconds.saturating_add(step_us(
            timeouts.final_range_us,
            FINAL_RANGE_OVERHEAD,
        ));
    }

    budget_microseconds
}

/// Solves for the final range timeout, in macro clocks, that makes the whole
/// sequence fit in `budget_microseconds`.
///
/// Returns `None` when the final range step is disabled.
pub(crate) fn final_range_timeout_mclks<E>(
    budget_microseconds: u32,
    enables: &SequenceStepEnables,
    timeouts: &SequenceStepTimeouts,
) -> Result<Option<u32>, Error<E>> {
    // note that these are different than values in get_
    let start_overhead: u32 = 1320;
    let msrc_dss_tcc_us = timeouts.msrc_dss_tcc_us;

    let mut use_budget_microseconds = start_overhead + END_OVERHEAD;
    if enables.tcc {
        use_budget_microseconds = use_budget_microseconds
            .saturating_add(step_us(msrc_dss_tcc_us, TCC_OVERHEAD));
    }
    if enables.dss {
        use_budget_microseconds = use_budget_microseconds.saturating_add(
            step_us(msrc_dss_tcc_us, DSS_OVERHEAD).saturating_mul(2),
        );
    } else if enables.msrc {
        use_budget_microseconds = use_budget_microseconds
            .saturating_add(step_us(msrc_dss_tcc_us, MSRC_OVERHEAD));
    }
    if enables.pre_range {
        use_budget_microseconds = use_budget_microseconds
            .saturating_add(step_us(timeouts.pre_range_us, PRE_RANGE_OVERHEAD));
    }

    if !enables.final_range {
        return Ok(None);
    }

    use_budget_microseconds =
        use_budget_microseconds.saturating_add(FINAL_RANGE_OVERHEAD);

    // "Note that the final range timeout is determined by the timing
    // budget and the sum of all other timeouts within the sequence.
    // If there is no room for the final range timeout, then an error
    // will be set. Otherwise the remaining time will be applied to
    // the final range."
    if use_budget_microseconds > budget_microseconds {
        return Err(Error::BudgetTooBig);
    }

    let final_range_timeout_microseconds =
        budget_microseconds - use_budget_microseconds;

    // "For the final range timeout, the pre-range timeout
    // must be added. To do this both final and pre-range
    // timeouts must be expressed in macro periods MClks
    // because they have different vcsel periods."
    let mut final_range_timeout_mclks = timeout_microseconds_to_mclks(
        final_range_timeout_microseconds,
        timeouts.final_range_vcsel_pclks,
    );
    if enables.pre_range {
        final_range_timeout_mclks =
            final_range_timeout_mclks.saturating_add(timeouts.pre_range_mclks);
    }

    Ok(Some(final_range_timeout_mclks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::tests::RAW;
    use crate::sequence::RawStepTimeouts;

    fn timeouts() -> SequenceStepTimeouts {
        SequenceStepTimeouts::from_raw(RAW, true)
    }

    #[test]
    fn budget_of_default_sequence() {
        let enables = SequenceStepEnables::from_register(0xE8);
        assert_eq!(measurement_timing_budget_us(&enables, &timeouts()), 25934);
    }

    #[test]
    fn budget_with_every_step_enabled() {
        let enables = SequenceStepEnables::from_register(0xFF);
        assert_eq!(measurement_timing_budget_us(&enables, &timeouts()), 27191);
    }

    #[test]
    fn budget_with_msrc_but_no_dss() {
        let enables = SequenceStepEnables {
            msrc: true,
            ..SequenceStepEnables::default()
        };
        // 1910 + 960 + 667 + 660
        assert_eq!(measurement_timing_budget_us(&enables, &timeouts()), 4197);
    }

    #[test]
    fn final_range_gets_the_remaining_budget() {
        let enables = SequenceStepEnables::from_register(0xE8);
        let timeouts = timeouts();
        let mclks = final_range_timeout_mclks::<()>(27191, &enables, &timeouts);
        assert_eq!(mclks, Ok(Some(522)));

        let mclks = final_range_timeout_mclks::<()>(20000, &enables, &timeouts);
        assert_eq!(mclks, Ok(Some(333)));
    }

    #[test]
    fn budget_too_big_when_other_steps_use_it_up() {
        let raw = RawStepTimeouts {
            pre_range_timeout: 0x05FF,
            final_range_timeout: 0x06FF,
            ..RAW
        };
        let timeouts = SequenceStepTimeouts::from_raw(raw, true);
        let enables = SequenceStepEnables::from_register(0xFF);
        assert_eq!(
            final_range_timeout_mclks::<()>(20000, &enables, &timeouts),
            Err(Error::BudgetTooBig)
        );
    }

    #[test]
    fn exact_fit_leaves_zero_final_range_time() {
        let enables = SequenceStepEnables::from_register(0xE8);
        // 1320 + 960 + 2 * (667 + 690) + 3763 + 660 + 550
        let mclks =
            final_range_timeout_mclks::<()>(9967, &enables, &timeouts());
        assert_eq!(mclks, Ok(Some(70)));
        assert_eq!(
            final_range_timeout_mclks::<()>(9966, &enables, &timeouts()),
            Err(Error::BudgetTooBig)
        );
    }

    #[test]
    fn huge_final_range_timeout_saturates_the_budget() {
        let raw = RawStepTimeouts {
            final_range_timeout: 0x13FF,
            ..RAW
        };
        let timeouts = SequenceStepTimeouts::from_raw(raw, true);
        assert_eq!(timeouts.final_range_us, u32::MAX);

        let enables = SequenceStepEnables::from_register(0xE8);
        assert_eq!(measurement_timing_budget_us(&enables, &timeouts), u32::MAX);
    }

    #[test]
    fn huge_pre_range_timeout_is_too_big_for_any_budget() {
        let raw = RawStepTimeouts {
            pre_range_timeout: 0x13FF,
            final_range_timeout: 0x13FF,
            ..RAW
        };
        let timeouts = SequenceStepTimeouts::from_raw(raw, true);
        assert_eq!(timeouts.pre_range_us, u32::MAX);

        let enables = SequenceStepEnables::from_register(0xFF);
        assert_eq!(measurement_timing_budget_us(&enables, &timeouts), u32::MAX);
        assert_eq!(
            final_range_timeout_mclks::<()>(u32::MAX - 1, &enables, &timeouts),
            Err(Error::BudgetTooBig)
        );
    }

    #[test]
    fn nothing_to_solve_without_final_range() {
        let enables = SequenceStepEnables {
            final_range: false,
            ..SequenceStepEnables::from_register(0xE8)
        };
        assert_eq!(
            final_range_timeout_mclks::<()>(20000, &enables, &timeouts()),
            Ok(None)
        );
    }
}
