//! vl53l0x -- Time of Flight IR distance sensor.
//!
//! Datasheet: <https://www.st.com/resource/en/datasheet/vl53l0x.pdf>
//!
//! Single-shot ranging driver. A sensor is opened with [`VL53L0x::new`] (which
//! checks the model id), calibrated once with [`VL53L0x::init`] and then read
//! with [`VL53L0x::range`].
//!
//! ```rust,no_run
//! use vl53l0x_rangefinder::VL53L0x;
//!
//! let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! let mut sensor = VL53L0x::new(i2c).unwrap();
//! sensor.init().unwrap();
//! sensor.set_measurement_timing_budget(33_000).unwrap();
//! let millimeters = sensor.range().unwrap();
//! # let _ = millimeters;
//! ```
//!
//! # Polling
//!
//! Calibration and ranging busy-poll status registers. With the default
//! [`PollLimit::Unbounded`] these loops never give up, so a sensor that stops
//! answering with the expected status hangs the caller. Set
//! [`Config::poll_limit`] to [`PollLimit::Attempts`] to get [`Error::Timeout`]
//! instead. After a timeout the device may be left mid-sequence and should be
//! opened and initialized again.

#![deny(missing_docs)]
#![no_std]

mod fmt; // <-- must be first module!

mod budget;
pub mod register;
pub mod sequence;
pub mod spad;
pub mod timeout;

use cast::u16;
use hal::i2c::I2c;

pub use budget::MIN_TIMING_BUDGET_US;
pub use register::Register;
pub use sequence::{SequenceStepEnables, SequenceStepTimeouts};
pub use spad::SpadInfo;

use register::{
    DEFAULT_TUNING_SETTINGS, INIT_PREAMBLE, MODEL_ID, PAGE_RESTORE, PAGE_SELECT,
    STOP_VARIABLE,
};
use sequence::RawStepTimeouts;

/// Default 7-bit I2C address of the sensor.
pub const DEFAULT_ADDRESS: u8 = 0x29;

// Largest register block written in one transfer (the reference SPAD map).
const MAX_WRITE_LEN: usize = 6;

/// VL53L0X driver.
pub struct VL53L0x<I2C: I2c> {
    com: I2C,
    address: u8,
    config: Config,
    state: State,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Opened,
    Initialized { stop_variable: u8 },
}

/// Driver errors.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// Model id register returned an unexpected value (returned value is
    /// argument).
    DeviceNotFound(u8),
    /// Underlying bus error.
    BusError(E),
    /// Ranging was requested before a successful [`VL53L0x::init`].
    NotInitialized,
    /// Signal rate limit below 0 MCPS.
    LimitTooLow,
    /// Signal rate limit above 511.99 MCPS.
    LimitTooHigh,
    /// Timing budget below [`MIN_TIMING_BUDGET_US`].
    BudgetTooSmall,
    /// Timing budget leaves no room for the final range step.
    BudgetTooBig,
    /// A status poll exceeded the configured [`PollLimit`].
    Timeout,
    /// I2C address not valid, needs to be between 0x08 and 0x77.
    /// It is a 7 bit address thus the range is 0x00 - 0x7F but
    /// 0x00 - 0x07 and 0x78 - 0x7F are reserved I2C addresses and cannot be
    /// used.
    InvalidAddress(u8),
    /// Register write longer than the driver can send in one transfer.
    InvalidLength(usize),
}

impl<E> core::convert::From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::BusError(error)
    }
}

/// How long status polls keep reading before giving up.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum PollLimit {
    /// Poll until the device reports the expected status, however long it
    /// takes.
    #[default]
    Unbounded,
    /// Fail with [`Error::Timeout`] after this many unsuccessful reads.
    Attempts(u32),
}

impl PollLimit {
    fn exhausted(self, polls: u32) -> bool {
        match self {
            PollLimit::Unbounded => false,
            PollLimit::Attempts(max) => polls >= max,
        }
    }
}

/// Driver configuration.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// 7-bit device address.
    pub address: u8,
    /// Bound on status polls during calibration and ranging.
    pub poll_limit: PollLimit,
    /// Switch the sensor I/O from 1V8 to 2V8 during [`VL53L0x::init`].
    pub io_mode_2v8: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: DEFAULT_ADDRESS,
            poll_limit: PollLimit::Unbounded,
            io_mode_2v8: false,
        }
    }
}

impl<I2C, E> VL53L0x<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Opens the sensor at the default address.
    pub fn new(i2c: I2C) -> Result<VL53L0x<I2C>, Error<E>> {
        VL53L0x::with_address(i2c, DEFAULT_ADDRESS)
    }

    /// Opens the sensor at the given address.
    pub fn with_address(
        i2c: I2C,
        address: u8,
    ) -> Result<VL53L0x<I2C>, Error<E>> {
        VL53L0x::with_config(
            i2c,
            Config {
                address,
                ..Config::default()
            },
        )
    }

    /// Opens the sensor described by `config` and checks its model id.
    ///
    /// The returned driver still has to be initialized with [`VL53L0x::init`].
    pub fn with_config(
        i2c: I2C,
        config: Config,
    ) -> Result<VL53L0x<I2C>, Error<E>> {
        let mut chip = VL53L0x {
            com: i2c,
            address: config.address,
            config,
            state: State::Opened,
        };

        let model_id = chip.model_id()?;
        if model_id == MODEL_ID {
            debug!("vl53l0x found at {}", chip.address);
            Ok(chip)
        } else {
            warn!("unexpected model id {} at {}", model_id, chip.address);
            Err(Error::DeviceNotFound(model_id))
        }
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.com
    }

    /// Current device address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Whether [`VL53L0x::init`] completed.
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Initialized { .. })
    }

    /// Changes the I2C address of the sensor.
    /// Note that the address resets when the device is powered off.
    /// Only allows values between 0x08 and 0x77 as the device uses a 7 bit
    /// address and 0x00 - 0x07 and 0x78 - 0x7F are reserved
    pub fn set_address(&mut self, new_address: u8) -> Result<(), Error<E>> {
        if !(0x08..=0x77).contains(&new_address) {
            return Err(Error::InvalidAddress(new_address));
        }
        self.write_reg(Register::I2C_SLAVE_DEVICE_ADDRESS, new_address & 0x7F)?;
        self.address = new_address;

        Ok(())
    }

    /// Reads the model id, 0xEE for a VL53L0X.
    pub fn model_id(&mut self) -> Result<u8, Error<E>> {
        self.read_reg(Register::IDENTIFICATION_MODEL_ID)
    }

    /// Reads the silicon revision id.
    pub fn revision_id(&mut self) -> Result<u8, Error<E>> {
        self.read_reg(Register::IDENTIFICATION_REVISION_ID)
    }

    /// Reads one register.
    pub fn read_register(&mut self, reg: u8) -> Result<u8, Error<E>> {
        let mut data: [u8; 1] = [0];
        self.com.write_read(self.address, &[reg], &mut data)?;
        Ok(data[0])
    }

    /// Writes one register.
    pub fn write_register(
        &mut self,
        reg: u8,
        byte: u8,
    ) -> Result<(), Error<E>> {
        self.com.write(self.address, &[reg, byte])?;
        Ok(())
    }

    /// Reads `buffer.len()` consecutive registers starting at `reg`.
    pub fn read_registers(
        &mut self,
        reg: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.com.write_read(self.address, &[reg], buffer)?;
        Ok(())
    }

    /// Writes `bytes` to consecutive registers starting at `reg`, at most 6
    /// bytes.
    pub fn write_registers(
        &mut self,
        reg: u8,
        bytes: &[u8],
    ) -> Result<(), Error<E>> {
        if bytes.len() > MAX_WRITE_LEN {
            return Err(Error::InvalidLength(bytes.len()));
        }
        let mut buffer = [0u8; MAX_WRITE_LEN + 1];
        buffer[0] = reg;
        buffer[1..=bytes.len()].copy_from_slice(bytes);
        self.com.write(self.address, &buffer[..=bytes.len()])?;
        Ok(())
    }

    fn read_reg(&mut self, reg: Register) -> Result<u8, Error<E>> {
        self.read_register(reg.addr())
    }

    fn write_reg(&mut self, reg: Register, byte: u8) -> Result<(), Error<E>> {
        self.write_register(reg.addr(), byte)
    }

    fn read_6bytes(&mut self, reg: Register) -> Result<[u8; 6], Error<E>> {
        let mut ret: [u8; 6] = Default::default();
        self.read_registers(reg.addr(), &mut ret)?;

        Ok(ret)
    }

    fn read_16bit(&mut self, reg: Register) -> Result<u16, Error<E>> {
        let mut buffer: [u8; 2] = [0, 0];
        self.read_registers(reg.addr(), &mut buffer)?;
        Ok((u16(buffer[0]) << 8) + u16(buffer[1]))
    }

    fn write_16bit(
        &mut self,
        reg: Register,
        word: u16,
    ) -> Result<(), Error<E>> {
        self.write_registers(reg.addr(), &word.to_be_bytes())
    }

    fn write_sequence(
        &mut self,
        sequence: &[(u8, u8)],
    ) -> Result<(), Error<E>> {
        for &(reg, byte) in sequence {
            self.write_register(reg, byte)?;
        }
        Ok(())
    }

    // Reads `reg` until `ready` accepts its value.
    fn poll_register<F>(&mut self, reg: u8, ready: F) -> Result<u8, Error<E>>
    where
        F: Fn(u8) -> bool,
    {
        let mut polls: u32 = 0;
        loop {
            let value = self.read_register(reg)?;
            if ready(value) {
                return Ok(value);
            }
            polls = polls.saturating_add(1);
            if self.config.poll_limit.exhausted(polls) {
                warn!("register {} not ready after {} reads", reg, polls);
                return Err(Error::Timeout);
            }
        }
    }

    /// Sets the final range return signal rate limit in MCPS (million counts
    /// per second).
    pub fn set_signal_rate_limit(
        &mut self,
        limit_mcps: f64,
    ) -> Result<(), Error<E>> {
        if limit_mcps < 0.0 || limit_mcps.is_nan() {
            return Err(Error::LimitTooLow);
        }
        if limit_mcps > 511.99 {
            return Err(Error::LimitTooHigh);
        }
        // Q9.7 fixed point format (9 integer bits, 7 fractional bits)
        self.write_16bit(
            Register::FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT,
            (limit_mcps * f64::from(1u8 << 7)) as u16,
        )
    }

    fn get_spad_info(&mut self) -> Result<SpadInfo, Error<E>> {
        self.write_sequence(PAGE_SELECT)?;

        self.write_register(0xFF, 0x06)?;
        let mut tmp83 = self.read_register(0x83)?;
        self.write_register(0x83, tmp83 | 0x04)?;
        self.write_register(0xFF, 0x07)?;
        self.write_register(0x81, 0x01)?;

        self.write_register(0x80, 0x01)?;

        self.write_register(0x94, 0x6b)?;
        self.write_register(0x83, 0x00)?;

        self.poll_register(0x83, |value| value != 0x00)?;

        self.write_register(0x83, 0x01)?;
        let info = SpadInfo::from_register(self.read_register(0x92)?);

        self.write_register(0x81, 0x00)?;
        self.write_register(0xFF, 0x06)?;
        tmp83 = self.read_register(0x83)?;
        self.write_register(0x83, tmp83 & !0x04)?;
        self.write_register(0xFF, 0x01)?;
        self.write_register(0x00, 0x01)?;

        self.write_register(0xFF, 0x00)?;
        self.write_register(0x80, 0x00)?;

        Ok(info)
    }

    // VL53L0X_set_reference_spads(), assuming the NVM values are valid
    fn set_reference_spads(
        &mut self,
        info: SpadInfo,
    ) -> Result<(), Error<E>> {
        // The SPAD map (RefGoodSpadMap) is read by
        // VL53L0X_get_info_from_device() in the API, but the same data seems
        // to be more easily readable from GLOBAL_CONFIG_SPAD_ENABLES_REF_0
        // through _6, so read it from there
        let ref_spad_map =
            self.read_6bytes(Register::GLOBAL_CONFIG_SPAD_ENABLES_REF_0)?;

        self.write_register(0xFF, 0x01)?;
        self.write_reg(Register::DYNAMIC_SPAD_REF_EN_START_OFFSET, 0x00)?;
        self.write_reg(Register::DYNAMIC_SPAD_NUM_REQUESTED_REF_SPAD, 0x2C)?;
        self.write_register(0xFF, 0x00)?;
        self.write_reg(Register::GLOBAL_CONFIG_REF_EN_START_SELECT, 0xB4)?;

        let ref_spad_map =
            spad::compute_spad_map(ref_spad_map, info.count, info.is_aperture);
        debug!(
            "reference spads: count {}, aperture {}",
            info.count,
            info.is_aperture
        );

        self.write_registers(
            Register::GLOBAL_CONFIG_SPAD_ENABLES_REF_0.addr(),
            &ref_spad_map,
        )
    }

    // performSingleRefCalibration(uint8_t vhvInitByte)
    fn perform_single_ref_calibration(
        &mut self,
        vhv_init_byte: u8,
    ) -> Result<(), Error<E>> {
        // VL53L0X_REG_SYSRANGE_MODE_START_STOP
        self.write_reg(Register::SYSRANGE_START, 0x01 | vhv_init_byte)?;
        self.poll_register(
            Register::RESULT_INTERRUPT_STATUS.addr(),
            |status| (status & 0x07) != 0,
        )?;
        self.write_reg(Register::SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        self.write_reg(Register::SYSRANGE_START, 0x00)?;

        Ok(())
    }

    /// Loads the calibration and tuning settings. Required once before
    /// [`VL53L0x::range`].
    ///
    /// Calling it on an initialized driver runs the whole sequence again and
    /// reloads the stop variable. The driver counts as uninitialized from the
    /// first bus access on, so any failure (bus error or poll
    /// [`Error::Timeout`]) leaves it uninitialized until a later `init`
    /// succeeds.
    pub fn init(&mut self) -> Result<(), Error<E>> {
        self.state = State::Opened;

        // VL53L0X_DataInit() begin

        // Sensor uses 1V8 mode for I/O by default; switch to 2V8 mode if
        // necessary
        if self.config.io_mode_2v8 {
            // set bit 0
            let ext_sup_hv =
                self.read_reg(Register::VHV_CONFIG_PAD_SCL_SDA__EXTSUP_HV)?;
            self.write_reg(
                Register::VHV_CONFIG_PAD_SCL_SDA__EXTSUP_HV,
                ext_sup_hv | 0x01,
            )?;
        }

        // "Set I2C standard mode"
        self.write_sequence(INIT_PREAMBLE)?;
        let stop_variable = self.read_register(STOP_VARIABLE)?;
        self.write_sequence(PAGE_RESTORE)?;

        // disable SIGNAL_RATE_MSRC (bit 1) and SIGNAL_RATE_PRE_RANGE (bit 4)
        // limit checks
        let config = self.read_reg(Register::MSRC_CONFIG_CONTROL)?;
        self.write_reg(Register::MSRC_CONFIG_CONTROL, config | 0x12)?;

        // set final range signal rate limit to 0.25 MCPS (million counts per
        // second)
        self.set_signal_rate_limit(0.25)?;

        self.write_reg(Register::SYSTEM_SEQUENCE_CONFIG, 0xFF)?;

        // VL53L0X_DataInit() end

        // VL53L0X_StaticInit() begin

        let spad_info = self.get_spad_info()?;
        self.set_reference_spads(spad_info)?;

        // DefaultTuningSettings from vl53l0x_tuning.h
        self.write_sequence(DEFAULT_TUNING_SETTINGS)?;

        // "Set interrupt config to new sample ready"
        self.write_reg(Register::SYSTEM_INTERRUPT_CONFIG_GPIO, 0x04)?;
        // active low
        let high = self.read_reg(Register::GPIO_HV_MUX_ACTIVE_HIGH)?;
        self.write_reg(Register::GPIO_HV_MUX_ACTIVE_HIGH, high & !0x10)?;
        self.write_reg(Register::SYSTEM_INTERRUPT_CLEAR, 0x01)?;

        // "Disable MSRC and TCC by default"
        let budget_microseconds = self.get_measurement_timing_budget()?;
        self.write_reg(Register::SYSTEM_SEQUENCE_CONFIG, 0xE8)?;

        // "Recalculate timing budget"
        self.set_measurement_timing_budget(budget_microseconds)?;

        // VL53L0X_StaticInit() end

        // VL53L0X_PerformRefCalibration() begin

        // vhv calibration
        self.write_reg(Register::SYSTEM_SEQUENCE_CONFIG, 0x01)?;
        self.perform_single_ref_calibration(0x40)?;

        // phase calibration
        self.write_reg(Register::SYSTEM_SEQUENCE_CONFIG, 0x02)?;
        self.perform_single_ref_calibration(0x00)?;

        // "restore the previous Sequence Config"
        self.write_reg(Register::SYSTEM_SEQUENCE_CONFIG, 0xE8)?;

        // VL53L0X_PerformRefCalibration() end

        self.state = State::Initialized { stop_variable };
        info!(
            "vl53l0x at {} initialized, budget {} us",
            self.address,
            budget_microseconds
        );
        Ok(())
    }

    /// Triggers a single-shot measurement and waits until the sensor has
    /// started it.
    ///
    /// Fails with [`Error::NotInitialized`] before any bus traffic if
    /// [`VL53L0x::init`] has not completed.
    pub fn start_range(&mut self) -> Result<(), Error<E>> {
        let stop_variable = match self.state {
            State::Initialized { stop_variable } => stop_variable,
            State::Opened => return Err(Error::NotInitialized),
        };

        self.write_sequence(PAGE_SELECT)?;
        self.write_register(STOP_VARIABLE, stop_variable)?;
        self.write_sequence(PAGE_RESTORE)?;

        self.write_reg(Register::SYSRANGE_START, 0x01)?;

        // "Wait until start bit has been cleared"
        self.poll_register(Register::SYSRANGE_START.addr(), |start| {
            (start & 0x01) == 0
        })?;
        Ok(())
    }

    /// reads and returns range measurement or nb::Error::WouldBlock if it's
    /// not ready yet
    pub fn read_range_mm(&mut self) -> nb::Result<u16, Error<E>> {
        if !self.is_initialized() {
            return Err(nb::Error::Other(Error::NotInitialized));
        }
        let status = self.read_reg(Register::RESULT_INTERRUPT_STATUS)?;
        if (status & 0x07) == 0 {
            return Err(nb::Error::WouldBlock);
        }
        let range = self.read_16bit(Register::RESULT_RANGE_STATUS_plus_10);
        // clear even when the read failed
        self.write_reg(Register::SYSTEM_INTERRUPT_CLEAR, 0x01)?;

        Ok(range?)
    }

    /// Performs a single-shot measurement and returns the distance in
    /// millimeters.
    ///
    /// Assumes the default linearity gain and disabled fractional ranging.
    pub fn range(&mut self) -> Result<u16, Error<E>> {
        self.start_range()?;

        let mut polls: u32 = 0;
        loop {
            match self.read_range_mm() {
                Ok(millimeters) => {
                    trace!("range {} mm", millimeters);
                    return Ok(millimeters);
                }
                Err(nb::Error::WouldBlock) => {
                    polls = polls.saturating_add(1);
                    if self.config.poll_limit.exhausted(polls) {
                        warn!("no range result after {} reads", polls);
                        return Err(Error::Timeout);
                    }
                }
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
    }

    /// Reads which sequence steps are enabled.
    pub fn get_sequence_step_enables(
        &mut self,
    ) -> Result<SequenceStepEnables, Error<E>> {
        let sequence_config =
            self.read_reg(Register::SYSTEM_SEQUENCE_CONFIG)?;
        Ok(SequenceStepEnables::from_register(sequence_config))
    }

    /// Enables or disables sequence steps and reapplies the current timing
    /// budget.
    pub fn set_sequence_step_enables(
        &mut self,
        enables: SequenceStepEnables,
    ) -> Result<(), Error<E>> {
        let budget_microseconds = self.get_measurement_timing_budget()?;
        let sequence_config =
            self.read_reg(Register::SYSTEM_SEQUENCE_CONFIG)?;
        self.write_reg(
            Register::SYSTEM_SEQUENCE_CONFIG,
            enables.apply_to(sequence_config),
        )?;
        self.set_measurement_timing_budget(budget_microseconds)
    }

    /// Reads the timeouts of the sequence steps.
    pub fn get_sequence_step_timeouts(
        &mut self,
        enables: &SequenceStepEnables,
    ) -> Result<SequenceStepTimeouts, Error<E>> {
        let pre_range_vcsel_period =
            self.read_reg(Register::PRE_RANGE_CONFIG_VCSEL_PERIOD)?;
        let msrc_config_timeout =
            self.read_reg(Register::MSRC_CONFIG_TIMEOUT_MACROP)?;
        let pre_range_timeout =
            self.read_16bit(Register::PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI)?;
        let final_range_vcsel_period =
            self.read_reg(Register::FINAL_RANGE_CONFIG_VCSEL_PERIOD)?;
        let final_range_timeout =
            self.read_16bit(Register::FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI)?;

        Ok(SequenceStepTimeouts::from_raw(
            RawStepTimeouts {
                pre_range_vcsel_period,
                msrc_config_timeout,
                pre_range_timeout,
                final_range_vcsel_period,
                final_range_timeout,
            },
            enables.pre_range,
        ))
    }

    /// Returns the measurement timing budget in microseconds.
    ///
    /// Saturates at `u32::MAX` when the step timeouts read back are too large
    /// to add up.
    pub fn get_measurement_timing_budget(&mut self) -> Result<u32, Error<E>> {
        let enables = self.get_sequence_step_enables()?;
        let timeouts = self.get_sequence_step_timeouts(&enables)?;
        Ok(budget::measurement_timing_budget_us(&enables, &timeouts))
    }

    /// Sets the measurement timing budget in microseconds by resizing the
    /// final range step.
    pub fn set_measurement_timing_budget(
        &mut self,
        budget_microseconds: u32,
    ) -> Result<(), Error<E>> {
        if budget_microseconds < MIN_TIMING_BUDGET_US {
            return Err(Error::BudgetTooSmall);
        }

        let enables = self.get_sequence_step_enables()?;
        let timeouts = self.get_sequence_step_timeouts(&enables)?;

        let final_range_timeout_mclks = budget::final_range_timeout_mclks(
            budget_microseconds,
            &enables,
            &timeouts,
        )?;
        if let Some(mclks) = final_range_timeout_mclks {
            self.write_16bit(
                Register::FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI,
                timeout::encode_timeout(mclks),
            )?;
        }

        debug!("timing budget set to {} us", budget_microseconds);
        Ok(())
    }
}
