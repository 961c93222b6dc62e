//! Register map and the fixed register sequences written during setup.

/// Named VL53L0X registers used by the driver.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// Start/stop of a ranging operation.
    SYSRANGE_START = 0x00,
    /// Enabled sequence steps (TCC, DSS, MSRC, pre-range, final-range).
    SYSTEM_SEQUENCE_CONFIG = 0x01,
    /// Interrupt source selection.
    SYSTEM_INTERRUPT_CONFIG_GPIO = 0x0A,
    /// Writing 0x01 clears the pending interrupt.
    SYSTEM_INTERRUPT_CLEAR = 0x0B,
    /// Interrupt status, low 3 bits set when a result is ready.
    RESULT_INTERRUPT_STATUS = 0x13,
    /// Distance in millimeters, big-endian, inside the result block.
    RESULT_RANGE_STATUS_plus_10 = 0x1E,
    /// Final range signal rate limit, Q9.7 fixed point.
    FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT = 0x44,
    /// MSRC/DSS/TCC timeout in macro periods minus one.
    MSRC_CONFIG_TIMEOUT_MACROP = 0x46,
    /// Pre-range vcsel period, encoded.
    PRE_RANGE_CONFIG_VCSEL_PERIOD = 0x50,
    /// Pre-range timeout, encoded, high byte.
    PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI = 0x51,
    /// Dynamic SPAD count requested for the reference array.
    DYNAMIC_SPAD_NUM_REQUESTED_REF_SPAD = 0x4E,
    /// First reference SPAD used by dynamic selection.
    DYNAMIC_SPAD_REF_EN_START_OFFSET = 0x4F,
    /// Limit check enables.
    MSRC_CONFIG_CONTROL = 0x60,
    /// Final range vcsel period, encoded.
    FINAL_RANGE_CONFIG_VCSEL_PERIOD = 0x70,
    /// Final range timeout, encoded, high byte.
    FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI = 0x71,
    /// Interrupt pin polarity (bit 4).
    GPIO_HV_MUX_ACTIVE_HIGH = 0x84,
    /// I/O voltage select, bit 0 set for 2V8.
    VHV_CONFIG_PAD_SCL_SDA__EXTSUP_HV = 0x89,
    /// 7-bit device address.
    I2C_SLAVE_DEVICE_ADDRESS = 0x8A,
    /// Reference SPAD enables, 6 bytes.
    GLOBAL_CONFIG_SPAD_ENABLES_REF_0 = 0xB0,
    /// Reference SPAD start select.
    GLOBAL_CONFIG_REF_EN_START_SELECT = 0xB6,
    /// Model id, reads 0xEE on a VL53L0X.
    IDENTIFICATION_MODEL_ID = 0xC0,
    /// Silicon revision.
    IDENTIFICATION_REVISION_ID = 0xC2,
}

impl Register {
    /// Register address on the bus.
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Expected value of [`Register::IDENTIFICATION_MODEL_ID`].
pub const MODEL_ID: u8 = 0xEE;

/// Raw register holding the stop variable on the private page.
pub(crate) const STOP_VARIABLE: u8 = 0x91;

// I2C standard mode followed by the private page select.
pub(crate) const INIT_PREAMBLE: &[(u8, u8)] =
    &[(0x88, 0x00), (0x80, 0x01), (0xFF, 0x01), (0x00, 0x00)];

pub(crate) const PAGE_SELECT: &[(u8, u8)] =
    &[(0x80, 0x01), (0xFF, 0x01), (0x00, 0x00)];

pub(crate) const PAGE_RESTORE: &[(u8, u8)] =
    &[(0x00, 0x01), (0xFF, 0x00), (0x80, 0x00)];

/// DefaultTuningSettings from vl53l0x_tuning.h.
pub(crate) const DEFAULT_TUNING_SETTINGS: &[(u8, u8)] = &[
    (0xFF, 0x01),
    (0x00, 0x00),
    (0xFF, 0x00),
    (0x09, 0x00),
    (0x10, 0x00),
    (0x11, 0x00),
    (0x24, 0x01),
    (0x25, 0xFF),
    (0x75, 0x00),
    (0xFF, 0x01),
    (0x4E, 0x2C),
    (0x48, 0x00),
    (0x30, 0x20),
    (0xFF, 0x00),
    (0x30, 0x09),
    (0x54, 0x00),
    (0x31, 0x04),
    (0x32, 0x03),
    (0x40, 0x83),
    (0x46, 0x25),
    (0x60, 0x00),
    (0x27, 0x00),
    (0x50, 0x06),
    (0x51, 0x00),
    (0x52, 0x96),
    (0x56, 0x08),
    (0x57, 0x30),
    (0x61, 0x00),
    (0x62, 0x00),
    (0x64, 0x00),
    (0x65, 0x00),
    (0x66, 0xA0),
    (0xFF, 0x01),
    (0x22, 0x32),
    (0x47, 0x14),
    (0x49, 0xFF),
    (0x4A, 0x00),
    (0xFF, 0x00),
    (0x7A, 0x0A),
    (0x7B, 0x00),
    (0x78, 0x21),
    (0xFF, 0x01),
    (0x23, 0x34),
    (0x42, 0x00),
    (0x44, 0xFF),
    (0x45, 0x26),
    (0x46, 0x05),
    (0x40, 0x40),
    (0x0E, 0x06),
    (0x20, 0x1A),
    (0x43, 0x40),
    (0xFF, 0x00),
    (0x34, 0x03),
    (0x35, 0x44),
    (0xFF, 0x01),
    (0x31, 0x04),
    (0x4B, 0x09),
    (0x4C, 0x05),
    (0x4D, 0x04),
    (0xFF, 0x00),
    (0x44, 0x00),
    (0x45, 0x20),
    (0x47, 0x08),
    (0x48, 0x28),
    (0x67, 0x00),
    (0x70, 0x04),
    (0x71, 0x01),
    (0x72, 0xFE),
    (0x76, 0x00),
    (0x77, 0x00),
    (0xFF, 0x01),
    (0x0D, 0x01),
    (0xFF, 0x00),
    (0x80, 0x01),
    (0x01, 0xF8),
    (0xFF, 0x01),
    (0x8E, 0x01),
    (0x00, 0x01),
    (0xFF, 0x00),
    (0x80, 0x00),
];
