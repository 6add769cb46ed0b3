//! GPIO assignments for the chime board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// I2S amplifier (MAX98357A)
// ---------------------------------------------------------------------------

/// Bit clock.
pub const I2S_BCLK_GPIO: i32 = 26;
/// Word select (LRCLK).
pub const I2S_WS_GPIO: i32 = 25;
/// Serial data out to the amplifier's DIN.
pub const I2S_DOUT_GPIO: i32 = 22;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// On-board LED, active high.
pub const LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Setup button (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// BOOT button; a long press opens the provisioning portal.
pub const BUTTON_GPIO: i32 = 0;
