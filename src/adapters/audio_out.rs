//! I2S audio output adapter.
//!
//! Implements [`AudioSink`] for an external I2S DAC / class-D amplifier
//! (MAX98357A style: BCLK, WS, DOUT, no MCLK).
//!
//! - **`target_os = "espidf"`**: drives the ESP-IDF 5 I2S standard-mode
//!   channel API directly. The TX channel is created on [`start`] with the
//!   stream's sample rate and slot layout, and deleted again on [`stop`],
//!   so each session gets a clock matching its ringtone.
//! - **`not(target_os = "espidf")`**: counts samples so the controllers can
//!   be exercised on the host.
//!
//! [`start`]: AudioSink::start
//! [`stop`]: AudioSink::stop

use log::info;

use crate::app::ports::{AudioSink, PcmFormat};
use crate::error::AudioError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Blocking budget for one DMA write.
#[cfg(target_os = "espidf")]
const WRITE_TIMEOUT_MS: u32 = 100;

/// GPIO numbers of the I2S bus.
#[derive(Debug, Clone, Copy)]
pub struct I2sPins {
    pub bclk: i32,
    pub ws: i32,
    pub dout: i32,
}

pub struct I2sOutput {
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    pins: I2sPins,
    format: Option<PcmFormat>,
    samples_written: u64,
    #[cfg(target_os = "espidf")]
    channel: i2s_chan_handle_t,
}

impl I2sOutput {
    pub fn new(pins: I2sPins) -> Self {
        Self {
            pins,
            format: None,
            samples_written: 0,
            #[cfg(target_os = "espidf")]
            channel: core::ptr::null_mut(),
        }
    }

    /// Format of the running stream.
    pub fn format(&self) -> Option<PcmFormat> {
        self.format
    }

    /// Samples accepted since the last `start`.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    #[cfg(target_os = "espidf")]
    fn open_channel(&mut self, format: PcmFormat) -> Result<(), AudioError> {
        let chan_cfg = i2s_chan_config_t {
            id: i2s_port_t_I2S_NUM_0,
            role: i2s_role_t_I2S_ROLE_MASTER,
            dma_desc_num: 6,
            dma_frame_num: 240,
            ..Default::default()
        };

        let mut tx: i2s_chan_handle_t = core::ptr::null_mut();
        // SAFETY: `chan_cfg` is fully initialised; no RX handle requested.
        if unsafe { i2s_new_channel(&chan_cfg, &mut tx, core::ptr::null_mut()) } != ESP_OK {
            return Err(AudioError::OutputFailed);
        }

        let mut std_cfg = i2s_std_config_t::default();
        std_cfg.clk_cfg.sample_rate_hz = format.sample_rate;
        std_cfg.clk_cfg.clk_src = soc_periph_i2s_clk_src_t_I2S_CLK_SRC_DEFAULT;
        std_cfg.clk_cfg.mclk_multiple = i2s_mclk_multiple_t_I2S_MCLK_MULTIPLE_256;
        std_cfg.slot_cfg.data_bit_width = i2s_data_bit_width_t_I2S_DATA_BIT_WIDTH_16BIT;
        std_cfg.slot_cfg.slot_bit_width = i2s_slot_bit_width_t_I2S_SLOT_BIT_WIDTH_AUTO;
        std_cfg.slot_cfg.slot_mode = if format.channels == 2 {
            i2s_slot_mode_t_I2S_SLOT_MODE_STEREO
        } else {
            i2s_slot_mode_t_I2S_SLOT_MODE_MONO
        };
        std_cfg.slot_cfg.slot_mask = i2s_std_slot_mask_t_I2S_STD_SLOT_BOTH;
        std_cfg.slot_cfg.ws_width = 16;
        std_cfg.slot_cfg.bit_shift = true; // Philips format
        std_cfg.gpio_cfg.mclk = gpio_num_t_GPIO_NUM_NC;
        std_cfg.gpio_cfg.bclk = self.pins.bclk;
        std_cfg.gpio_cfg.ws = self.pins.ws;
        std_cfg.gpio_cfg.dout = self.pins.dout;
        std_cfg.gpio_cfg.din = gpio_num_t_GPIO_NUM_NC;

        // SAFETY: `tx` was just created and is not yet enabled.
        let ok = unsafe {
            i2s_channel_init_std_mode(tx, &std_cfg) == ESP_OK && i2s_channel_enable(tx) == ESP_OK
        };
        if !ok {
            // SAFETY: `tx` is ours and never stored; it is not used after this.
            unsafe {
                i2s_del_channel(tx);
            }
            return Err(AudioError::OutputFailed);
        }
        self.channel = tx;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn close_channel(&mut self) {
        if self.channel.is_null() {
            return;
        }
        // SAFETY: the handle came from `i2s_new_channel` and is deleted once.
        unsafe {
            i2s_channel_disable(self.channel);
            i2s_del_channel(self.channel);
        }
        self.channel = core::ptr::null_mut();
    }
}

impl AudioSink for I2sOutput {
    fn start(&mut self, format: PcmFormat) -> Result<(), AudioError> {
        if self.format.is_some() {
            self.stop();
        }

        #[cfg(target_os = "espidf")]
        self.open_channel(format)?;

        info!(
            "I2S: start {} Hz, {} ch",
            format.sample_rate, format.channels
        );
        self.format = Some(format);
        self.samples_written = 0;
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        if self.format.is_none() {
            return Err(AudioError::OutputFailed);
        }

        #[cfg(target_os = "espidf")]
        {
            let bytes = core::mem::size_of_val(samples);
            let mut done: usize = 0;
            while done < bytes {
                let mut n: usize = 0;
                // SAFETY: the pointer and length describe the live `samples` slice.
                let ret = unsafe {
                    i2s_channel_write(
                        self.channel,
                        samples.as_ptr().cast::<u8>().add(done).cast(),
                        bytes - done,
                        &mut n,
                        WRITE_TIMEOUT_MS,
                    )
                };
                if ret != ESP_OK && n == 0 {
                    return Err(AudioError::OutputFailed);
                }
                done += n;
            }
        }

        self.samples_written += samples.len() as u64;
        Ok(())
    }

    fn stop(&mut self) {
        #[cfg(target_os = "espidf")]
        self.close_channel();

        if self.format.take().is_some() {
            info!("I2S: stop after {} samples", self.samples_written);
        }
    }

    fn is_running(&self) -> bool {
        self.format.is_some()
    }
}

impl Drop for I2sOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
