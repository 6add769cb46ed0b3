//! Streaming RIFF/WAVE PCM decoder.
//!
//! Supports uncompressed PCM, 8-bit unsigned or 16-bit signed, mono or
//! stereo. The header is parsed in [`begin`](Decoder::begin); every
//! [`step`](Decoder::step) reads at most `budget` bytes into a fixed scratch
//! buffer and pushes the converted samples to the output.
//!
//! Once the `data` chunk is exhausted the decoder keeps consuming (and
//! discarding) trailing chunks such as `LIST`, so the source position
//! always reaches the file size and the playback controller's
//! position-vs-size check terminates the session.

use crate::app::ports::{AssetReader, AudioSink, Decoder, PcmFormat};
use crate::error::{AudioError, StorageError};

/// Largest number of source bytes consumed by one step.
pub const MAX_STEP_BYTES: usize = 1024;

/// Chunks inspected before `data` must appear.
const MAX_HEADER_CHUNKS: usize = 16;

const WAVE_FORMAT_PCM: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WavFormat {
    channels: u8,
    sample_rate: u32,
    bits_per_sample: u16,
    block_align: u16,
}

impl WavFormat {
    fn parse(raw: &[u8; 16]) -> Result<Self, AudioError> {
        let audio_format = u16::from_le_bytes([raw[0], raw[1]]);
        let channels = u16::from_le_bytes([raw[2], raw[3]]);
        let sample_rate = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let block_align = u16::from_le_bytes([raw[12], raw[13]]);
        let bits_per_sample = u16::from_le_bytes([raw[14], raw[15]]);

        if audio_format != WAVE_FORMAT_PCM {
            return Err(AudioError::UnsupportedFormat);
        }
        if !(1..=2).contains(&channels) || !matches!(bits_per_sample, 8 | 16) {
            return Err(AudioError::UnsupportedFormat);
        }
        if sample_rate == 0 || block_align != channels * bits_per_sample / 8 {
            return Err(AudioError::MalformedHeader);
        }
        Ok(Self {
            channels: channels as u8,
            sample_rate,
            bits_per_sample,
            block_align,
        })
    }
}

pub struct WavDecoder {
    format: Option<WavFormat>,
    data_remaining: u32,
    bytes: [u8; MAX_STEP_BYTES],
    samples: [i16; MAX_STEP_BYTES],
}

impl Default for WavDecoder {
    fn default() -> Self {
        Self {
            format: None,
            data_remaining: 0,
            bytes: [0; MAX_STEP_BYTES],
            samples: [0; MAX_STEP_BYTES],
        }
    }
}

impl WavDecoder {
    /// Bytes of PCM data not yet consumed.
    pub fn data_remaining(&self) -> u32 {
        self.data_remaining
    }
}

impl Decoder for WavDecoder {
    fn begin<R: AssetReader>(&mut self, source: &mut R) -> Result<PcmFormat, AudioError> {
        let mut riff = [0u8; 12];
        if read_full(source, &mut riff)? < riff.len() {
            return Err(AudioError::MalformedHeader);
        }
        if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
            return Err(AudioError::MalformedHeader);
        }

        let mut format = None;
        for _ in 0..MAX_HEADER_CHUNKS {
            let mut header = [0u8; 8];
            if read_full(source, &mut header)? < header.len() {
                return Err(AudioError::MalformedHeader);
            }
            let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            match &header[0..4] {
                b"fmt " => {
                    if len < 16 {
                        return Err(AudioError::MalformedHeader);
                    }
                    let mut raw = [0u8; 16];
                    if read_full(source, &mut raw)? < raw.len() {
                        return Err(AudioError::MalformedHeader);
                    }
                    format = Some(WavFormat::parse(&raw)?);
                    self.skip(source, padded(len) - 16)?;
                }
                b"data" => {
                    let fmt = format.ok_or(AudioError::MalformedHeader)?;
                    let available = source.size().saturating_sub(source.position());
                    self.format = Some(fmt);
                    self.data_remaining = len.min(available);
                    return Ok(PcmFormat {
                        sample_rate: fmt.sample_rate,
                        channels: fmt.channels,
                    });
                }
                _ => self.skip(source, padded(len))?,
            }
        }
        Err(AudioError::MalformedHeader)
    }

    fn step<R: AssetReader, O: AudioSink>(
        &mut self,
        source: &mut R,
        output: &mut O,
        budget: usize,
    ) -> Result<usize, AudioError> {
        let Some(fmt) = self.format else {
            return Ok(0);
        };
        let budget = budget.clamp(1, MAX_STEP_BYTES);

        if self.data_remaining == 0 {
            // Trailing chunks: consume so the position reaches the size.
            return Ok(source.read(&mut self.bytes[..budget])?);
        }

        let align = usize::from(fmt.block_align);
        let remaining = self.data_remaining as usize;
        let mut want = budget.min(remaining) / align * align;
        if want == 0 {
            // Fragment shorter than one frame at the end of `data`.
            want = budget.min(remaining);
        }

        let n = read_full(source, &mut self.bytes[..want])?;
        if n < want {
            self.data_remaining = 0;
        } else {
            self.data_remaining -= n as u32;
        }

        let whole = n - n % align;
        let count = convert(&self.bytes[..whole], fmt.bits_per_sample, &mut self.samples);
        if count > 0 {
            output.write(&self.samples[..count])?;
        }
        Ok(n)
    }

    fn stop(&mut self) {
        self.format = None;
        self.data_remaining = 0;
    }
}

// ── Internal ──────────────────────────────────────────────────

fn padded(len: u32) -> u32 {
    len.saturating_add(len & 1)
}

/// Read until `buf` is full or the source reports end of file.
fn read_full<R: AssetReader>(source: &mut R, buf: &mut [u8]) -> Result<usize, StorageError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl WavDecoder {
    fn skip<R: AssetReader>(&mut self, source: &mut R, mut len: u32) -> Result<(), AudioError> {
        while len > 0 {
            let take = (len as usize).min(MAX_STEP_BYTES);
            let n = read_full(source, &mut self.bytes[..take])?;
            if n < take {
                return Err(AudioError::MalformedHeader);
            }
            len -= n as u32;
        }
        Ok(())
    }
}

fn convert(bytes: &[u8], bits_per_sample: u16, out: &mut [i16]) -> usize {
    if bits_per_sample == 8 {
        for (dst, &b) in out.iter_mut().zip(bytes) {
            *dst = (i16::from(b) - 128) << 8;
        }
        bytes.len()
    } else {
        for (dst, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
            *dst = i16::from_le_bytes([pair[0], pair[1]]);
        }
        bytes.len() / 2
    }
}

// ── Tests ─────────────────────────────────────────────────────
