//! Fuzz target: `WavDecoder`
//!
//! Feeds arbitrary files through header parsing and a full play-out and
//! asserts that the decoder never panics, never consumes past the end of
//! the file, and always terminates.
//!
//! cargo fuzz run fuzz_wav_decoder

#![no_main]

use chime::app::ports::{AssetReader, AudioSink, Decoder, PcmFormat};
use chime::audio::WavDecoder;
use chime::error::{AudioError, StorageError};
use libfuzzer_sys::fuzz_target;

struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl AssetReader for SliceReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn position(&self) -> u32 {
        self.pos as u32
    }

    fn size(&self) -> u32 {
        self.data.len() as u32
    }
}

struct NullSink;

impl AudioSink for NullSink {
    fn start(&mut self, _format: PcmFormat) -> Result<(), AudioError> {
        Ok(())
    }
    fn write(&mut self, _samples: &[i16]) -> Result<(), AudioError> {
        Ok(())
    }
    fn stop(&mut self) {}
    fn is_running(&self) -> bool {
        true
    }
}

fuzz_target!(|data: &[u8]| {
    let mut source = SliceReader { data, pos: 0 };
    let mut decoder = WavDecoder::default();
    if decoder.begin(&mut source).is_err() {
        return;
    }

    let mut sink = NullSink;
    // Every productive step consumes at least one byte.
    for _ in 0..=data.len() {
        match decoder.step(&mut source, &mut sink, 512) {
            Ok(0) | Err(_) => break,
            Ok(_) => assert!(source.pos <= data.len()),
        }
    }
    decoder.stop();
});
