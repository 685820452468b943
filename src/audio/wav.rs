//! WAV decoding into mono clips at the native sample rate

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use hound::{SampleFormat, WavReader};
use crate::error::{EmoStressError, Result};

/// Mono waveform at its native sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioClip {
    /// Build a clip, enforcing non-empty samples and a positive rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(EmoStressError::decode("Sample rate cannot be 0"));
        }
        if samples.is_empty() {
            return Err(EmoStressError::decode("Audio contains no samples"));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(EmoStressError::decode("Audio contains non-finite samples"));
        }
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| EmoStressError::decode(format!("Cannot open audio file {}: {}", path.display(), e)))?;
        Self::decode(BufReader::new(file))
    }

    /// Decode a RIFF/WAVE stream, downmixing every channel to mono.
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        let reader = WavReader::new(reader)
            .map_err(|e| EmoStressError::decode(format!("Cannot create WAV reader: {}", e)))?;

        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(EmoStressError::decode("WAV header declares zero channels"));
        }

        let interleaved = read_interleaved(reader, spec)?;
        let samples = downmix(&interleaved, spec.channels as usize);

        log::debug!(
            "Decoded {} frames at {} Hz from {} channel(s), {}-bit {:?}",
            samples.len(), spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
        );

        Self::new(samples, spec.sample_rate)
    }
}

fn read_interleaved<R: Read>(reader: WavReader<R>, spec: hound::WavSpec) -> Result<Vec<f32>> {
    let sample_error = |e: hound::Error| EmoStressError::decode(format!("Failed to read sample: {}", e));

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.into_samples::<f32>()
            .map(|s| s.map_err(sample_error))
            .collect(),
        (SampleFormat::Int, bits @ 8..=32) => {
            let full_scale = (1u64 << (bits - 1)) as f32;
            reader.into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale).map_err(sample_error))
                .collect()
        }
        (format, bits) => Err(EmoStressError::decode(format!(
            "Unsupported sample format: {}-bit {:?}", bits, format
        ))),
    }
}

/// Average interleaved frames down to one channel.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes<F>(channels: u16, bits: u16, format: SampleFormat, write: F) -> Vec<u8>
    where
        F: FnOnce(&mut WavWriter<&mut Cursor<Vec<u8>>>),
    {
        let spec = WavSpec { channels, sample_rate: 22050, bits_per_sample: bits, sample_format: format };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            write(&mut writer);
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_int16_mono() {
        let bytes = wav_bytes(1, 16, SampleFormat::Int, |w| {
            w.write_sample(16384i16).unwrap();
            w.write_sample(-32768i16).unwrap();
        });
        let clip = AudioClip::decode(Cursor::new(bytes)).unwrap();
        assert_eq!(clip.sample_rate(), 22050);
        assert_eq!(clip.samples(), &[0.5, -1.0]);
    }

    #[test]
    fn test_decode_stereo_downmix() {
        let bytes = wav_bytes(2, 32, SampleFormat::Float, |w| {
            w.write_sample(1.0f32).unwrap();
            w.write_sample(0.0f32).unwrap();
            w.write_sample(-0.5f32).unwrap();
            w.write_sample(-0.5f32).unwrap();
        });
        let clip = AudioClip::decode(Cursor::new(bytes)).unwrap();
        assert_eq!(clip.samples(), &[0.5, -0.5]);
    }

    #[test]
    fn test_decode_24_bit() {
        let bytes = wav_bytes(1, 24, SampleFormat::Int, |w| {
            w.write_sample(1 << 22).unwrap();
        });
        let clip = AudioClip::decode(Cursor::new(bytes)).unwrap();
        assert_eq!(clip.samples(), &[0.5]);
    }

    #[test]
    fn test_empty_stream_is_decode_error() {
        let err = AudioClip::decode(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, EmoStressError::Decode { .. }));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = AudioClip::decode(Cursor::new(b"definitely not a riff header".to_vec())).unwrap_err();
        assert!(matches!(err, EmoStressError::Decode { .. }));
    }

    #[test]
    fn test_header_without_samples_is_decode_error() {
        let bytes = wav_bytes(1, 16, SampleFormat::Int, |_| {});
        let err = AudioClip::decode(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, EmoStressError::Decode { .. }));
    }

    #[test]
    fn test_truncated_data_is_decode_error() {
        let mut bytes = wav_bytes(1, 16, SampleFormat::Int, |w| {
            for i in 0..100 {
                w.write_sample(i as i16).unwrap();
            }
        });
        bytes.truncate(bytes.len() - 51);
        let err = AudioClip::decode(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, EmoStressError::Decode { .. }));
    }

    #[test]
    fn test_clip_invariants() {
        assert!(AudioClip::new(vec![], 16000).is_err());
        assert!(AudioClip::new(vec![0.0], 0).is_err());
        assert!(AudioClip::new(vec![f32::NAN], 16000).is_err());
        let clip = AudioClip::new(vec![0.0; 8000], 16000).unwrap();
        assert_eq!(clip.duration(), 0.5);
    }
}
