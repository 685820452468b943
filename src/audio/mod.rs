//! Audio Decoding Module
//!
//! Loads a single audio file into a mono waveform at its native sample rate.
//! Currently focuses on WAV format support.

pub mod wav;

pub use wav::AudioClip;
