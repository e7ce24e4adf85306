//! # Decode Adapters
//!
//! A single pipeline serves every upload format. What differs per format is
//! only how bytes become samples, so that step sits behind the
//! [`AudioDecoder`] trait and a [`DecoderRegistry`] picks the adapter by the
//! clip's format tag.
//!
//! ## Adapters:
//! - **SymphoniaDecoder**: pure Rust demux + decode, fully in memory
//! - **FfmpegDecoder** (`transcode.rs`): WebM/Opus via an external ffmpeg

use crate::audio::resample::{downmix, resample};
use crate::audio::{AudioClip, AudioFormat, FfmpegDecoder, Waveform, TARGET_SAMPLE_RATE};
use crate::config::DecodeConfig;
use crate::pipeline::error::{DecodeError, PipelineError};
use std::collections::HashMap;
use std::any::Any;
use std::io::{Cursor, ErrorKind};
use std::ops::RangeInclusive;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Capability to turn an [`AudioClip`] into a 16 kHz mono [`Waveform`].
///
/// Implementations must be stateless between calls; the same adapter
/// instance may serve several requests at once from the blocking pool.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, clip: &AudioClip) -> Result<Waveform, PipelineError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Source sample rates accepted from a container header.
///
/// The header value is attacker controlled; a tiny rate would make the
/// resampler expand a small upload into gigabytes of samples.
pub const SOURCE_RATE_RANGE: RangeInclusive<u32> = 4_000..=384_000;

/// Default cap on decoded clip length (seconds).
pub const DEFAULT_MAX_DURATION_SECONDS: f64 = 600.0;

/// In-memory decoder backed by symphonia.
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    max_duration_seconds: f64,
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self { max_duration_seconds: DEFAULT_MAX_DURATION_SECONDS }
    }

    pub fn from_config(config: &DecodeConfig) -> Self {
        Self::new().with_max_duration(config.max_duration_seconds)
    }

    pub fn with_max_duration(mut self, seconds: f64) -> Self {
        self.max_duration_seconds = seconds;
        self
    }

    pub fn max_duration_seconds(&self) -> f64 {
        self.max_duration_seconds
    }

    /// Decode a complete container held in memory.
    ///
    /// ## Steps:
    /// 1. Open the container (format tag used as a hint)
    /// 2. Pick the first track with a real codec and a plausible sample rate
    /// 3. Decode every packet, downmixing each block to mono
    /// 4. Resample the result to [`TARGET_SAMPLE_RATE`]
    ///
    /// Corrupt packets are skipped; anything structural is a [`DecodeError`].
    /// symphonia panics on some malformed headers (a zero sample rate, for
    /// one); those panics are reported as container errors too.
    pub fn decode_bytes(&self, data: Vec<u8>, format: AudioFormat) -> Result<Waveform, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }

        let (mono, source_rate) = panic::catch_unwind(AssertUnwindSafe(|| self.read_mono(data, format)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(format = %format, message = %message, "Decoder panicked on malformed input");
                Err(DecodeError::Container { format, message })
            })?;

        let samples = resample(&mono, source_rate, TARGET_SAMPLE_RATE)?;
        Ok(Waveform::new(samples, TARGET_SAMPLE_RATE))
    }

    /// Demux and decode the first audio track into mono samples at the
    /// container's own rate.
    fn read_mono(&self, data: Vec<u8>, format: AudioFormat) -> Result<(Vec<f32>, u32), DecodeError> {
        let container_error = |e: SymphoniaError| DecodeError::Container { format, message: e.to_string() };

        let source = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        let probed = symphonia::default::get_probe()
            .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(container_error)?;
        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack { format })?;
        let track_id = track.id;
        let source_rate = track.codec_params.sample_rate.ok_or(DecodeError::MissingSampleRate)?;
        if !SOURCE_RATE_RANGE.contains(&source_rate) {
            return Err(DecodeError::UnsupportedSampleRate(source_rate));
        }
        let max_frames = (self.max_duration_seconds * source_rate as f64) as usize;

        let mut codec = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedCodec { format, message: e.to_string() })?;

        let mut mono = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(container_error(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match codec.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let channels = spec.channels.count();
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    mono.extend(downmix(buffer.samples(), channels));
                }
                Err(SymphoniaError::DecodeError(reason)) => {
                    skipped_packets += 1;
                    warn!(format = %format, reason, "Skipping undecodable packet");
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(container_error(e)),
            }

            if mono.len() > max_frames {
                return Err(DecodeError::TooLong { limit_seconds: self.max_duration_seconds });
            }
        }

        if mono.is_empty() {
            return Err(DecodeError::NoSamples);
        }

        debug!(
            format = %format,
            source_rate,
            samples = mono.len(),
            skipped_packets,
            "Decoded audio track"
        );

        Ok((mono, source_rate))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("malformed stream: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("malformed stream: {}", message)
    } else {
        "malformed stream".to_string()
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, clip: &AudioClip) -> Result<Waveform, PipelineError> {
        Ok(self.decode_bytes(clip.data.clone(), clip.format)?)
    }

    fn name(&self) -> &'static str {
        "symphonia"
    }
}

/// Routes each [`AudioFormat`] to the adapter that handles it.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<AudioFormat, Arc<dyn AudioDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry; every format is unsupported until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock adapters: symphonia for everything it can
    /// decode natively, ffmpeg for WebM.
    pub fn with_defaults(config: &DecodeConfig) -> Self {
        let symphonia: Arc<dyn AudioDecoder> = Arc::new(SymphoniaDecoder::from_config(config));
        let mut registry = Self::new();
        for format in [AudioFormat::Wav, AudioFormat::Flac, AudioFormat::Ogg, AudioFormat::Mp3] {
            registry.register(format, symphonia.clone());
        }
        registry.register(AudioFormat::WebM, Arc::new(FfmpegDecoder::from_config(config)));
        registry
    }

    /// Install (or replace) the adapter for a format.
    pub fn register(&mut self, format: AudioFormat, decoder: Arc<dyn AudioDecoder>) {
        self.decoders.insert(format, decoder);
    }

    pub fn supports(&self, format: AudioFormat) -> bool {
        self.decoders.contains_key(&format)
    }

    pub fn decode(&self, clip: &AudioClip) -> Result<Waveform, PipelineError> {
        let decoder = self
            .decoders
            .get(&clip.format)
            .ok_or(DecodeError::NoDecoder(clip.format))?;
        debug!(format = %clip.format, decoder = decoder.name(), bytes = clip.data.len(), "Decoding clip");
        decoder.decode(clip)
    }
}
