//! Track decoding
//!
//! Turns the raw bytes of an audio file into a [`DecodedTrack`]: a stereo
//! buffer at the engine sample rate plus its duration. The buffer is
//! wrapped in a `basedrop::Shared` so the render thread can drop the last
//! reference without freeing memory itself.

use std::io::Cursor;

use basedrop::Shared;
use thiserror::Error;

use crate::engine::gc::gc_handle;
use crate::types::{StereoBuffer, StereoSample, SAMPLE_RATE};

/// Track decoding errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Input is not a recognized audio container
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Container has no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// Decoding produced no samples
    #[error("Decoded track is empty")]
    Empty,

    /// The codec failed mid-stream
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// The decode task was aborted before finishing
    #[error("Decode cancelled")]
    Cancelled,
}

/// An immutable decoded track, ready to be installed on a deck
#[derive(Clone)]
pub struct DecodedTrack {
    samples: Shared<StereoBuffer>,
    sample_rate: u32,
}

impl DecodedTrack {
    /// Wrap a buffer already at `sample_rate`
    pub fn new(samples: StereoBuffer, sample_rate: u32) -> Self {
        Self {
            samples: Shared::new(&gc_handle(), samples),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Shared handle to the sample data
    pub fn samples(&self) -> &Shared<StereoBuffer> {
        &self.samples
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

impl std::fmt::Debug for DecodedTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedTrack")
            .field("frames", &self.len())
            .field("sample_rate", &self.sample_rate)
            .field("duration", &self.duration())
            .finish()
    }
}

/// Collaborator that turns raw file bytes into a decoded track
pub trait TrackDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedTrack, DecodeError>;
}

/// Default decoder backed by Symphonia
///
/// Supports every container and codec enabled in the crate features
/// (WAV, FLAC, Ogg Vorbis, MP3, AAC/M4A).
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    target_rate: u32,
}

impl SymphoniaDecoder {
    /// Decoder producing tracks at `target_rate`
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate: target_rate.max(1),
        }
    }
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

impl TrackDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedTrack, DecodeError> {
        let (frames, source_rate) = decode_stereo(bytes)?;
        if frames.is_empty() {
            return Err(DecodeError::Empty);
        }

        let frames = if source_rate != self.target_rate {
            log::debug!(
                "Resampling {} frames from {}Hz to {}Hz",
                frames.len(),
                source_rate,
                self.target_rate
            );
            resample(&frames, source_rate, self.target_rate)?
        } else {
            frames
        };

        let track = DecodedTrack::new(StereoBuffer::from_vec(frames), self.target_rate);
        log::debug!("Decoded track: {:?}", track);
        Ok(track)
    }
}

/// Decode the first audio track to stereo frames at its native rate
fn decode_stereo(bytes: &[u8]) -> Result<(Vec<StereoSample>, u32), DecodeError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    if bytes.is_empty() {
        return Err(DecodeError::UnsupportedFormat("no data".to_string()));
    }

    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let probed = symphonia::default::get_probe()
        .format(&Hint::new(), mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::UnsupportedFormat("unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut frames: Vec<StereoSample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Decoder(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Decoder(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            continue;
        }

        let needed = decoded.capacity() as u64;
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed as usize) {
            sample_buf = Some(SampleBuffer::new(needed, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            // Mono is duplicated; channels past the first two are ignored
            frames.extend(buf.samples().chunks_exact(channels).map(|frame| {
                if channels == 1 {
                    StereoSample::mono(frame[0])
                } else {
                    StereoSample::new(frame[0], frame[1])
                }
            }));
        }
    }

    Ok((frames, sample_rate))
}

/// Frames fed to the resampler per call
const RESAMPLE_CHUNK: usize = 1024;

/// Band-limited sample rate conversion with a windowed-sinc filter
///
/// Content above the lower of the two Nyquist frequencies is filtered out
/// instead of folding back into the audible band. The filter delay is
/// trimmed so the output lines up with the input and has
/// `round(len * to / from)` frames.
fn resample(input: &[StereoSample], from: u32, to: u32) -> Result<Vec<StereoSample>, DecodeError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    if input.is_empty() || from == to {
        return Ok(input.to_vec());
    }

    let ratio = to as f64 / from as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 2)
        .map_err(|e| DecodeError::Decoder(format!("resampler setup failed: {}", e)))?;

    let left: Vec<f32> = input.iter().map(|s| s.left).collect();
    let right: Vec<f32> = input.iter().map(|s| s.right).collect();

    let expected = (input.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut out_left = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
    let mut out_right = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let failed = |e: rubato::ResampleError| DecodeError::Decoder(format!("resampling failed: {}", e));

    let mut pos = 0;
    while input.len() - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let chunk = [&left[pos..pos + n], &right[pos..pos + n]];
        let out = resampler.process(&chunk[..], None).map_err(failed)?;
        out_left.extend_from_slice(&out[0]);
        out_right.extend_from_slice(&out[1]);
        pos += n;
    }
    if pos < input.len() {
        let chunk = [&left[pos..], &right[pos..]];
        let out = resampler.process_partial(Some(&chunk[..]), None).map_err(failed)?;
        out_left.extend_from_slice(&out[0]);
        out_right.extend_from_slice(&out[1]);
    }

    // Flush the tail still held in the filter
    while out_left.len() < expected + delay {
        let out = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(failed)?;
        if out[0].is_empty() {
            break;
        }
        out_left.extend_from_slice(&out[0]);
        out_right.extend_from_slice(&out[1]);
    }

    Ok(out_left
        .into_iter()
        .zip(out_right)
        .skip(delay)
        .take(expected)
        .map(|(l, r)| StereoSample::new(l, r))
        .collect())
}


#[cfg(test)]
mod tests {
    use super::test_support::sine_wav;
    use super::*;

    #[test]
    fn test_decode_stereo_wav() {
        let bytes = sine_wav(48000, 2, 4800, 440.0);
        let track = SymphoniaDecoder::new(48000).decode(&bytes).unwrap();

        assert_eq!(track.len(), 4800);
        assert_eq!(track.sample_rate(), 48000);
        assert!((track.duration() - 0.1).abs() < 1e-9);
        assert!(track.samples().peak() > 0.4);
    }

    #[test]
    fn test_decode_mono_duplicates_channels() {
        let bytes = sine_wav(48000, 1, 1000, 1000.0);
        let track = SymphoniaDecoder::default().decode(&bytes).unwrap();

        assert_eq!(track.len(), 1000);
        for s in track.samples().iter() {
            assert_eq!(s.left, s.right);
        }
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let bytes = sine_wav(44100, 2, 44100, 440.0);
        let track = SymphoniaDecoder::new(48000).decode(&bytes).unwrap();

        assert_eq!(track.sample_rate(), 48000);
        assert!((track.len() as i64 - 48000).abs() <= 1);
        assert!((track.duration() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let bytes = b"this is definitely not an audio file, just some text".to_vec();
        let result = SymphoniaDecoder::default().decode(&bytes);
        assert!(matches!(result, Err(DecodeError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_empty_input_is_unsupported() {
        let result = SymphoniaDecoder::default().decode(&[]);
        assert!(matches!(result, Err(DecodeError::UnsupportedFormat(_))));
    }

    /// Peak over the middle of the track, away from the filter edges
    fn steady_peak(track: &DecodedTrack) -> f32 {
        let samples = track.samples().as_slice();
        let edge = samples.len() / 10;
        samples[edge..samples.len() - edge]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.peak()))
    }

    #[test]
    fn test_downsampling_removes_content_above_nyquist() {
        // 30 kHz is representable at 96 kHz but not at 48 kHz
        let bytes = sine_wav(96000, 2, 96000, 30000.0);
        let track = SymphoniaDecoder::new(48000).decode(&bytes).unwrap();

        assert!((track.len() as i64 - 48000).abs() <= 1);
        assert!(steady_peak(&track) < 0.01, "aliased peak {}", steady_peak(&track));
    }

    #[test]
    fn test_downsampling_keeps_audible_content() {
        let bytes = sine_wav(96000, 2, 96000, 1000.0);
        let track = SymphoniaDecoder::new(48000).decode(&bytes).unwrap();

        let peak = steady_peak(&track);
        assert!((peak - 0.5).abs() < 0.02, "peak {}", peak);
    }

    #[test]
    fn test_resample_output_is_aligned() {
        // A step keeps its position after the filter delay is trimmed
        let mut input = vec![StereoSample::silence(); 4000];
        input.extend(vec![StereoSample::mono(0.5); 4000]);
        let out = resample(&input, 44100, 88200).unwrap();

        assert_eq!(out.len(), 16000);
        assert!(out[7000].left.abs() < 0.01);
        assert!((out[9000].left - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![StereoSample::new(0.1, -0.2); 10];
        assert_eq!(resample(&input, 48000, 48000).unwrap(), input);
    }
}
