//! Decoding impulse responses with Symphonia.
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use symphonia::core::{
    audio::{AudioBuffer, Signal},
    codecs::CODEC_TYPE_NULL,
    errors::Error as SymphoniaError,
    io::{MediaSource, MediaSourceStream},
    probe::Hint,
};

use super::LoadError;

/// Where to load an impulse response from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImpulseSource {
    /// Encoded bytes, for example a resource compiled into the host.
    Memory(Arc<[u8]>),
    File(PathBuf),
}

/// A decoded impulse response, at its own sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImpulse {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl LoadedImpulse {
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }
}

/// Check if this error is the end of the stream.
///
/// Symphonia reports the end as an `UnexpectedEof` I/O error.  Our sources are only ever in-memory buffers and files,
/// so nothing else produces that.
fn err_is_eof(err: &SymphoniaError) -> bool {
    matches!(err, SymphoniaError::IoError(i) if i.kind() == std::io::ErrorKind::UnexpectedEof)
}

/// Decode all of the first audio track.
pub fn decode(source: &ImpulseSource) -> Result<LoadedImpulse, LoadError> {
    let mut hint = Hint::new();
    let media: Box<dyn MediaSource> = match source {
        ImpulseSource::Memory(bytes) => Box::new(Cursor::new(bytes.clone())),
        ImpulseSource::File(path) => {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                hint.with_extension(ext);
            }
            Box::new(std::fs::File::open(path)?)
        }
    };

    let stream = MediaSourceStream::new(media, Default::default());
    let mut format = symphonia::default::get_probe()
        .format(&hint, stream, &Default::default(), &Default::default())?
        .format;

    // We always decode the first decodable track, and cannot if there aren't any.
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(LoadError::NoAudioTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &Default::default())?;

    let mut channels: Vec<Vec<f32>> = vec![];

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(e) if err_is_eof(&e) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt packet loses its samples, but the rest of the stream may be fine.
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet in impulse response: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut buffer: AudioBuffer<f32> = decoded.make_equivalent();
        decoded.convert(&mut buffer);

        let spec = *buffer.spec();
        sample_rate.get_or_insert(spec.rate);
        if channels.is_empty() {
            channels = vec![vec![]; spec.channels.count()];
        }
        for (c, dest) in channels.iter_mut().enumerate() {
            dest.extend_from_slice(buffer.chan(c));
        }
    }

    let sample_rate = sample_rate.ok_or(LoadError::UnknownSampleRate)?;
    if channels.is_empty() {
        return Err(LoadError::NoAudioTrack);
    }

    log::debug!(
        "Decoded impulse response: {} channels, {} frames at {} Hz",
        channels.len(),
        channels[0].len(),
        sample_rate
    );

    Ok(LoadedImpulse {
        sample_rate,
        channels,
    })
}
