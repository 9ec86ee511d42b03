//! Clip decoding (WAV via hound, MP3 via minimp3) to mono f32

use std::io::Read;
use std::path::Path;

use crate::{Error, Result};

/// Decoded mono audio
pub struct Decoded {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a clip by extension
///
/// # Errors
///
/// Returns error if the file is unreadable, empty, or not WAV/MP3
pub fn decode_file(path: &Path) -> Result<Decoded> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let decoded = match extension.as_str() {
        "wav" => {
            let reader = hound::WavReader::open(path).map_err(|e| clip_error(path, &e))?;
            decode_wav(reader).map_err(|e| clip_error(path, &e))?
        }
        "mp3" => {
            let mut data = Vec::new();
            std::fs::File::open(path)?.read_to_end(&mut data)?;
            decode_mp3(&data).map_err(|e| clip_error(path, &e))?
        }
        other => {
            return Err(Error::SoundLibrary(format!(
                "unsupported clip format '{other}': {}",
                path.display()
            )));
        }
    };

    if decoded.samples.is_empty() || decoded.sample_rate == 0 {
        return Err(Error::SoundLibrary(format!(
            "clip has no audio: {}",
            path.display()
        )));
    }

    Ok(decoded)
}

fn clip_error(path: &Path, e: &dyn std::fmt::Display) -> Error {
    Error::SoundLibrary(format!("failed to decode {}: {e}", path.display()))
}

#[allow(clippy::cast_precision_loss)]
fn decode_wav<R: Read>(mut reader: hound::WavReader<R>) -> std::result::Result<Decoded, hound::Error> {
    let spec = reader.spec();
    let channels = usize::from(spec.channels).max(1);

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    Ok(Decoded {
        samples: downmix(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

/// Decode MP3 using minimp3
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn decode_mp3(mp3_data: &[u8]) -> std::result::Result<Decoded, minimp3::Error> {
    let mut decoder = minimp3::Decoder::new(mp3_data);
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = 0_u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                let channels = frame.channels.max(1);
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&pcm, channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(Decoded {
        samples,
        sample_rate,
    })
}

#[allow(clippy::cast_precision_loss)]
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
