//! RIFF/WAVE framing for 16-bit PCM.

use podium_core::{PodiumError, Result};
use std::time::Duration;

/// Sample rate of the silence placeholder
pub const SILENCE_SAMPLE_RATE: u32 = 22_050;

const HEADER_LEN: usize = 44;

/// Frame mono/stereo 16-bit samples as a canonical 44-byte-header WAV file.
pub fn encode_wav_pcm16(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut out = Vec::with_capacity(HEADER_LEN + samples.len() * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // PCM fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // AudioFormat 1 = PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// All-zero mono PCM16 waveform of the given length.
pub fn silence_wav(duration: Duration, sample_rate: u32) -> Vec<u8> {
    let frames = (sample_rate as u128 * duration.as_millis() / 1000) as usize;
    encode_wav_pcm16(&vec![0i16; frames], sample_rate, 1)
}

/// Parsed format fields of a WAV buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Bytes of sample data actually present
    pub data_len: usize,
}

/// Check that `bytes` is a RIFF/WAVE file with a fmt chunk and non-empty sample data.
pub fn validate_wav(bytes: &[u8]) -> Result<WavInfo> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(PodiumError::ProviderFailure(format!(
            "not a RIFF/WAVE payload ({} bytes)",
            bytes.len()
        )));
    }

    let mut idx = 12;
    let mut fmt: Option<(u16, u32, u16)> = None;
    while idx + 8 <= bytes.len() {
        let chunk_id = &bytes[idx..idx + 4];
        let size = u32::from_le_bytes([bytes[idx + 4], bytes[idx + 5], bytes[idx + 6], bytes[idx + 7]])
            as usize;
        let body = idx + 8;
        if chunk_id == b"fmt " && body + 16 <= bytes.len() {
            let channels = u16::from_le_bytes([bytes[body + 2], bytes[body + 3]]);
            let sample_rate = u32::from_le_bytes([
                bytes[body + 4],
                bytes[body + 5],
                bytes[body + 6],
                bytes[body + 7],
            ]);
            let bits = u16::from_le_bytes([bytes[body + 14], bytes[body + 15]]);
            fmt = Some((channels, sample_rate, bits));
        } else if chunk_id == b"data" {
            let (channels, sample_rate, bits_per_sample) = fmt.ok_or_else(|| {
                PodiumError::ProviderFailure("WAV data chunk before fmt chunk".into())
            })?;
            // Streaming encoders may leave the size field at its maximum
            let data_len = size.min(bytes.len() - body);
            if data_len == 0 {
                return Err(PodiumError::ProviderFailure("WAV has no sample data".into()));
            }
            return Ok(WavInfo {
                channels,
                sample_rate,
                bits_per_sample,
                data_len,
            });
        }
        // Chunks are word-aligned
        idx = body.saturating_add(size).saturating_add(size & 1);
    }
    Err(PodiumError::ProviderFailure("WAV has no data chunk".into()))
}

/// Scale PCM16 samples of a WAV buffer in place by `gain`.
pub fn scale_pcm16_in_place(buf: &mut [u8], gain: f32) -> Result<()> {
    let info = validate_wav(buf)?;
    if info.bits_per_sample != 16 {
        return Ok(());
    }
    let Some(start) = find_data_start(buf) else {
        return Ok(());
    };
    let end = (start + info.data_len).min(buf.len());
    for chunk in buf[start..end].chunks_exact_mut(2) {
        let s = i16::from_le_bytes([chunk[0], chunk[1]]);
        let scaled = (s as f32 * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        let bytes = scaled.to_le_bytes();
        chunk[0] = bytes[0];
        chunk[1] = bytes[1];
    }
    Ok(())
}

fn find_data_start(buf: &[u8]) -> Option<usize> {
    let mut idx = 12;
    while idx + 8 <= buf.len() {
        let size = u32::from_le_bytes([buf[idx + 4], buf[idx + 5], buf[idx + 6], buf[idx + 7]]) as usize;
        if &buf[idx..idx + 4] == b"data" {
            return Some(idx + 8);
        }
        idx = (idx + 8).saturating_add(size).saturating_add(size & 1);
    }
    None
}
