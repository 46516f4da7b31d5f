use crate::error::MuxError;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Fixed AAC parameters lifted from the first ADTS header; the fMP4 side
/// needs them for the `esds` decoder config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    /// MPEG-4 audio object type (ADTS profile + 1).
    pub object_type: u8,
    pub sampling_freq_index: u8,
    pub channel_config: u8,
}

impl AudioConfig {
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES
            .get(self.sampling_freq_index as usize)
            .copied()
            .unwrap_or(48000)
    }

    /// Two-byte AudioSpecificConfig carried inside `esds`.
    pub fn audio_specific_config(&self) -> [u8; 2] {
        [
            (self.object_type << 3) | (self.sampling_freq_index >> 1),
            ((self.sampling_freq_index & 0x01) << 7) | (self.channel_config << 3),
        ]
    }

    /// Duration of one AAC frame (1024 PCM samples) in 90 kHz ticks.
    pub fn frame_duration_90k(&self) -> u32 {
        (1024u64 * 90000 / u64::from(self.sample_rate())) as u32
    }
}

/// Splits an ADTS elementary stream into raw AAC frames, headers stripped.
pub fn split_frames(data: &[u8]) -> Result<(AudioConfig, Vec<Vec<u8>>), MuxError> {
    let mut config = None;
    let mut frames = Vec::new();
    let mut pos = 0;

    while pos + 7 <= data.len() {
        let h = &data[pos..];
        if h[0] != 0xFF || h[1] & 0xF0 != 0xF0 {
            return Err(MuxError::MalformedAdts("lost sync"));
        }
        let protection_absent = h[1] & 0x01 != 0;
        let header_len = if protection_absent { 7 } else { 9 };
        let frame_len = (usize::from(h[3] & 0x03) << 11)
            | (usize::from(h[4]) << 3)
            | (usize::from(h[5]) >> 5);
        if frame_len < header_len || pos + frame_len > data.len() {
            return Err(MuxError::MalformedAdts("frame length past stream"));
        }

        let parsed = AudioConfig {
            object_type: (h[2] >> 6) + 1,
            sampling_freq_index: (h[2] >> 2) & 0x0F,
            channel_config: ((h[2] & 0x01) << 2) | (h[3] >> 6),
        };
        config.get_or_insert(parsed);

        frames.push(data[pos + header_len..pos + frame_len].to_vec());
        pos += frame_len;
    }

    match config {
        Some(config) if pos == data.len() => Ok((config, frames)),
        Some(_) => Err(MuxError::MalformedAdts("trailing bytes")),
        None => Err(MuxError::MalformedAdts("no frames")),
    }
}

#[cfg(test)]
pub(crate) mod build {
    /// An ADTS frame: AAC-LC, 44.1 kHz, stereo, no CRC.
    pub fn adts_frame(payload: &[u8]) -> Vec<u8> {
        let frame_len = 7 + payload.len();
        let mut frame = vec![
            0xFF,
            0xF1, // MPEG-4, no CRC
            0x50, // profile AAC-LC (1), freq index 4
            0x80 | ((frame_len >> 11) as u8 & 0x03), // channel config 2
            (frame_len >> 3) as u8,
            ((frame_len as u8 & 0x07) << 5) | 0x1F,
            0xFC,
        ];
        frame.extend_from_slice(payload);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_consecutive_frames() {
        let mut stream = build::adts_frame(&[1, 2, 3]);
        stream.extend_from_slice(&build::adts_frame(&[4, 5]));

        let (config, frames) = split_frames(&stream).unwrap();
        assert_eq!(config.object_type, 2); // AAC-LC
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.channel_config, 2);
        assert_eq!(frames, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn audio_specific_config_packs_fields() {
        let config = AudioConfig {
            object_type: 2,
            sampling_freq_index: 4,
            channel_config: 2,
        };
        // 00010 0100 0010 000 -> 0x12 0x10
        assert_eq!(config.audio_specific_config(), [0x12, 0x10]);
    }

    #[test]
    fn frame_duration_is_1024_samples() {
        let config = AudioConfig {
            object_type: 2,
            sampling_freq_index: 3, // 48000
            channel_config: 2,
        };
        assert_eq!(config.frame_duration_90k(), 1920);
    }

    #[test]
    fn lost_sync_is_an_error() {
        assert!(matches!(
            split_frames(&[0x00; 16]),
            Err(MuxError::MalformedAdts("lost sync"))
        ));
    }

    #[test]
    fn truncated_final_frame_is_an_error() {
        let stream = build::adts_frame(&[1, 2, 3]);
        assert!(split_frames(&stream[..stream.len() - 1]).is_err());
    }
}
