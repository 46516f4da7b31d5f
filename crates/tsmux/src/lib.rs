//! Copy-only MPEG-TS to fragmented MP4 transmux.
//!
//! Takes the ordered transport-stream segments of one HLS rendition and
//! produces a single fMP4 byte stream: H.264 access units become AVCC
//! samples, ADTS audio becomes raw AAC, and every source segment maps to
//! one `moof`+`mdat` fragment. No codec data is re-encoded.

mod adts;
mod avc;
mod error;
mod fmp4;
mod packet;
mod pes;
mod psi;

pub use error::MuxError;
pub use fmp4::TIMESCALE;

use tracing::debug;

use crate::adts::AudioConfig;
use crate::avc::VideoConfig;
use crate::fmp4::{Sample, TrackConfig, TrackFragment, TrackInit};
use crate::packet::{PACKET_SIZE, PID_NULL, PID_PAT, TsPacket};
use crate::pes::{PesAssembler, PesUnit};

const VIDEO_TRACK_ID: u32 = 1;
const AUDIO_TRACK_ID: u32 = 2;
/// Fallback video sample duration when a stream carries a single access
/// unit: 40 ms at 90 kHz.
const DEFAULT_VIDEO_DURATION: u32 = 3600;

/// Transmuxes ordered TS segments into one fragmented MP4 stream.
pub fn transmux<S: AsRef<[u8]>>(segments: &[S]) -> Result<Vec<u8>, MuxError> {
    let mut demuxer = Demuxer::default();
    for segment in segments {
        demuxer.push_segment(segment.as_ref())?;
    }
    demuxer.finish()
}

#[derive(Default)]
struct Demuxer {
    pmt_pid: Option<u16>,
    streams: psi::ProgramMap,
    video_asm: PesAssembler,
    audio_asm: PesAssembler,
    video_units: Vec<PesUnit>,
    audio_frames: Vec<Vec<u8>>,
    audio_config: Option<AudioConfig>,
    first_audio_pts: Option<u64>,
    /// Cumulative (video unit, audio frame) counts at each segment end.
    boundaries: Vec<(usize, usize)>,
}

impl Demuxer {
    fn push_segment(&mut self, data: &[u8]) -> Result<(), MuxError> {
        for raw in data.chunks_exact(PACKET_SIZE) {
            self.push_packet(raw)?;
        }
        // HLS segments are PES-aligned, so the trailing units close here.
        if let Some(unit) = self.video_asm.finish()? {
            self.video_units.push(unit);
        }
        if let Some(unit) = self.audio_asm.finish()? {
            self.push_audio_unit(unit)?;
        }
        self.boundaries
            .push((self.video_units.len(), self.audio_frames.len()));
        Ok(())
    }

    fn push_packet(&mut self, raw: &[u8]) -> Result<(), MuxError> {
        let pkt = TsPacket::parse(raw)?;
        let Some(payload) = pkt.payload else {
            return Ok(());
        };
        if pkt.pid == PID_NULL {
            return Ok(());
        }

        if pkt.pid == PID_PAT && pkt.payload_unit_start {
            self.pmt_pid = Some(psi::parse_pat(payload)?);
        } else if Some(pkt.pid) == self.pmt_pid && pkt.payload_unit_start {
            self.streams = psi::parse_pmt(payload)?;
        } else if Some(pkt.pid) == self.streams.video_pid {
            if let Some(unit) = self.video_asm.push(payload, pkt.payload_unit_start)? {
                self.video_units.push(unit);
            }
        } else if Some(pkt.pid) == self.streams.audio_pid
            && let Some(unit) = self.audio_asm.push(payload, pkt.payload_unit_start)?
        {
            self.push_audio_unit(unit)?;
        }
        Ok(())
    }

    fn push_audio_unit(&mut self, unit: PesUnit) -> Result<(), MuxError> {
        let (config, frames) = adts::split_frames(&unit.data)?;
        self.audio_config.get_or_insert(config);
        if self.first_audio_pts.is_none() {
            self.first_audio_pts = unit.pts;
        }
        self.audio_frames.extend(frames);
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, MuxError> {
        let video = VideoTrack::build(&self.video_units)?;
        let audio = AudioTrack::build(self.audio_config, self.audio_frames, self.first_audio_pts);
        if video.is_none() && audio.is_none() {
            return Err(MuxError::NoStreams);
        }
        debug!(
            video_samples = video.as_ref().map(|v| v.samples.len()).unwrap_or(0),
            audio_samples = audio.as_ref().map(|a| a.samples.len()).unwrap_or(0),
            fragments = self.boundaries.len(),
            "transmux assembled"
        );

        // Shared zero point keeps the tracks in sync.
        let base = [
            video.as_ref().and_then(|v| v.times.first().copied()),
            audio.as_ref().map(|a| a.start_pts),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(0);

        let mut tracks = Vec::new();
        if let Some(v) = &video {
            tracks.push(TrackInit {
                id: VIDEO_TRACK_ID,
                config: TrackConfig::Video(v.config.clone()),
            });
        }
        if let Some(a) = &audio {
            tracks.push(TrackInit {
                id: AUDIO_TRACK_ID,
                config: TrackConfig::Audio(a.config),
            });
        }

        let mut out = fmp4::init_segment(&tracks);
        let mut sequence = 0u32;
        let (mut video_done, mut audio_done) = (0usize, 0usize);
        for &(video_end, audio_end) in &self.boundaries {
            let mut fragments = Vec::new();
            if let Some(v) = &video
                && video_done < video_end
            {
                fragments.push(TrackFragment {
                    track_id: VIDEO_TRACK_ID,
                    base_decode_time: v.times[video_done].saturating_sub(base),
                    samples: &v.samples[video_done..video_end],
                });
            }
            if let Some(a) = &audio
                && audio_done < audio_end
            {
                let first_pts =
                    a.start_pts + audio_done as u64 * u64::from(a.config.frame_duration_90k());
                fragments.push(TrackFragment {
                    track_id: AUDIO_TRACK_ID,
                    base_decode_time: first_pts.saturating_sub(base),
                    samples: &a.samples[audio_done..audio_end],
                });
            }
            if !fragments.is_empty() {
                sequence += 1;
                out.extend_from_slice(&fmp4::media_segment(sequence, &fragments));
            }
            video_done = video_end;
            audio_done = audio_end;
        }
        Ok(out)
    }
}

struct VideoTrack {
    config: VideoConfig,
    samples: Vec<Sample>,
    /// Decode time of each sample, pre-normalization.
    times: Vec<u64>,
}

impl VideoTrack {
    fn build(units: &[PesUnit]) -> Result<Option<Self>, MuxError> {
        if units.is_empty() {
            return Ok(None);
        }

        let mut sps = None;
        let mut pps = None;
        let mut samples = Vec::with_capacity(units.len());
        let mut times = Vec::with_capacity(units.len());
        let mut last_time = 0u64;

        for unit in units {
            for nal in avc::split_annexb(&unit.data) {
                match avc::nal_type(nal) {
                    avc::NAL_SPS if sps.is_none() => sps = Some(nal.to_vec()),
                    avc::NAL_PPS if pps.is_none() => pps = Some(nal.to_vec()),
                    _ => {}
                }
            }

            let dts = unit.dts.or(unit.pts).unwrap_or(last_time);
            let pts = unit.pts.unwrap_or(dts);
            last_time = dts;
            times.push(dts);
            samples.push(Sample {
                data: avc::annexb_to_sample(&unit.data),
                duration: 0, // filled from decode-time deltas below
                composition_offset: pts.wrapping_sub(dts) as i32,
                keyframe: avc::contains_idr(&unit.data),
            });
        }

        for i in 0..samples.len() {
            samples[i].duration = match times.get(i + 1) {
                Some(&next) if next > times[i] => (next - times[i]) as u32,
                _ if i > 0 => samples[i - 1].duration,
                _ => DEFAULT_VIDEO_DURATION,
            };
        }

        let (Some(sps), Some(pps)) = (sps, pps) else {
            return Err(MuxError::MalformedAvc("missing parameter sets"));
        };
        Ok(Some(Self {
            config: VideoConfig::from_parameter_sets(sps, pps)?,
            samples,
            times,
        }))
    }
}

struct AudioTrack {
    config: AudioConfig,
    samples: Vec<Sample>,
    start_pts: u64,
}

impl AudioTrack {
    fn build(config: Option<AudioConfig>, frames: Vec<Vec<u8>>, first_pts: Option<u64>) -> Option<Self> {
        let config = config?;
        if frames.is_empty() {
            return None;
        }
        let duration = config.frame_duration_90k();
        let samples = frames
            .into_iter()
            .map(|data| Sample {
                data,
                duration,
                composition_offset: 0,
                keyframe: true,
            })
            .collect();
        Some(Self {
            config,
            samples,
            start_pts: first_pts.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SYNC_BYTE;

    /// Packs a PES payload into transport packets on one PID, stuffing
    /// the final packet through its adaptation field.
    fn ts_packets(pid: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cc = 0u8;
        for (i, chunk) in payload.chunks(PACKET_SIZE - 4).enumerate() {
            let pusi = if i == 0 { 0x40 } else { 0x00 };
            out.push(SYNC_BYTE);
            out.push(pusi | (pid >> 8) as u8);
            out.push(pid as u8);
            if chunk.len() == PACKET_SIZE - 4 {
                out.push(0x10 | cc);
            } else {
                out.push(0x30 | cc);
                let field_len = PACKET_SIZE - 5 - chunk.len();
                out.push(field_len as u8);
                if field_len > 0 {
                    out.push(0x00);
                    out.extend(std::iter::repeat_n(0xFF, field_len - 1));
                }
            }
            out.extend_from_slice(chunk);
            cc = (cc + 1) & 0x0F;
        }
        out
    }

    /// One PSI section in a single packet, 0xFF-padded.
    fn psi_packet(pid: u16, section: &[u8]) -> Vec<u8> {
        let mut pkt = vec![SYNC_BYTE, 0x40 | (pid >> 8) as u8, pid as u8, 0x10];
        pkt.extend_from_slice(section);
        pkt.resize(PACKET_SIZE, 0xFF);
        pkt
    }

    /// An audio-only segment: PAT, PMT, then one PES unit carrying two
    /// ADTS frames.
    fn audio_segment(pts: u64, payloads: [&[u8]; 2]) -> Vec<u8> {
        let mut stream = adts::build::adts_frame(payloads[0]);
        stream.extend_from_slice(&adts::build::adts_frame(payloads[1]));
        let pes = pes::build::pes_unit(Some(pts), None, &stream);

        let mut segment = psi_packet(PID_PAT, &psi::build::pat_payload(0x1000));
        segment.extend_from_slice(&psi_packet(0x1000, &psi::build::pmt_payload(&[(0x0F, 0x0101)])));
        segment.extend_from_slice(&ts_packets(0x0101, &pes));
        segment
    }

    fn box_tags(data: &[u8]) -> Vec<(String, usize, usize)> {
        let mut tags = Vec::new();
        let mut pos = 0;
        while pos + 8 <= data.len() {
            let size = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
            let tag = String::from_utf8_lossy(&data[pos + 4..pos + 8]).into_owned();
            assert!(size >= 8 && pos + size <= data.len(), "box {tag} overruns");
            tags.push((tag, pos, size));
            pos += size;
        }
        tags
    }

    // 44.1 kHz frame duration in 90 kHz ticks.
    const FRAME_DUR: u64 = 1024 * 90000 / 44100;

    #[test]
    fn audio_only_segments_transmux_to_fragmented_mp4() {
        let segments = [
            audio_segment(90000, [&[0x01; 30], &[0x02; 30]]),
            audio_segment(90000 + 2 * FRAME_DUR, [&[0x03; 30], &[0x04; 30]]),
        ];
        let out = transmux(&segments).unwrap();

        let tags = box_tags(&out);
        let names: Vec<&str> = tags.iter().map(|(t, _, _)| t.as_str()).collect();
        assert_eq!(names, ["ftyp", "moov", "moof", "mdat", "moof", "mdat"]);

        // Frame payloads land in the mdats in order, headers stripped.
        let (_, mdat1_pos, mdat1_len) = &tags[3];
        let mdat1 = &out[mdat1_pos + 8..mdat1_pos + mdat1_len];
        assert_eq!(mdat1.len(), 60);
        assert_eq!(&mdat1[..30], &[0x01; 30]);
        assert_eq!(&mdat1[30..], &[0x02; 30]);
        let (_, mdat2_pos, _) = &tags[4 + 1];
        assert_eq!(out[mdat2_pos + 8], 0x03);
    }

    #[test]
    fn second_fragment_decode_time_advances_by_frames() {
        let segments = [
            audio_segment(90000, [&[0x01; 8], &[0x02; 8]]),
            audio_segment(90000 + 2 * FRAME_DUR, [&[0x03; 8], &[0x04; 8]]),
        ];
        let out = transmux(&segments).unwrap();

        // tfdt payloads: version 1, 64-bit base decode time.
        let decode_times: Vec<u64> = out
            .windows(4)
            .enumerate()
            .filter(|&(_, w)| w == b"tfdt")
            .map(|(pos, _)| u64::from_be_bytes(out[pos + 8..pos + 16].try_into().unwrap()))
            .collect();
        assert_eq!(decode_times, vec![0, 2 * FRAME_DUR]);
    }

    #[test]
    fn packet_garbage_is_rejected() {
        let segment = vec![0x00u8; PACKET_SIZE * 2];
        assert!(matches!(
            transmux(&[segment]),
            Err(MuxError::MissingSyncByte)
        ));
    }

    #[test]
    fn segments_without_streams_are_rejected() {
        let segment = psi_packet(PID_PAT, &psi::build::pat_payload(0x1000));
        assert!(matches!(transmux(&[segment]), Err(MuxError::NoStreams)));
    }
}
