//! Fragmented MP4 writer: one `ftyp`+`moov` init segment, then
//! `moof`+`mdat` pairs. Both tracks run on the 90 kHz transport
//! timescale so timestamps carry over without rescaling.

use bytes::{BufMut, BytesMut};

use crate::adts::AudioConfig;
use crate::avc::VideoConfig;

pub const TIMESCALE: u32 = 90000;

const SAMPLE_FLAG_SYNC: u32 = 0x0200_0000;
const SAMPLE_FLAG_NON_SYNC: u32 = 0x0101_0000;

/// One media sample ready for a track run.
#[derive(Debug, Clone)]
pub struct Sample {
    pub data: Vec<u8>,
    /// Decode duration in 90 kHz ticks.
    pub duration: u32,
    /// PTS minus DTS, for reordered video.
    pub composition_offset: i32,
    pub keyframe: bool,
}

#[derive(Debug, Clone)]
pub enum TrackConfig {
    Video(VideoConfig),
    Audio(AudioConfig),
}

#[derive(Debug, Clone)]
pub struct TrackInit {
    pub id: u32,
    pub config: TrackConfig,
}

/// One track's contribution to a media fragment.
#[derive(Debug)]
pub struct TrackFragment<'a> {
    pub track_id: u32,
    pub base_decode_time: u64,
    pub samples: &'a [Sample],
}

fn boxed(out: &mut BytesMut, tag: &[u8; 4], body: impl FnOnce(&mut BytesMut)) {
    let start = out.len();
    out.put_u32(0);
    out.put_slice(tag);
    body(out);
    let size = (out.len() - start) as u32;
    out[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

fn full_box(out: &mut BytesMut, tag: &[u8; 4], version: u8, flags: u32, body: impl FnOnce(&mut BytesMut)) {
    boxed(out, tag, |out| {
        out.put_u32((u32::from(version) << 24) | (flags & 0x00FF_FFFF));
        body(out);
    });
}

const MATRIX_IDENTITY: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

pub fn init_segment(tracks: &[TrackInit]) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(1024);

    boxed(&mut out, b"ftyp", |out| {
        out.put_slice(b"isom");
        out.put_u32(512);
        for brand in [b"isom", b"iso6", b"avc1", b"mp41"] {
            out.put_slice(brand);
        }
    });

    boxed(&mut out, b"moov", |out| {
        let next_track_id = tracks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        full_box(out, b"mvhd", 0, 0, |out| {
            out.put_u32(0); // creation time
            out.put_u32(0); // modification time
            out.put_u32(1000); // movie timescale
            out.put_u32(0); // duration unknown, fragmented
            out.put_u32(0x0001_0000); // rate 1.0
            out.put_u16(0x0100); // volume 1.0
            out.put_bytes(0, 10);
            for v in MATRIX_IDENTITY {
                out.put_u32(v);
            }
            out.put_bytes(0, 24);
            out.put_u32(next_track_id);
        });

        for track in tracks {
            write_trak(out, track);
        }

        boxed(out, b"mvex", |out| {
            for track in tracks {
                full_box(out, b"trex", 0, 0, |out| {
                    out.put_u32(track.id);
                    out.put_u32(1); // default sample description
                    out.put_u32(0);
                    out.put_u32(0);
                    out.put_u32(0);
                });
            }
        });
    });

    out.to_vec()
}

fn write_trak(out: &mut BytesMut, track: &TrackInit) {
    boxed(out, b"trak", |out| {
        full_box(out, b"tkhd", 0, 0x03, |out| {
            out.put_u32(0);
            out.put_u32(0);
            out.put_u32(track.id);
            out.put_u32(0);
            out.put_u32(0); // duration
            out.put_bytes(0, 8);
            out.put_u16(0); // layer
            out.put_u16(0); // alternate group
            match &track.config {
                TrackConfig::Audio(_) => out.put_u16(0x0100),
                TrackConfig::Video(_) => out.put_u16(0),
            }
            out.put_u16(0);
            for v in MATRIX_IDENTITY {
                out.put_u32(v);
            }
            match &track.config {
                TrackConfig::Video(v) => {
                    out.put_u32(u32::from(v.width) << 16);
                    out.put_u32(u32::from(v.height) << 16);
                }
                TrackConfig::Audio(_) => {
                    out.put_u32(0);
                    out.put_u32(0);
                }
            }
        });

        boxed(out, b"mdia", |out| {
            full_box(out, b"mdhd", 0, 0, |out| {
                out.put_u32(0);
                out.put_u32(0);
                out.put_u32(TIMESCALE);
                out.put_u32(0);
                out.put_u16(0x55C4); // "und"
                out.put_u16(0);
            });
            full_box(out, b"hdlr", 0, 0, |out| {
                out.put_u32(0);
                match &track.config {
                    TrackConfig::Video(_) => out.put_slice(b"vide"),
                    TrackConfig::Audio(_) => out.put_slice(b"soun"),
                }
                out.put_bytes(0, 12);
                match &track.config {
                    TrackConfig::Video(_) => out.put_slice(b"VideoHandler\0"),
                    TrackConfig::Audio(_) => out.put_slice(b"SoundHandler\0"),
                }
            });
            boxed(out, b"minf", |out| {
                match &track.config {
                    TrackConfig::Video(_) => full_box(out, b"vmhd", 0, 1, |out| {
                        out.put_bytes(0, 8); // graphics mode + opcolor
                    }),
                    TrackConfig::Audio(_) => full_box(out, b"smhd", 0, 0, |out| {
                        out.put_u32(0); // balance + reserved
                    }),
                }
                boxed(out, b"dinf", |out| {
                    full_box(out, b"dref", 0, 0, |out| {
                        out.put_u32(1);
                        full_box(out, b"url ", 0, 1, |_| {}); // data in this file
                    });
                });
                write_stbl(out, &track.config);
            });
        });
    });
}

fn write_stbl(out: &mut BytesMut, config: &TrackConfig) {
    boxed(out, b"stbl", |out| {
        full_box(out, b"stsd", 0, 0, |out| {
            out.put_u32(1);
            match config {
                TrackConfig::Video(v) => write_avc1(out, v),
                TrackConfig::Audio(a) => write_mp4a(out, a),
            }
        });
        // Empty sample tables; every sample lives in a fragment.
        full_box(out, b"stts", 0, 0, |out| out.put_u32(0));
        full_box(out, b"stsc", 0, 0, |out| out.put_u32(0));
        full_box(out, b"stsz", 0, 0, |out| {
            out.put_u32(0);
            out.put_u32(0);
        });
        full_box(out, b"stco", 0, 0, |out| out.put_u32(0));
    });
}

fn write_avc1(out: &mut BytesMut, config: &VideoConfig) {
    boxed(out, b"avc1", |out| {
        out.put_bytes(0, 6);
        out.put_u16(1); // data reference index
        out.put_bytes(0, 16);
        out.put_u16(config.width);
        out.put_u16(config.height);
        out.put_u32(0x0048_0000); // 72 dpi
        out.put_u32(0x0048_0000);
        out.put_u32(0);
        out.put_u16(1); // frame count
        out.put_bytes(0, 32); // compressor name
        out.put_u16(0x0018); // depth
        out.put_i16(-1);
        boxed(out, b"avcC", |out| {
            out.put_slice(&config.decoder_config_record());
        });
    });
}

fn write_mp4a(out: &mut BytesMut, config: &AudioConfig) {
    boxed(out, b"mp4a", |out| {
        out.put_bytes(0, 6);
        out.put_u16(1);
        out.put_bytes(0, 8);
        out.put_u16(u16::from(config.channel_config));
        out.put_u16(16); // sample size
        out.put_u32(0);
        out.put_u32(config.sample_rate() << 16);
        write_esds(out, config);
    });
}

fn write_esds(out: &mut BytesMut, config: &AudioConfig) {
    let asc = config.audio_specific_config();
    full_box(out, b"esds", 0, 0, |out| {
        // ES descriptor tree, short-form lengths.
        out.put_u8(0x03);
        out.put_u8((asc.len() + 23) as u8);
        out.put_u16(0); // ES id
        out.put_u8(0);
        out.put_u8(0x04); // decoder config descriptor
        out.put_u8((asc.len() + 15) as u8);
        out.put_u8(0x40); // AAC
        out.put_u8(0x15); // audio stream
        out.put_bytes(0, 3); // buffer size
        out.put_u32(0); // max bitrate
        out.put_u32(0); // avg bitrate
        out.put_u8(0x05); // decoder specific info
        out.put_u8(asc.len() as u8);
        out.put_slice(&asc);
        out.put_u8(0x06); // SL config
        out.put_u8(1);
        out.put_u8(0x02);
    });
}

/// Writes one `moof`+`mdat` pair. Track data lands in the `mdat` in
/// fragment order, with each `trun` carrying its absolute data offset
/// from the `moof` start.
pub fn media_segment(sequence_number: u32, fragments: &[TrackFragment]) -> Vec<u8> {
    // Offsets depend on the moof's own size, so build it twice: the box
    // layout is fixed, only the offset values change.
    let probe = build_moof(sequence_number, fragments, &vec![0; fragments.len()]);
    let mut offsets = Vec::with_capacity(fragments.len());
    let mut cursor = probe.len() as u32 + 8; // past the mdat header
    for fragment in fragments {
        offsets.push(cursor as i32);
        cursor += fragment
            .samples
            .iter()
            .map(|s| s.data.len() as u32)
            .sum::<u32>();
    }
    let moof = build_moof(sequence_number, fragments, &offsets);

    let mut out = moof;
    boxed(&mut out, b"mdat", |out| {
        for fragment in fragments {
            for sample in fragment.samples {
                out.put_slice(&sample.data);
            }
        }
    });
    out.to_vec()
}

fn build_moof(sequence_number: u32, fragments: &[TrackFragment], data_offsets: &[i32]) -> BytesMut {
    let mut out = BytesMut::with_capacity(256);
    boxed(&mut out, b"moof", |out| {
        full_box(out, b"mfhd", 0, 0, |out| out.put_u32(sequence_number));
        for (fragment, &data_offset) in fragments.iter().zip(data_offsets) {
            boxed(out, b"traf", |out| {
                // default-base-is-moof
                full_box(out, b"tfhd", 0, 0x0002_0000, |out| {
                    out.put_u32(fragment.track_id);
                });
                full_box(out, b"tfdt", 1, 0, |out| {
                    out.put_u64(fragment.base_decode_time);
                });
                // data offset + duration + size + flags + composition
                full_box(out, b"trun", 1, 0x0F01, |out| {
                    out.put_u32(fragment.samples.len() as u32);
                    out.put_i32(data_offset);
                    for sample in fragment.samples {
                        out.put_u32(sample.duration);
                        out.put_u32(sample.data.len() as u32);
                        out.put_u32(if sample.keyframe {
                            SAMPLE_FLAG_SYNC
                        } else {
                            SAMPLE_FLAG_NON_SYNC
                        });
                        out.put_i32(sample.composition_offset);
                    }
                });
            });
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walks the top-level boxes of an MP4 byte stream.
    fn box_tags(data: &[u8]) -> Vec<(String, usize)> {
        let mut tags = Vec::new();
        let mut pos = 0;
        while pos + 8 <= data.len() {
            let size = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
            let tag = String::from_utf8_lossy(&data[pos + 4..pos + 8]).into_owned();
            assert!(size >= 8 && pos + size <= data.len(), "box {tag} overruns");
            tags.push((tag, size));
            pos += size;
        }
        assert_eq!(pos, data.len(), "trailing garbage after last box");
        tags
    }

    fn audio_config() -> AudioConfig {
        AudioConfig {
            object_type: 2,
            sampling_freq_index: 3,
            channel_config: 2,
        }
    }

    #[test]
    fn init_segment_is_ftyp_then_moov() {
        let init = init_segment(&[TrackInit {
            id: 1,
            config: TrackConfig::Audio(audio_config()),
        }]);
        let tags = box_tags(&init);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].0, "ftyp");
        assert_eq!(tags[1].0, "moov");
    }

    #[test]
    fn media_segment_offsets_point_into_mdat() {
        let samples = [
            Sample {
                data: vec![0xAA; 100],
                duration: 1920,
                composition_offset: 0,
                keyframe: true,
            },
            Sample {
                data: vec![0xBB; 50],
                duration: 1920,
                composition_offset: 0,
                keyframe: true,
            },
        ];
        let segment = media_segment(
            1,
            &[TrackFragment {
                track_id: 1,
                base_decode_time: 90000,
                samples: &samples,
            }],
        );
        let tags = box_tags(&segment);
        assert_eq!(tags[0].0, "moof");
        assert_eq!(tags[1].0, "mdat");
        assert_eq!(tags[1].1, 8 + 150);

        // The trun data offset must land on the first sample byte.
        let moof_len = tags[0].1;
        assert_eq!(segment[moof_len + 8], 0xAA);
        let trun_pos = segment
            .windows(4)
            .position(|w| w == b"trun")
            .unwrap();
        let data_offset = i32::from_be_bytes(
            segment[trun_pos + 12..trun_pos + 16].try_into().unwrap(),
        );
        assert_eq!(data_offset as usize, moof_len + 8);
    }

    #[test]
    fn two_track_fragment_separates_data_runs() {
        let video_samples = [Sample {
            data: vec![0x11; 10],
            duration: 3600,
            composition_offset: 3600,
            keyframe: true,
        }];
        let audio_samples = [Sample {
            data: vec![0x22; 5],
            duration: 1920,
            composition_offset: 0,
            keyframe: true,
        }];
        let segment = media_segment(
            7,
            &[
                TrackFragment {
                    track_id: 1,
                    base_decode_time: 0,
                    samples: &video_samples,
                },
                TrackFragment {
                    track_id: 2,
                    base_decode_time: 0,
                    samples: &audio_samples,
                },
            ],
        );
        let tags = box_tags(&segment);
        let moof_len = tags[0].1;
        assert_eq!(segment[moof_len + 8], 0x11);
        assert_eq!(segment[moof_len + 8 + 10], 0x22);
    }
}
