//! Program-specific information tables. HLS muxers emit PAT and PMT
//! sections that fit a single packet, which is all this demux supports.

use crate::error::MuxError;

const STREAM_TYPE_AAC_ADTS: u8 = 0x0F;
const STREAM_TYPE_H264: u8 = 0x1B;

/// Elementary PIDs announced by the program map table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgramMap {
    pub video_pid: Option<u16>,
    pub audio_pid: Option<u16>,
}

/// Skips the pointer field a payload-unit-start PSI payload begins with
/// and returns the section bytes.
fn section<'a>(payload: &'a [u8], table: &'static str) -> Result<&'a [u8], MuxError> {
    let pointer = *payload.first().ok_or(MuxError::MalformedSection {
        table,
        reason: "empty payload",
    })? as usize;
    payload.get(1 + pointer..).ok_or(MuxError::MalformedSection {
        table,
        reason: "pointer past payload",
    })
}

/// Returns the PMT PID of the first real program in a PAT section.
pub fn parse_pat(payload: &[u8]) -> Result<u16, MuxError> {
    let section = section(payload, "PAT")?;
    if section.len() < 12 || section[0] != 0x00 {
        return Err(MuxError::MalformedSection {
            table: "PAT",
            reason: "bad table id",
        });
    }
    let section_length = u16::from_be_bytes([section[1] & 0x0F, section[2]]) as usize;
    let end = (3 + section_length).min(section.len()).saturating_sub(4); // strip CRC
    let mut pos = 8;
    while pos + 4 <= end {
        let program_number = u16::from_be_bytes([section[pos], section[pos + 1]]);
        let pid = u16::from_be_bytes([section[pos + 2] & 0x1F, section[pos + 3]]);
        if program_number != 0 {
            return Ok(pid);
        }
        pos += 4;
    }
    Err(MuxError::MalformedSection {
        table: "PAT",
        reason: "no program entries",
    })
}

/// Extracts the first H.264 and AAC elementary PIDs from a PMT section.
/// Other stream types are ignored.
pub fn parse_pmt(payload: &[u8]) -> Result<ProgramMap, MuxError> {
    let section = section(payload, "PMT")?;
    if section.len() < 16 || section[0] != 0x02 {
        return Err(MuxError::MalformedSection {
            table: "PMT",
            reason: "bad table id",
        });
    }
    let section_length = u16::from_be_bytes([section[1] & 0x0F, section[2]]) as usize;
    let end = (3 + section_length).min(section.len()).saturating_sub(4);
    let program_info_length = u16::from_be_bytes([section[10] & 0x0F, section[11]]) as usize;

    let mut map = ProgramMap::default();
    let mut pos = 12 + program_info_length;
    while pos + 5 <= end {
        let stream_type = section[pos];
        let pid = u16::from_be_bytes([section[pos + 1] & 0x1F, section[pos + 2]]);
        let es_info_length = u16::from_be_bytes([section[pos + 3] & 0x0F, section[pos + 4]]) as usize;
        match stream_type {
            STREAM_TYPE_H264 if map.video_pid.is_none() => map.video_pid = Some(pid),
            STREAM_TYPE_AAC_ADTS if map.audio_pid.is_none() => map.audio_pid = Some(pid),
            _ => {}
        }
        pos += 5 + es_info_length;
    }

    if map.video_pid.is_none() && map.audio_pid.is_none() {
        return Err(MuxError::MalformedSection {
            table: "PMT",
            reason: "no supported streams",
        });
    }
    Ok(map)
}

#[cfg(test)]
pub(crate) mod build {
    //! Section builders shared by tests across the crate.

    pub fn pat_payload(pmt_pid: u16) -> Vec<u8> {
        let mut s = vec![
            0x00, // pointer field
            0x00, // table id
            0xB0, 13, // section length: 5 header + 4 program + 4 crc
            0x00, 0x01, // transport stream id
            0xC1, 0x00, 0x00, // version/section numbers
        ];
        s.extend_from_slice(&[0x00, 0x01]); // program number 1
        s.extend_from_slice(&[0xE0 | (pmt_pid >> 8) as u8, pmt_pid as u8]);
        s.extend_from_slice(&[0, 0, 0, 0]); // crc, not validated
        s
    }

    pub fn pmt_payload(streams: &[(u8, u16)]) -> Vec<u8> {
        let section_length = 9 + streams.len() * 5 + 4;
        let mut s = vec![
            0x00, // pointer field
            0x02, // table id
            0xB0 | (section_length >> 8) as u8,
            section_length as u8,
            0x00, 0x01, // program number
            0xC1, 0x00, 0x00,
            0xE1, 0x00, // pcr pid
            0xF0, 0x00, // program info length
        ];
        for (stream_type, pid) in streams {
            s.push(*stream_type);
            s.extend_from_slice(&[0xE0 | (pid >> 8) as u8, *pid as u8]);
            s.extend_from_slice(&[0xF0, 0x00]); // es info length
        }
        s.extend_from_slice(&[0, 0, 0, 0]);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pat_yields_pmt_pid() {
        assert_eq!(parse_pat(&build::pat_payload(0x1000)).unwrap(), 0x1000);
    }

    #[test]
    fn pmt_maps_avc_and_aac_pids() {
        let payload = build::pmt_payload(&[(0x1B, 0x0100), (0x0F, 0x0101)]);
        let map = parse_pmt(&payload).unwrap();
        assert_eq!(map.video_pid, Some(0x0100));
        assert_eq!(map.audio_pid, Some(0x0101));
    }

    #[test]
    fn pmt_ignores_foreign_stream_types() {
        let payload = build::pmt_payload(&[(0x03, 0x0102), (0x0F, 0x0101)]);
        let map = parse_pmt(&payload).unwrap();
        assert_eq!(map.video_pid, None);
        assert_eq!(map.audio_pid, Some(0x0101));
    }

    #[test]
    fn pmt_with_only_foreign_streams_is_rejected() {
        let payload = build::pmt_payload(&[(0x03, 0x0102)]);
        assert!(parse_pmt(&payload).is_err());
    }

    #[test]
    fn truncated_pat_is_rejected() {
        assert!(parse_pat(&[0x00, 0x00, 0xB0]).is_err());
    }
}
