use crate::error::MuxError;

/// One complete packetized elementary stream unit.
#[derive(Debug, Clone)]
pub struct PesUnit {
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub data: Vec<u8>,
}

/// Reassembles PES units from transport payloads on a single PID. A unit
/// runs from one payload-unit-start packet to the next.
#[derive(Debug, Default)]
pub struct PesAssembler {
    buffer: Vec<u8>,
    started: bool,
}

impl PesAssembler {
    /// Feeds one transport payload. Returns the unit completed by this
    /// packet, if any.
    pub fn push(
        &mut self,
        payload: &[u8],
        payload_unit_start: bool,
    ) -> Result<Option<PesUnit>, MuxError> {
        let completed = if payload_unit_start {
            let unit = self.take()?;
            self.started = true;
            unit
        } else {
            None
        };
        if self.started {
            self.buffer.extend_from_slice(payload);
        }
        Ok(completed)
    }

    /// Flushes the trailing unit once input is exhausted.
    pub fn finish(&mut self) -> Result<Option<PesUnit>, MuxError> {
        self.started = false;
        self.take()
    }

    fn take(&mut self) -> Result<Option<PesUnit>, MuxError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let raw = std::mem::take(&mut self.buffer);
        parse_pes(&raw).map(Some)
    }
}

fn parse_pes(raw: &[u8]) -> Result<PesUnit, MuxError> {
    if raw.len() < 9 {
        return Err(MuxError::MalformedPes("truncated header"));
    }
    if raw[0] != 0x00 || raw[1] != 0x00 || raw[2] != 0x01 {
        return Err(MuxError::MalformedPes("bad start code"));
    }

    let pts_dts_flags = raw[7] >> 6;
    let header_data_length = raw[8] as usize;
    let body_start = 9 + header_data_length;
    if body_start > raw.len() {
        return Err(MuxError::MalformedPes("header length past payload"));
    }

    let mut pts = None;
    let mut dts = None;
    if pts_dts_flags & 0x02 != 0 {
        if header_data_length < 5 {
            return Err(MuxError::MalformedPes("missing PTS field"));
        }
        pts = Some(decode_timestamp(&raw[9..14]));
        if pts_dts_flags == 0x03 {
            if header_data_length < 10 {
                return Err(MuxError::MalformedPes("missing DTS field"));
            }
            dts = Some(decode_timestamp(&raw[14..19]));
        }
    }

    Ok(PesUnit {
        pts,
        dts,
        data: raw[body_start..].to_vec(),
    })
}

/// Decodes the 33-bit timestamp spread over 5 marker-interleaved bytes.
fn decode_timestamp(b: &[u8]) -> u64 {
    (u64::from(b[0] & 0x0E) << 29)
        | (u64::from(b[1]) << 22)
        | (u64::from(b[2] & 0xFE) << 14)
        | (u64::from(b[3]) << 7)
        | (u64::from(b[4]) >> 1)
}
