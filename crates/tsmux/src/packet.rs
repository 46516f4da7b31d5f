use crate::error::MuxError;

pub const PACKET_SIZE: usize = 188;
pub const SYNC_BYTE: u8 = 0x47;

/// PID carrying the program association table.
pub const PID_PAT: u16 = 0x0000;
/// Null packets, always discarded.
pub const PID_NULL: u16 = 0x1FFF;

/// A parsed 188-byte transport packet, borrowing its payload from the
/// input segment.
#[derive(Debug)]
pub struct TsPacket<'a> {
    pub pid: u16,
    pub payload_unit_start: bool,
    pub continuity_counter: u8,
    /// Set when the adaptation field flags this packet as a random access
    /// point.
    pub random_access: bool,
    pub payload: Option<&'a [u8]>,
}

impl<'a> TsPacket<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, MuxError> {
        if data.len() < PACKET_SIZE {
            return Err(MuxError::ShortPacket(data.len()));
        }
        if data[0] != SYNC_BYTE {
            return Err(MuxError::MissingSyncByte);
        }

        let payload_unit_start = data[1] & 0x40 != 0;
        let pid = u16::from_be_bytes([data[1] & 0x1F, data[2]]);
        let adaptation_field_control = (data[3] >> 4) & 0x03;
        let continuity_counter = data[3] & 0x0F;

        let mut offset = 4;
        let mut random_access = false;
        if adaptation_field_control & 0x02 != 0 {
            let field_len = data[4] as usize;
            if 5 + field_len > PACKET_SIZE {
                return Err(MuxError::ShortPacket(PACKET_SIZE));
            }
            if field_len > 0 {
                random_access = data[5] & 0x40 != 0;
            }
            offset = 5 + field_len;
        }

        let payload = if adaptation_field_control & 0x01 != 0 && offset < PACKET_SIZE {
            Some(&data[offset..PACKET_SIZE])
        } else {
            None
        };

        Ok(Self {
            pid,
            payload_unit_start,
            continuity_counter,
            random_access,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_packet(pid: u16, pusi: bool, payload: &[u8]) -> Vec<u8> {
        let mut pkt = vec![0xFF; PACKET_SIZE];
        pkt[0] = SYNC_BYTE;
        pkt[1] = (pid >> 8) as u8 | if pusi { 0x40 } else { 0 };
        pkt[2] = pid as u8;
        pkt[3] = 0x10; // payload only, cc = 0
        pkt[4..4 + payload.len()].copy_from_slice(payload);
        pkt
    }

    #[test]
    fn parses_header_fields() {
        let raw = raw_packet(0x0100, true, &[1, 2, 3]);
        let pkt = TsPacket::parse(&raw).unwrap();
        assert_eq!(pkt.pid, 0x0100);
        assert!(pkt.payload_unit_start);
        assert_eq!(pkt.continuity_counter, 0);
        assert_eq!(&pkt.payload.unwrap()[..3], &[1, 2, 3]);
    }

    #[test]
    fn adaptation_field_shifts_payload() {
        let mut raw = raw_packet(0x0100, false, &[]);
        raw[3] = 0x30; // adaptation + payload
        raw[4] = 2; // field length
        raw[5] = 0x40; // random access indicator
        raw[6] = 0;
        raw[7] = 0xAB;
        let pkt = TsPacket::parse(&raw).unwrap();
        assert!(pkt.random_access);
        assert_eq!(pkt.payload.unwrap()[0], 0xAB);
        assert_eq!(pkt.payload.unwrap().len(), PACKET_SIZE - 7);
    }

    #[test]
    fn rejects_missing_sync_byte() {
        let raw = vec![0x00; PACKET_SIZE];
        assert!(matches!(
            TsPacket::parse(&raw),
            Err(MuxError::MissingSyncByte)
        ));
    }

    #[test]
    fn rejects_short_input() {
        assert!(matches!(
            TsPacket::parse(&[0x47; 100]),
            Err(MuxError::ShortPacket(100))
        ));
    }
}
