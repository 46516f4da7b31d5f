//! H.264 elementary stream handling: Annex-B NAL splitting, SPS parsing
//! for the decoder config record, and conversion to length-prefixed
//! AVCC samples.

use crate::error::MuxError;

pub const NAL_SLICE_IDR: u8 = 5;
pub const NAL_SEI: u8 = 6;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;
pub const NAL_AUD: u8 = 9;

pub fn nal_type(nal: &[u8]) -> u8 {
    nal.first().map(|b| b & 0x1F).unwrap_or(0)
}

/// Splits an Annex-B byte stream into NAL units, start codes stripped.
/// Both 3- and 4-byte start codes occur in the wild.
pub fn split_annexb(data: &[u8]) -> Vec<&[u8]> {
    let mut nals = Vec::new();
    let mut start = None;
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            let code_start = if i > 0 && data[i - 1] == 0 { i - 1 } else { i };
            if let Some(s) = start
                && s < code_start
            {
                nals.push(&data[s..code_start]);
            }
            start = Some(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }
    if let Some(s) = start
        && s < data.len()
    {
        nals.push(&data[s..]);
    }
    nals
}

/// Converts the slice NALs of one access unit to a length-prefixed AVCC
/// sample. Parameter sets and delimiters live in the init segment, not
/// the sample.
pub fn annexb_to_sample(data: &[u8]) -> Vec<u8> {
    let mut sample = Vec::with_capacity(data.len() + 16);
    for nal in split_annexb(data) {
        match nal_type(nal) {
            NAL_AUD | NAL_SPS | NAL_PPS | NAL_SEI => continue,
            _ => {
                sample.extend_from_slice(&(nal.len() as u32).to_be_bytes());
                sample.extend_from_slice(nal);
            }
        }
    }
    sample
}

pub fn contains_idr(data: &[u8]) -> bool {
    split_annexb(data)
        .iter()
        .any(|nal| nal_type(nal) == NAL_SLICE_IDR)
}

/// Decoder parameters captured from the stream's SPS and PPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConfig {
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
    pub width: u16,
    pub height: u16,
}

impl VideoConfig {
    pub fn from_parameter_sets(sps: Vec<u8>, pps: Vec<u8>) -> Result<Self, MuxError> {
        let (width, height) = parse_sps_dimensions(&sps)?;
        Ok(Self {
            sps,
            pps,
            width,
            height,
        })
    }

    /// AVCDecoderConfigurationRecord for the `avcC` box.
    pub fn decoder_config_record(&self) -> Vec<u8> {
        let mut record = vec![
            1, // configuration version
            self.sps[1],
            self.sps[2],
            self.sps[3],
            0xFF, // 4-byte NAL lengths
            0xE1, // one SPS
        ];
        record.extend_from_slice(&(self.sps.len() as u16).to_be_bytes());
        record.extend_from_slice(&self.sps);
        record.push(1); // one PPS
        record.extend_from_slice(&(self.pps.len() as u16).to_be_bytes());
        record.extend_from_slice(&self.pps);
        record
    }
}

/// Reads SPS fields up to the cropping window to recover coded
/// dimensions.
fn parse_sps_dimensions(sps: &[u8]) -> Result<(u16, u16), MuxError> {
    if sps.len() < 4 || nal_type(sps) != NAL_SPS {
        return Err(MuxError::MalformedAvc("not an SPS"));
    }
    let mut r = BitReader::without_emulation_prevention(&sps[1..]);
    let profile_idc = r.bits(8)?;
    r.bits(16)?; // constraint flags + level_idc
    r.ue()?; // seq_parameter_set_id

    if matches!(profile_idc, 100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134) {
        let chroma_format_idc = r.ue()?;
        if chroma_format_idc == 3 {
            r.bits(1)?; // separate_colour_plane_flag
        }
        r.ue()?; // bit_depth_luma_minus8
        r.ue()?; // bit_depth_chroma_minus8
        r.bits(1)?; // qpprime_y_zero_transform_bypass_flag
        if r.bits(1)? == 1 {
            let lists = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..lists {
                if r.bits(1)? == 1 {
                    r.skip_scaling_list(if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    r.ue()?; // log2_max_frame_num_minus4
    match r.ue()? {
        0 => {
            r.ue()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            r.bits(1)?; // delta_pic_order_always_zero_flag
            r.se()?;
            r.se()?;
            let cycle = r.ue()?;
            for _ in 0..cycle {
                r.se()?;
            }
        }
        _ => {}
    }
    r.ue()?; // max_num_ref_frames
    r.bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = r.ue()? + 1;
    let pic_height_in_map_units = r.ue()? + 1;
    let frame_mbs_only = r.bits(1)?;
    if frame_mbs_only == 0 {
        r.bits(1)?; // mb_adaptive_frame_field_flag
    }
    r.bits(1)?; // direct_8x8_inference_flag

    let (mut crop_l, mut crop_r, mut crop_t, mut crop_b) = (0u64, 0, 0, 0);
    if r.bits(1)? == 1 {
        crop_l = r.ue()?;
        crop_r = r.ue()?;
        crop_t = r.ue()?;
        crop_b = r.ue()?;
    }

    // Crop units for the 4:2:0 case carried by every stream we accept.
    let width = pic_width_in_mbs * 16 - (crop_l + crop_r) * 2;
    let height = (2 - u64::from(frame_mbs_only)) * pic_height_in_map_units * 16
        - (crop_t + crop_b) * 2 * (2 - u64::from(frame_mbs_only));
    Ok((width as u16, height as u16))
}

/// MSB-first bit reader over RBSP bytes, dropping `00 00 03` emulation
/// prevention as it goes.
struct BitReader {
    data: Vec<u8>,
    pos: usize,
}

impl BitReader {
    fn without_emulation_prevention(raw: &[u8]) -> Self {
        let mut data = Vec::with_capacity(raw.len());
        let mut zeros = 0u32;
        for &b in raw {
            if zeros >= 2 && b == 0x03 {
                zeros = 0;
                continue;
            }
            zeros = if b == 0 { zeros + 1 } else { 0 };
            data.push(b);
        }
        Self { data, pos: 0 }
    }

    fn bits(&mut self, count: u32) -> Result<u64, MuxError> {
        let mut value = 0u64;
        for _ in 0..count {
            let byte = self
                .data
                .get(self.pos / 8)
                .ok_or(MuxError::MalformedAvc("SPS ended mid-field"))?;
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | u64::from(bit);
            self.pos += 1;
        }
        Ok(value)
    }

    /// Unsigned exp-Golomb.
    fn ue(&mut self) -> Result<u64, MuxError> {
        let mut zeros = 0u32;
        while self.bits(1)? == 0 {
            zeros += 1;
            if zeros > 32 {
                return Err(MuxError::MalformedAvc("oversized exp-Golomb code"));
            }
        }
        Ok((1 << zeros) - 1 + self.bits(zeros)?)
    }

    /// Signed exp-Golomb.
    fn se(&mut self) -> Result<i64, MuxError> {
        let code = self.ue()? as i64;
        Ok(if code % 2 == 0 { -code / 2 } else { (code + 1) / 2 })
    }

    fn skip_scaling_list(&mut self, size: u32) -> Result<(), MuxError> {
        let mut last: i64 = 8;
        let mut next: i64 = 8;
        for _ in 0..size {
            if next != 0 {
                next = (last + self.se()? + 256) % 256;
            }
            if next != 0 {
                last = next;
            }
        }
        Ok(())
    }
}
