use byteorder::{BigEndian, ByteOrder};

use crate::utils::FromPayload;

/// Responses to commands returned by the ZW101. Which variant comes back depends on the command
/// that was sent, since acknowledgement packets do not repeat the instruction code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Bare acknowledgement carrying only a confirmation code
    Ack(AckResult),

    /// Contains system status and configuration information
    ReadSysPara(ReadSysParaResult),

    Match(MatchResult),

    Search(SearchResult),

    ValidTempleteNum(TemplateNumResult),

    ReadIndexTable(IndexTableResult),
}

impl Reply {
    pub fn confirmation_code(&self) -> ConfirmationCode {
        return match self {
            Self::Ack(r) => r.confirmation_code,
            Self::ReadSysPara(r) => r.confirmation_code,
            Self::Match(r) => r.confirmation_code,
            Self::Search(r) => r.confirmation_code,
            Self::ValidTempleteNum(r) => r.confirmation_code,
            Self::ReadIndexTable(r) => r.confirmation_code,
        };
    }

    pub fn is_success(&self) -> bool {
        return self.confirmation_code() == ConfirmationCode::Success;
    }
}

/// Status byte at the start of every acknowledgement payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationCode {
    Success,
    PacketError,
    FingerNotDetected,
    ImageNotCaptured,
    /// The search found no matching template.
    NotFound,
    Other(u8),
}

impl From<u8> for ConfirmationCode {
    fn from(byte: u8) -> Self {
        return match byte {
            0x00 => Self::Success,
            0x01 => Self::PacketError,
            0x02 => Self::FingerNotDetected,
            0x03 => Self::ImageNotCaptured,
            0x09 => Self::NotFound,
            other => Self::Other(other),
        };
    }
}

impl ConfirmationCode {
    pub fn as_byte(self) -> u8 {
        return match self {
            Self::Success => 0x00,
            Self::PacketError => 0x01,
            Self::FingerNotDetected => 0x02,
            Self::ImageNotCaptured => 0x03,
            Self::NotFound => 0x09,
            Self::Other(byte) => byte,
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckResult {
    pub address: u32,
    pub confirmation_code: ConfirmationCode,
    pub checksum: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSysParaResult {
    pub address: u32,
    pub confirmation_code: ConfirmationCode,
    pub system_parameters: SystemParameters,
    pub checksum: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub address: u32,
    pub confirmation_code: ConfirmationCode,
    pub match_score: u16,
    pub checksum: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub address: u32,
    pub confirmation_code: ConfirmationCode,
    /// Page (template slot) of the best match. 0xFFFF when nothing matched.
    pub match_page: u16,
    pub match_score: u16,
    pub checksum: u16,
}

impl SearchResult {
    /// Page value the module reports when no template matched.
    pub const NO_MATCH_PAGE: u16 = 0xFFFF;

    /// The matched page, if the search succeeded and the page lies inside the library.
    pub fn matched_page(&self, library_capacity: u16) -> Option<u16> {
        if self.confirmation_code != ConfirmationCode::Success {
            return None;
        }
        if self.match_page == Self::NO_MATCH_PAGE || self.match_page >= library_capacity {
            return None;
        }
        return Some(self.match_page);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNumResult {
    pub address: u32,
    pub confirmation_code: ConfirmationCode,
    /// Number of templates stored in the library
    pub template_num: u16,
    pub checksum: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTableResult {
    pub address: u32,
    pub confirmation_code: ConfirmationCode,
    pub index_table: IndexTable,
    pub checksum: u16,
}

/// Occupancy bitmap for one index page: 32 bytes, 256 slots. Bit 0 of byte 0 is the first slot
/// of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexTable {
    pub bits: [u8; 32],
}

impl IndexTable {
    pub const SLOTS: u16 = 256;

    pub fn is_used(&self, slot: u16) -> bool {
        if slot >= Self::SLOTS {
            return false;
        }
        return self.bits[(slot / 8) as usize] & (1u8 << (slot % 8)) != 0;
    }

    pub fn used_count(&self) -> u32 {
        return self.bits.iter().map(|b| b.count_ones()).sum();
    }

    /// First empty slot below `limit`, if any.
    pub fn first_free(&self, limit: u16) -> Option<u16> {
        return (0..limit.min(Self::SLOTS)).find(|slot| !self.is_used(*slot));
    }
}

impl FromPayload for IndexTable {
    fn from_payload(payload: &[u8]) -> Self {
        let mut bits = [0u8; 32];
        bits.copy_from_slice(&payload[0..32]);
        return IndexTable { bits };
    }
}

/// System status and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemParameters {
    /// Status information. Use instance methods of SystemParameters to get to individual bits.
    pub status_register: u16,

    pub system_identifier_code: u16,

    /// Finger library size, i.e. the number of template slots.
    pub finger_library_size: u16,

    /// Security level [1-5]
    pub security_level: u16,

    pub device_address: u32,

    /// Packet size code [0-3]: 32, 64, 128 or 256 bytes.
    pub packet_size: u16,

    /// Baud setting. To get actual baud value, multiply by 9600.
    pub baud_setting: u16,
}

impl SystemParameters {
    /// True if the module is busy executing another command.
    pub fn busy(&self) -> bool {
        return self.status_register & (1u16 << 0) != 0;
    }

    /// True if the module found a matching finger - however you should
    /// always check the response to the actual matching request.
    pub fn has_finger_match(&self) -> bool {
        return self.status_register & (1u16 << 1) != 0;
    }

    pub fn has_valid_image(&self) -> bool {
        return self.status_register & (1u16 << 3) != 0;
    }

    pub fn baud_rate(&self) -> u32 {
        return self.baud_setting as u32 * 9600;
    }
}

impl FromPayload for SystemParameters {
    fn from_payload(payload: &[u8]) -> Self {
        SystemParameters {
            status_register: BigEndian::read_u16(&payload[0..2]),
            system_identifier_code: BigEndian::read_u16(&payload[2..4]),
            finger_library_size: BigEndian::read_u16(&payload[4..6]),
            security_level: BigEndian::read_u16(&payload[6..8]),
            device_address: BigEndian::read_u32(&payload[8..12]),
            packet_size: BigEndian::read_u16(&payload[12..14]),
            baud_setting: BigEndian::read_u16(&payload[14..16]),
        }
    }
}
