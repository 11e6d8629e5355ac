use crate::utils::{CommandWriter, ToPayload};
//# Naming follows the ZW101 command table (PS_* instruction names without the prefix).

/// Enum for commands one can send to the ZW101.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Captures an image of the fingerprint for matching
    GetImage,

    /// Processes the captured image into a _character buffer_
    GenChar {
        /// Which buffer to store the processed fingerprint data into. Enrollment uses buffers
        /// 1 to 5, one per sample; searching uses buffer 1.
        buffer: u8,
    },

    /// Compares the templates held in the character buffers.
    Match,

    /// Searches the fingerprint library for the template held in `buffer`.
    Search {
        buffer: u8,

        /// The first page (template slot) to search
        start_page: u16,

        /// How many pages to search from `start_page`
        page_num: u16,
    },

    /// Merges the character buffers into a single template.
    RegModel,

    /// Stores the merged template into the library.
    StoreChar {
        buffer: u8,
        /// Template slot to store into.
        page: u16,
    },

    /// Deletes `count` templates starting at `page`.
    DeletChar { page: u16, count: u16 },

    /// Clears the whole fingerprint library.
    Empty,

    /// Reads system status and basic configuration
    ReadSysPara,

    /// Reads how many templates are stored.
    ValidTempleteNum,

    /// Reads the occupancy bitmap for one index page (256 slots).
    ReadIndexTable { index_page: u8 },

    /// Captures an image of the fingerprint for enrollment
    GetEnrollImage,

    /// Cancels a running automatic enrollment or identification.
    Cancel,

    /// Starts automatic enrollment on the module. The module drives the whole process; its
    /// replies are not awaited.
    AutoEnroll { timeout_ms: u16 },

    /// Starts automatic identification on the module. Replies are not awaited.
    AutoIdentify {
        buffer: u8,
        start_page: u16,
        page_num: u16,
        security_level: u8,
    },

    /// Puts the module to sleep.
    Sleep,

    /// Checks that the module is alive.
    HandShake,

    /// Drives the RGB ring around the sensor.
    ControlBLN {
        /// 1 = breathe, 2 = flash, 3 = on, 4 = off, 5 = fade in, 6 = fade out, 7 = marquee
        function: u8,
        /// 1 = blue, 2 = green, 3 = cyan, 4 = red, 5 = purple, 6 = yellow, 7 = white
        start_color: u8,
        /// End colour, or duty cycle (0-255) for modes that fade
        end_color: u8,
        /// 0 = loop forever
        loops: u8,
        /// Cycle length in units of 100ms
        cycle: u8,
    },
}

/// Reply timeout used when the caller does not give one.
pub const DEFAULT_REPLY_TIMEOUT_MS: u32 = 500;

impl Command {
    /// The instruction code sent on the wire.
    pub fn code(&self) -> u8 {
        return match self {
            Self::GetImage => 0x01,
            Self::GenChar { .. } => 0x02,
            Self::Match => 0x03,
            Self::Search { .. } => 0x04,
            Self::RegModel => 0x05,
            Self::StoreChar { .. } => 0x06,
            Self::DeletChar { .. } => 0x0C,
            Self::Empty => 0x0D,
            Self::ReadSysPara => 0x0F,
            Self::ValidTempleteNum => 0x1D,
            Self::ReadIndexTable { .. } => 0x1F,
            Self::GetEnrollImage => 0x29,
            Self::Cancel => 0x30,
            Self::AutoEnroll { .. } => 0x31,
            Self::AutoIdentify { .. } => 0x32,
            Self::Sleep => 0x33,
            Self::HandShake => 0x35,
            Self::ControlBLN { .. } => 0x3C,
        };
    }

    /// How long to wait for the module to answer this command.
    pub fn reply_timeout_ms(&self) -> u32 {
        return match self {
            Self::ReadSysPara => 2000,
            Self::ValidTempleteNum | Self::DeletChar { .. } | Self::ReadIndexTable { .. } => 1000,
            Self::Sleep => 400,
            _ => DEFAULT_REPLY_TIMEOUT_MS,
        };
    }

    /// False for commands sent fire-and-forget: the module either answers later (automatic
    /// modes) or the answer carries nothing we act on.
    pub fn expects_reply(&self) -> bool {
        return !matches!(
            self,
            Self::Cancel | Self::AutoEnroll { .. } | Self::AutoIdentify { .. } | Self::ControlBLN { .. }
        );
    }
}

impl ToPayload
for Command {
    fn to_payload(&self, writer: &mut dyn CommandWriter) {
        writer.write_cmd_bytes(&[self.code()]);
        match self {
            Self::GenChar { buffer } => {
                writer.write_cmd_bytes(&[*buffer]);
            },

            // instr  | 0x04 [1]
            // bufid  | buffer [1]
            // start  | start_page [2]
            // count  | page_num [2]
            Self::Search { buffer, start_page, page_num }
            | Self::AutoIdentify { buffer, start_page, page_num, .. } => {
                writer.write_cmd_bytes(&[*buffer]);
                writer.write_cmd_bytes(&start_page.to_be_bytes()[..]);
                writer.write_cmd_bytes(&page_num.to_be_bytes()[..]);
                if let Self::AutoIdentify { security_level, .. } = self {
                    writer.write_cmd_bytes(&[*security_level]);
                }
            },

            Self::StoreChar { buffer, page } => {
                writer.write_cmd_bytes(&[*buffer]);
                writer.write_cmd_bytes(&page.to_be_bytes()[..]);
            },

            Self::DeletChar { page, count } => {
                writer.write_cmd_bytes(&page.to_be_bytes()[..]);
                writer.write_cmd_bytes(&count.to_be_bytes()[..]);
            },

            Self::ReadIndexTable { index_page } => {
                writer.write_cmd_bytes(&[*index_page]);
            },

            // instr  | 0x31 [1]
            // tmout  | timeout_ms [2]
            // rsvd   | 0x00 [1]
            Self::AutoEnroll { timeout_ms } => {
                writer.write_cmd_bytes(&timeout_ms.to_be_bytes()[..]);
                writer.write_cmd_bytes(&[0x00]);
            },

            Self::ControlBLN { function, start_color, end_color, loops, cycle } => {
                writer.write_cmd_bytes(&[*function, *start_color, *end_color, *loops, *cycle, 0x00]);
            },

            Self::GetImage
            | Self::Match
            | Self::RegModel
            | Self::Empty
            | Self::ReadSysPara
            | Self::ValidTempleteNum
            | Self::GetEnrollImage
            | Self::Cancel
            | Self::Sleep
            | Self::HandShake => {},
        }
    }
}
