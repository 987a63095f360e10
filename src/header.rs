use std::fmt::Display;
use std::fmt::Error;
use std::fmt::Formatter;

use sub_array::SubArray;

use crate::error::{ZError, ZResult};

/// Size of the fixed story file header
pub const HEADER_SIZE: usize = 0x40;

pub const ADDR_VERSION: usize = 0x00;
pub const ADDR_FLAGS1: usize = 0x01;
pub const ADDR_RELEASE: usize = 0x02;
pub const ADDR_HIGH_MEM: usize = 0x04;
pub const ADDR_INITIAL_PC: usize = 0x06;
pub const ADDR_DICTIONARY: usize = 0x08;
pub const ADDR_OBJECT_TABLE: usize = 0x0A;
pub const ADDR_GLOBALS: usize = 0x0C;
pub const ADDR_STATIC_MEM: usize = 0x0E;
pub const ADDR_FLAGS2: usize = 0x10;
pub const ADDR_SERIAL: usize = 0x12;
pub const ADDR_ABBREVIATIONS: usize = 0x18;
pub const ADDR_FILE_LENGTH: usize = 0x1A;
pub const ADDR_CHECKSUM: usize = 0x1C;
pub const ADDR_INTERPRETER_NUMBER: usize = 0x1E;
pub const ADDR_INTERPRETER_VERSION: usize = 0x1F;
pub const ADDR_STANDARD_REVISION: usize = 0x32;

/// Flags 1 (v3): status line shows hours:minutes instead of score/turns
pub const FLAGS1_STATUS_TIME: u8 = 0x02;
/// Flags 1 (v3): status line not available
pub const FLAGS1_NO_STATUS_LINE: u8 = 0x10;
/// Flags 1 (v3): screen splitting available
pub const FLAGS1_SPLIT_AVAILABLE: u8 = 0x20;

/// Flags 2: transcripting is on
pub const FLAGS2_TRANSCRIPT: u16 = 0x0001;
/// Flags 2: game requests fixed-pitch printing
pub const FLAGS2_FIXED_PITCH: u16 = 0x0002;

/// Header fields of a version 3 story file, parsed once at load.
///
/// Only `flags1`/`flags2` are ever rewritten afterwards, and only through
/// memory; this struct is a read-only view taken at load and restart.
#[derive(Debug, Clone)]
pub struct Header {
    pub version: u8,
    pub flags1: u8,
    pub release: u16,
    pub serial: [u8; 6],
    pub base_high_mem: usize,
    pub base_static_mem: usize,
    pub initial_pc: usize,
    pub abbrev_table: usize,
    pub len_file: usize,
    pub checksum_file: u16,
    pub flags2: u16,
    pub dictionary: usize,
    pub object_table_addr: usize,
    pub global_variables: usize,
}

impl Header {
    pub fn new(bytes: &[u8]) -> ZResult<Header> {
        if bytes.len() < HEADER_SIZE {
            return Err(ZError::BadStory(format!(
                "file is {} bytes, smaller than the {} byte header",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&bytes[..HEADER_SIZE]);

        let serial: &[u8; 6] = raw.sub_array_ref(ADDR_SERIAL);
        let word = |addr: usize| -> u16 {
            let pair: &[u8; 2] = raw.sub_array_ref(addr);
            u16::from_be_bytes(*pair)
        };

        let header = Header {
            version: raw[ADDR_VERSION],
            flags1: raw[ADDR_FLAGS1],
            release: word(ADDR_RELEASE),
            serial: *serial,
            base_high_mem: word(ADDR_HIGH_MEM) as usize,
            base_static_mem: word(ADDR_STATIC_MEM) as usize,
            initial_pc: word(ADDR_INITIAL_PC) as usize,
            abbrev_table: word(ADDR_ABBREVIATIONS) as usize,
            len_file: word(ADDR_FILE_LENGTH) as usize * 2,
            checksum_file: word(ADDR_CHECKSUM),
            flags2: word(ADDR_FLAGS2),
            dictionary: word(ADDR_DICTIONARY) as usize,
            object_table_addr: word(ADDR_OBJECT_TABLE) as usize,
            global_variables: word(ADDR_GLOBALS) as usize,
        };

        if header.base_static_mem > bytes.len() || header.base_static_mem < HEADER_SIZE {
            return Err(ZError::BadStory(format!(
                "static memory base {:#06x} outside story of {} bytes",
                header.base_static_mem,
                bytes.len()
            )));
        }

        Ok(header)
    }

    /// Serial number as printable text (normally a YYMMDD date)
    pub fn serial_string(&self) -> String {
        self.serial.iter().map(|b| *b as char).collect()
    }

    /// True when the v3 status line shows a clock rather than score/turns
    pub fn status_line_is_time(&self) -> bool {
        self.flags1 & FLAGS1_STATUS_TIME != 0
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "
Z-code version:           {}
Interpreter flags:        {:#04x}
Release number:           {}
Size of resident memory:  {:#06x}
Start PC:                 {:#06x}
Dictionary address:       {:#06x}
Object table address:     {:#06x}
Global variables address: {:#06x}
Size of dynamic memory:   {:#06x}
Game flags:               {:#06x}
Serial number:            {}
Abbreviations address:    {:#06x}
File size:                {:#06x}
Checksum:                 {:#06x}
",
            self.version,
            self.flags1,
            self.release,
            self.base_high_mem,
            self.initial_pc,
            self.dictionary,
            self.object_table_addr,
            self.global_variables,
            self.base_static_mem,
            self.flags2,
            self.serial_string(),
            self.abbrev_table,
            self.len_file,
            self.checksum_file,
        )
    }
}
