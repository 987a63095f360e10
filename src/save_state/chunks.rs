//! Chunk layouts for the save-state container

use crate::error::{ZError, ZResult};
use crate::vm::{CallFrame, MAX_LOCALS, STACK_SIZE};

/// Where execution picks up after a restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// Continue decoding at `pc`
    AtPc,
    /// `pc` is a `save` instruction; resume by taking its branch as success
    SaveInstruction,
    /// Suspended inside `sread`, waiting for a line for these buffers
    AwaitingInput { text: u16, parse: u16 },
}

/// HEAD chunk - identifies the story and the resume point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadChunk {
    pub version: u8,
    pub release: u16,
    pub serial: [u8; 6],
    pub checksum: u16,
    pub pc: u32,
    pub resume: ResumePoint,
}

const HEAD_LEN: usize = 20;

impl HeadChunk {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEAD_LEN);
        bytes.push(self.version);
        bytes.extend_from_slice(&self.release.to_be_bytes());
        bytes.extend_from_slice(&self.serial);
        bytes.extend_from_slice(&self.checksum.to_be_bytes());
        bytes.extend_from_slice(&self.pc.to_be_bytes());
        let (tag, text, parse) = match self.resume {
            ResumePoint::AtPc => (0u8, 0u16, 0u16),
            ResumePoint::SaveInstruction => (1, 0, 0),
            ResumePoint::AwaitingInput { text, parse } => (2, text, parse),
        };
        bytes.push(tag);
        bytes.extend_from_slice(&text.to_be_bytes());
        bytes.extend_from_slice(&parse.to_be_bytes());
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> ZResult<Self> {
        if data.len() < HEAD_LEN {
            return Err(ZError::SaveState("HEAD chunk too small".to_string()));
        }
        let word = |at: usize| u16::from_be_bytes([data[at], data[at + 1]]);
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&data[3..9]);
        let pc = u32::from_be_bytes([data[11], data[12], data[13], data[14]]);
        let resume = match data[15] {
            0 => ResumePoint::AtPc,
            1 => ResumePoint::SaveInstruction,
            2 => ResumePoint::AwaitingInput {
                text: word(16),
                parse: word(18),
            },
            other => {
                return Err(ZError::SaveState(format!("unknown resume point {other}")));
            }
        };
        Ok(HeadChunk {
            version: data[0],
            release: word(1),
            serial,
            checksum: word(9),
            pc,
            resume,
        })
    }
}

/// Stks chunk - every call frame from the top level inward
pub struct StksChunk;

impl StksChunk {
    pub fn encode(frames: &[CallFrame]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(frames.len() as u16).to_be_bytes());
        for frame in frames {
            data.extend_from_slice(&frame.return_pc.to_be_bytes());
            match frame.return_store {
                Some(var) => data.extend_from_slice(&[1, var]),
                None => data.extend_from_slice(&[0, 0]),
            }
            data.push(frame.locals.len() as u8);
            for local in &frame.locals {
                data.extend_from_slice(&local.to_be_bytes());
            }
            data.extend_from_slice(&(frame.stack.len() as u16).to_be_bytes());
            for value in &frame.stack {
                data.extend_from_slice(&value.to_be_bytes());
            }
        }
        data
    }

    pub fn decode(data: &[u8]) -> ZResult<Vec<CallFrame>> {
        let mut reader = ChunkReader { data, offset: 0 };
        let count = reader.word()? as usize;
        if count == 0 {
            return Err(ZError::SaveState("no top-level frame".to_string()));
        }

        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            let return_pc = reader.long()?;
            let has_store = reader.byte()?;
            let store_var = reader.byte()?;
            let local_count = reader.byte()? as usize;
            if local_count > MAX_LOCALS {
                return Err(ZError::SaveState(format!("frame with {local_count} locals")));
            }
            let locals = (0..local_count)
                .map(|_| reader.word())
                .collect::<ZResult<Vec<u16>>>()?;
            let stack_len = reader.word()? as usize;
            if stack_len > STACK_SIZE {
                return Err(ZError::SaveState(format!("frame stack of {stack_len} values")));
            }
            let stack = (0..stack_len)
                .map(|_| reader.word())
                .collect::<ZResult<Vec<u16>>>()?;
            frames.push(CallFrame {
                return_pc,
                return_store: (has_store != 0).then_some(store_var),
                locals,
                stack,
            });
        }

        if reader.offset != data.len() {
            return Err(ZError::SaveState("trailing bytes in Stks chunk".to_string()));
        }
        if !frames[0].locals.is_empty() {
            return Err(ZError::SaveState("top-level frame has locals".to_string()));
        }
        Ok(frames)
    }
}

struct ChunkReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ChunkReader<'a> {
    fn take(&mut self, n: usize) -> ZResult<&'a [u8]> {
        let data = self.data;
        let end = self.offset + n;
        let slice = data
            .get(self.offset..end)
            .ok_or_else(|| ZError::SaveState("truncated Stks chunk".to_string()))?;
        self.offset = end;
        Ok(slice)
    }

    fn byte(&mut self) -> ZResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn word(&mut self) -> ZResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn long(&mut self) -> ZResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
