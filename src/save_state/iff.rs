//! IFF container for save states

use crate::error::{ZError, ZResult};

/// IFF file structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IffFile {
    pub form_type: [u8; 4],
    pub chunks: Vec<IffChunk>,
}

/// Individual chunk in an IFF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IffChunk {
    /// 4-character chunk type identifier
    pub chunk_type: [u8; 4],
    pub data: Vec<u8>,
}

fn truncated(what: &str) -> ZError {
    ZError::SaveState(format!("truncated {what}"))
}

impl IffFile {
    pub fn new(form_type: [u8; 4]) -> Self {
        IffFile {
            form_type,
            chunks: Vec::new(),
        }
    }

    /// Add a chunk to the file
    pub fn add_chunk(&mut self, chunk_type: [u8; 4], data: Vec<u8>) {
        self.chunks.push(IffChunk { chunk_type, data });
    }

    /// Serialize: `FORM`, total length, form type, then padded chunks
    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len = 4 + self
            .chunks
            .iter()
            .map(|c| 8 + c.data.len() + c.data.len() % 2)
            .sum::<usize>();

        let mut out = Vec::with_capacity(8 + body_len);
        out.extend_from_slice(b"FORM");
        out.extend_from_slice(&(body_len as u32).to_be_bytes());
        out.extend_from_slice(&self.form_type);
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.chunk_type);
            out.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
            out.extend_from_slice(&chunk.data);
            // Pad to even length
            if chunk.data.len() % 2 == 1 {
                out.push(0);
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> ZResult<Self> {
        if bytes.len() < 12 {
            return Err(truncated("IFF header"));
        }
        if &bytes[0..4] != b"FORM" {
            return Err(ZError::SaveState(
                "not an IFF file (missing FORM header)".to_string(),
            ));
        }
        let body_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let end = 8 + body_len;
        if end > bytes.len() || body_len < 4 {
            return Err(truncated("FORM body"));
        }

        let mut form_type = [0u8; 4];
        form_type.copy_from_slice(&bytes[8..12]);
        let mut iff = IffFile::new(form_type);

        let mut offset = 12;
        while offset < end {
            if offset + 8 > end {
                return Err(truncated("chunk header"));
            }
            let mut chunk_type = [0u8; 4];
            chunk_type.copy_from_slice(&bytes[offset..offset + 4]);
            let size = u32::from_be_bytes([
                bytes[offset + 4],
                bytes[offset + 5],
                bytes[offset + 6],
                bytes[offset + 7],
            ]) as usize;
            offset += 8;
            if offset + size > end {
                return Err(truncated("chunk data"));
            }
            iff.add_chunk(chunk_type, bytes[offset..offset + size].to_vec());
            offset += size + size % 2;
        }

        Ok(iff)
    }

    /// Find a chunk by type
    pub fn find_chunk(&self, chunk_type: &[u8; 4]) -> Option<&IffChunk> {
        self.chunks.iter().find(|c| &c.chunk_type == chunk_type)
    }
}
