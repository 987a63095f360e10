/// Dictionary lookup and input tokenizing for v3 story files
use std::cmp::Ordering;

use log::debug;

use crate::error::{ZError, ZResult};
use crate::text::{self, DICT_WORD_BYTES};
use crate::vm::VM;

/// Header of the story's dictionary table, parsed once at load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    /// ZSCII codes that end a word and are also words themselves
    pub separators: Vec<u8>,
    pub entry_length: usize,
    pub entry_count: usize,
    /// Address of the first entry
    pub entries_addr: usize,
}

/// One word found in an input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Offset of the first character within the text buffer (text starts at 1)
    pub position: usize,
    /// Address of the matching dictionary entry, or 0
    pub dict_addr: u16,
}

impl Dictionary {
    pub fn parse(memory: &[u8], addr: usize) -> ZResult<Dictionary> {
        let sep_count = *memory
            .get(addr)
            .ok_or_else(|| ZError::BadStory(format!("dictionary address {addr:#06x} outside story")))?
            as usize;
        let header_end = addr + 1 + sep_count + 3;
        if header_end > memory.len() {
            return Err(ZError::BadStory("dictionary header truncated".to_string()));
        }
        let separators = memory[addr + 1..addr + 1 + sep_count].to_vec();
        let entry_start = addr + 1 + sep_count;
        let entry_length = memory[entry_start] as usize;
        let entry_count = u16::from_be_bytes([memory[entry_start + 1], memory[entry_start + 2]]) as usize;

        if entry_length < DICT_WORD_BYTES {
            return Err(ZError::BadStory(format!(
                "dictionary entry length {entry_length} shorter than an encoded word"
            )));
        }
        if header_end + entry_length * entry_count > memory.len() {
            return Err(ZError::BadStory(format!(
                "dictionary of {entry_count} entries runs past end of story"
            )));
        }

        debug!(
            "Dictionary at {:04x}: {} separators, {} entries of {} bytes",
            addr, sep_count, entry_count, entry_length
        );

        Ok(Dictionary {
            separators,
            entry_length,
            entry_count,
            entries_addr: header_end,
        })
    }

    /// Binary search the sorted entries for an exact encoded match
    pub fn lookup(&self, memory: &[u8], word: &str) -> u16 {
        let key = text::encode_dictionary_word(word);
        let mut low = 0usize;
        let mut high = self.entry_count;

        while low < high {
            let mid = (low + high) / 2;
            let addr = self.entries_addr + mid * self.entry_length;
            let entry = &memory[addr..addr + DICT_WORD_BYTES];
            match key.as_slice().cmp(entry) {
                Ordering::Less => high = mid,
                Ordering::Greater => low = mid + 1,
                Ordering::Equal => {
                    debug!("Dictionary found '{}' at {:04x}", word, addr);
                    return addr as u16;
                }
            }
        }

        debug!("Dictionary: '{}' not found", word);
        0
    }

    /// Split ZSCII input into words.
    ///
    /// Spaces only separate words; each dictionary separator becomes a
    /// word of its own.
    pub fn tokenize(&self, memory: &[u8], input: &[u8]) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start: Option<usize> = None;

        let finish = |tokens: &mut Vec<Token>, from: usize, to: usize| {
            let word: String = input[from..to]
                .iter()
                .filter_map(|b| text::zscii_to_char(*b as u16))
                .collect();
            let dict_addr = self.lookup(memory, &word);
            tokens.push(Token {
                text: word,
                position: from + 1,
                dict_addr,
            });
        };

        for (i, &b) in input.iter().enumerate() {
            if b == b' ' {
                if let Some(from) = start.take() {
                    finish(&mut tokens, from, i);
                }
            } else if self.separators.contains(&b) {
                if let Some(from) = start.take() {
                    finish(&mut tokens, from, i);
                }
                finish(&mut tokens, i, i + 1);
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(from) = start {
            finish(&mut tokens, from, input.len());
        }
        tokens
    }
}

impl VM {
    /// Store a line of input into an sread text buffer and, when
    /// `parse_addr` is non-zero, tokenize it into the parse buffer.
    ///
    /// The line is lowercased and truncated to the buffer's capacity
    /// (byte 0 minus one). Any whitespace is stored as a space. Returns
    /// the tokens written.
    pub fn store_input(
        &mut self,
        dictionary: &Dictionary,
        line: &str,
        text_addr: u32,
        parse_addr: u32,
    ) -> ZResult<Vec<Token>> {
        let capacity = (self.read_byte(text_addr) as usize).saturating_sub(1);
        let zscii: Vec<u8> = line
            .to_lowercase()
            .chars()
            .filter(|c| *c != '\n' && *c != '\r')
            // Tabs and other whitespace only separate words
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .filter_map(text::char_to_zscii)
            .filter(|code| *code <= 0xFF)
            .map(|code| code as u8)
            .take(capacity)
            .collect();

        for (i, b) in zscii.iter().enumerate() {
            self.write_byte(text_addr + 1 + i as u32, *b)?;
        }
        self.write_byte(text_addr + 1 + zscii.len() as u32, 0)?;

        if parse_addr == 0 {
            return Ok(Vec::new());
        }

        let mut tokens = dictionary.tokenize(&self.game.memory, &zscii);
        let max_words = self.read_byte(parse_addr) as usize;
        if tokens.len() > max_words {
            debug!("Input has {} words, parse buffer holds {}", tokens.len(), max_words);
            tokens.truncate(max_words);
        }

        self.write_byte(parse_addr + 1, tokens.len() as u8)?;
        for (i, token) in tokens.iter().enumerate() {
            let block = parse_addr + 2 + i as u32 * 4;
            self.write_word(block, token.dict_addr)?;
            self.write_byte(block + 2, token.text.chars().count() as u8)?;
            self.write_byte(block + 3, token.position as u8)?;
        }
        Ok(tokens)
    }
}
