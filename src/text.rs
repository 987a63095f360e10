use std::collections::HashMap;

use bitreader::BitReader;
use lazy_static::lazy_static;
use log::{debug, trace};

use crate::error::{ZError, ZResult};

/// The three alphabets for Z-string decoding
pub const ALPHABET_A0: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const ALPHABET_A1: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// A2 positions 0 and 1 are the ZSCII escape and newline, never literal characters
const ALPHABET_A2_V3: &[u8] = b" \n0123456789.,!?_#'\"/\\-:()";

/// Number of Z-characters stored in a v3 dictionary entry
pub const DICT_WORD_ZCHARS: usize = 6;
/// Encoded byte width of a v3 dictionary word
pub const DICT_WORD_BYTES: usize = 4;

const SHIFT_A1: u8 = 4;
const SHIFT_A2: u8 = 5;
const ZSCII_ESCAPE: u8 = 6;
const PAD_ZCHAR: u8 = 5;

/// Default ZSCII 155-223 to Unicode table
const UNICODE_TABLE: [char; 69] = [
    'ä', 'ö', 'ü', 'Ä', 'Ö', 'Ü', 'ß', '»', '«', 'ë', 'ï', 'ÿ', 'Ë', 'Ï', 'á', 'é', 'í', 'ó',
    'ú', 'ý', 'Á', 'É', 'Í', 'Ó', 'Ú', 'Ý', 'à', 'è', 'ì', 'ò', 'ù', 'À', 'È', 'Ì', 'Ò', 'Ù',
    'â', 'ê', 'î', 'ô', 'û', 'Â', 'Ê', 'Î', 'Ô', 'Û', 'å', 'Å', 'ø', 'Ø', 'ã', 'ñ', 'õ', 'Ã',
    'Ñ', 'Õ', 'æ', 'Æ', 'ç', 'Ç', 'þ', 'ð', 'Þ', 'Ð', '£', 'œ', 'Œ', '¡', '¿',
];

lazy_static! {
    /// Reverse alphabet map: character to (alphabet, Z-character)
    static ref ENCODE_MAP: HashMap<char, (u8, u8)> = {
        let mut m = HashMap::new();
        for (alphabet, table) in [(0u8, ALPHABET_A0), (1, ALPHABET_A1), (2, ALPHABET_A2_V3)] {
            for (i, b) in table.iter().enumerate() {
                if alphabet == 2 && i < 2 {
                    continue;
                }
                m.entry(*b as char).or_insert((alphabet, i as u8 + 6));
            }
        }
        m
    };
}

/// Convert a ZSCII output code to a character, if it has one
pub fn zscii_to_char(code: u16) -> Option<char> {
    match code {
        0 => None,
        13 => Some('\n'),
        32..=126 => Some(code as u8 as char),
        155..=223 => Some(UNICODE_TABLE[(code - 155) as usize]),
        _ => Some('?'),
    }
}

/// Convert a character to its ZSCII code, if representable
pub fn char_to_zscii(ch: char) -> Option<u16> {
    match ch {
        '\n' => Some(13),
        ' '..='~' => Some(ch as u16),
        _ => UNICODE_TABLE
            .iter()
            .position(|c| *c == ch)
            .map(|i| i as u16 + 155),
    }
}

/// Split one text word into its end flag and three Z-characters
fn read_zchars_from_word(word: &[u8; 2]) -> Result<(bool, [u8; 3]), bitreader::BitReaderError> {
    let mut br = BitReader::new(word);
    let last = br.read_u8(1)? == 1;
    let mut chars = [0u8; 3];
    for c in chars.iter_mut() {
        *c = br.read_u8(5)?;
    }
    Ok((last, chars))
}

/// Collect Z-characters from `addr` up to and including the terminating word.
/// Returns the characters and the number of bytes consumed.
fn collect_zchars(memory: &[u8], addr: usize) -> ZResult<(Vec<u8>, usize)> {
    let mut zchars = Vec::new();
    let mut offset = addr;
    loop {
        if offset + 1 >= memory.len() {
            debug!("Z-string at {:05x} runs off the end of memory", addr);
            break;
        }
        let word = [memory[offset], memory[offset + 1]];
        offset += 2;
        let (last, chars) = read_zchars_from_word(&word).map_err(|e| ZError::Decode {
            pc: addr as u32,
            reason: format!("bad text word: {e}"),
        })?;
        trace!("Z-word {:02x}{:02x} = {:?}, end={}", word[0], word[1], chars, last);
        zchars.extend_from_slice(&chars);
        if last {
            break;
        }
    }
    Ok((zchars, offset - addr))
}

/// Decode a Z-string from memory starting at the given address.
/// Returns the decoded string and the number of bytes consumed.
pub fn decode_string(
    memory: &[u8],
    addr: usize,
    abbrev_table_addr: usize,
) -> ZResult<(String, usize)> {
    decode_string_inner(memory, addr, abbrev_table_addr, false)
}

fn decode_string_inner(
    memory: &[u8],
    addr: usize,
    abbrev_table_addr: usize,
    in_abbreviation: bool,
) -> ZResult<(String, usize)> {
    let (zchars, consumed) = collect_zchars(memory, addr)?;
    let mut result = String::new();

    let mut locked_alphabet = 0u8;
    let mut current_alphabet = 0u8;
    let mut last_shift: Option<u8> = None;

    let mut i = 0;
    while i < zchars.len() {
        let zc = zchars[i];
        i += 1;

        match zc {
            0 => {
                result.push(' ');
                current_alphabet = locked_alphabet;
                last_shift = None;
            }
            1..=3 => {
                if in_abbreviation {
                    return Err(ZError::Decode {
                        pc: addr as u32,
                        reason: "abbreviation text references another abbreviation".to_string(),
                    });
                }
                let Some(&index) = zchars.get(i) else {
                    debug!("Abbreviation prefix at end of string {:05x}", addr);
                    break;
                };
                i += 1;
                let abbrev_num = (zc as usize - 1) * 32 + index as usize;
                let entry = abbrev_table_addr + abbrev_num * 2;
                if entry + 1 >= memory.len() {
                    return Err(ZError::Decode {
                        pc: addr as u32,
                        reason: format!("abbreviation {abbrev_num} outside memory"),
                    });
                }
                let word_addr = u16::from_be_bytes([memory[entry], memory[entry + 1]]) as usize;
                let (expansion, _) =
                    decode_string_inner(memory, word_addr * 2, abbrev_table_addr, true)?;
                result.push_str(&expansion);
                current_alphabet = locked_alphabet;
                last_shift = None;
            }
            SHIFT_A1 | SHIFT_A2 => {
                let target = zc - 3;
                if last_shift == Some(zc) {
                    // Same shift twice locks the alphabet
                    locked_alphabet = target;
                    last_shift = None;
                } else {
                    last_shift = Some(zc);
                }
                current_alphabet = target;
            }
            _ => {
                last_shift = None;
                match current_alphabet {
                    2 if zc == ZSCII_ESCAPE => {
                        if i + 1 < zchars.len() {
                            let code = ((zchars[i] as u16) << 5) | zchars[i + 1] as u16;
                            i += 2;
                            if let Some(ch) = zscii_to_char(code) {
                                result.push(ch);
                            }
                        } else {
                            debug!("ZSCII escape truncated at end of string {:05x}", addr);
                            i = zchars.len();
                        }
                    }
                    2 => result.push(ALPHABET_A2_V3[(zc - 6) as usize] as char),
                    1 => result.push(ALPHABET_A1[(zc - 6) as usize] as char),
                    _ => result.push(ALPHABET_A0[(zc - 6) as usize] as char),
                }
                current_alphabet = locked_alphabet;
            }
        }
    }

    Ok((result, consumed))
}

/// Convert text to a Z-character sequence using temporary shifts only
pub fn encode_zchars(text: &str) -> Vec<u8> {
    let mut zchars = Vec::with_capacity(text.len());
    for ch in text.chars() {
        if ch == ' ' {
            zchars.push(0);
            continue;
        }
        if ch == '\n' {
            zchars.extend_from_slice(&[SHIFT_A2, 7]);
            continue;
        }
        match ENCODE_MAP.get(&ch) {
            Some((0, zc)) => zchars.push(*zc),
            Some((1, zc)) => zchars.extend_from_slice(&[SHIFT_A1, *zc]),
            Some((_, zc)) => zchars.extend_from_slice(&[SHIFT_A2, *zc]),
            None => {
                let code = char_to_zscii(ch).unwrap_or('?' as u16);
                zchars.extend_from_slice(&[
                    SHIFT_A2,
                    ZSCII_ESCAPE,
                    ((code >> 5) & 0x1F) as u8,
                    (code & 0x1F) as u8,
                ]);
            }
        }
    }
    zchars
}

/// Pack Z-characters three to a word, padding with 5s and marking the last word
pub fn pack_zchars(zchars: &[u8]) -> Vec<u8> {
    let mut padded = zchars.to_vec();
    while padded.is_empty() || padded.len() % 3 != 0 {
        padded.push(PAD_ZCHAR);
    }
    let words = padded.len() / 3;
    let mut bytes = Vec::with_capacity(words * 2);
    for (n, chunk) in padded.chunks(3).enumerate() {
        let mut word =
            ((chunk[0] as u16 & 0x1F) << 10) | ((chunk[1] as u16 & 0x1F) << 5) | (chunk[2] as u16 & 0x1F);
        if n + 1 == words {
            word |= 0x8000;
        }
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes
}

/// Encode text as a complete Z-string
pub fn encode_string(text: &str) -> Vec<u8> {
    pack_zchars(&encode_zchars(text))
}

/// Encode a word to the fixed v3 dictionary width: 6 Z-characters in 4 bytes.
///
/// The word is lowercased, truncated after six Z-characters (which may cut a
/// multi-character escape) and padded with 5s.
pub fn encode_dictionary_word(word: &str) -> [u8; DICT_WORD_BYTES] {
    let mut zchars = encode_zchars(&word.to_lowercase());
    zchars.truncate(DICT_WORD_ZCHARS);
    zchars.resize(DICT_WORD_ZCHARS, PAD_ZCHAR);
    let packed = pack_zchars(&zchars);
    let mut out = [0u8; DICT_WORD_BYTES];
    out.copy_from_slice(&packed[..DICT_WORD_BYTES]);
    out
}

/// Decode a string at a packed address
pub fn decode_string_at_packed_addr(
    memory: &[u8],
    packed_addr: u16,
    abbrev_table_addr: usize,
) -> ZResult<String> {
    let (string, _) = decode_string(memory, packed_addr as usize * 2, abbrev_table_addr)?;
    Ok(string)
}
