//! Synthetic version 3 story images for integration tests
//!
//! Layout: globals at 0x0100, object table at 0x0300, property tables from
//! 0x0400, dictionary at 0x0800 (also the static memory base), code at
//! 0x1000, 8K image.

#![allow(dead_code)]

use gruesome::host_headless::HeadlessHost;
use gruesome::interpreter::Interpreter;
use gruesome::text::{encode_dictionary_word, encode_string};
use gruesome::vm::Game;

pub const GLOBALS: usize = 0x0100;
pub const OBJECTS: usize = 0x0300;
pub const PROPERTIES: usize = 0x0400;
pub const DICTIONARY: usize = 0x0800;
pub const CODE: usize = 0x1000;
pub const STORY_SIZE: usize = 0x2000;

/// Free dynamic memory for text/parse buffers and tables
pub const SCRATCH: u16 = 0x0600;

const SEPARATORS: &[u8] = b".,";
const ENTRY_LENGTH: usize = 7;

pub struct ObjectDef {
    pub name: String,
    pub parent: u8,
    pub sibling: u8,
    pub child: u8,
    pub attributes: [u8; 4],
    /// (number, data), in descending property number order
    pub properties: Vec<(u8, Vec<u8>)>,
}

pub struct StoryBuilder {
    release: u16,
    serial: [u8; 6],
    objects: Vec<ObjectDef>,
    words: Vec<String>,
    code: Vec<u8>,
    routines: Vec<(usize, Vec<u8>)>,
    globals: Vec<(u8, u16)>,
}

impl Default for StoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryBuilder {
    pub fn new() -> Self {
        StoryBuilder {
            release: 1,
            serial: *b"261016",
            objects: Vec::new(),
            words: Vec::new(),
            code: Vec::new(),
            routines: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn release(mut self, release: u16) -> Self {
        self.release = release;
        self
    }

    pub fn object(mut self, name: &str, parent: u8, sibling: u8, child: u8) -> Self {
        self.objects.push(ObjectDef {
            name: name.to_string(),
            parent,
            sibling,
            child,
            attributes: [0; 4],
            properties: Vec::new(),
        });
        self
    }

    /// Add a property to the most recently added object
    pub fn property(mut self, number: u8, data: &[u8]) -> Self {
        if let Some(obj) = self.objects.last_mut() {
            obj.properties.push((number, data.to_vec()));
            obj.properties.sort_by(|a, b| b.0.cmp(&a.0));
        }
        self
    }

    pub fn words(mut self, words: &[&str]) -> Self {
        self.words.extend(words.iter().map(|w| w.to_string()));
        self
    }

    pub fn code(mut self, code: &[u8]) -> Self {
        self.code = code.to_vec();
        self
    }

    /// Place a routine (header plus body) at a byte address above the code
    pub fn routine(mut self, addr: usize, bytes: &[u8]) -> Self {
        self.routines.push((addr, bytes.to_vec()));
        self
    }

    pub fn global(mut self, var: u8, value: u16) -> Self {
        self.globals.push((var, value));
        self
    }

    /// Byte address of the `index`th dictionary entry (sorted order)
    pub fn dictionary_entry(index: usize) -> u16 {
        (DICTIONARY + 1 + SEPARATORS.len() + 3 + index * ENTRY_LENGTH) as u16
    }

    pub fn build(&self) -> Vec<u8> {
        let mut memory = vec![0u8; STORY_SIZE];
        memory[0x00] = 3;
        put_word(&mut memory, 0x02, self.release);
        put_word(&mut memory, 0x04, CODE as u16);
        put_word(&mut memory, 0x06, CODE as u16);
        put_word(&mut memory, 0x08, DICTIONARY as u16);
        put_word(&mut memory, 0x0A, OBJECTS as u16);
        put_word(&mut memory, 0x0C, GLOBALS as u16);
        put_word(&mut memory, 0x0E, DICTIONARY as u16);
        memory[0x12..0x18].copy_from_slice(&self.serial);
        put_word(&mut memory, 0x18, 0x0040);
        put_word(&mut memory, 0x1A, (STORY_SIZE / 2) as u16);

        for (var, value) in &self.globals {
            put_word(&mut memory, GLOBALS + (*var as usize - 0x10) * 2, *value);
        }

        let mut props = PROPERTIES;
        for (i, obj) in self.objects.iter().enumerate() {
            let entry = OBJECTS + 62 + i * 9;
            memory[entry..entry + 4].copy_from_slice(&obj.attributes);
            memory[entry + 4] = obj.parent;
            memory[entry + 5] = obj.sibling;
            memory[entry + 6] = obj.child;
            put_word(&mut memory, entry + 7, props as u16);

            let name = if obj.name.is_empty() {
                Vec::new()
            } else {
                encode_string(&obj.name)
            };
            memory[props] = (name.len() / 2) as u8;
            props += 1;
            memory[props..props + name.len()].copy_from_slice(&name);
            props += name.len();
            for (number, data) in &obj.properties {
                memory[props] = ((data.len() as u8 - 1) << 5) | number;
                memory[props + 1..props + 1 + data.len()].copy_from_slice(data);
                props += 1 + data.len();
            }
            memory[props] = 0;
            props += 1;
        }

        let mut encoded: Vec<[u8; 4]> = self.words.iter().map(|w| encode_dictionary_word(w)).collect();
        encoded.sort();
        let mut at = DICTIONARY;
        memory[at] = SEPARATORS.len() as u8;
        memory[at + 1..at + 1 + SEPARATORS.len()].copy_from_slice(SEPARATORS);
        at += 1 + SEPARATORS.len();
        memory[at] = ENTRY_LENGTH as u8;
        put_word(&mut memory, at + 1, encoded.len() as u16);
        at += 3;
        for word in &encoded {
            memory[at..at + 4].copy_from_slice(word);
            at += ENTRY_LENGTH;
        }

        memory[CODE..CODE + self.code.len()].copy_from_slice(&self.code);
        for (addr, bytes) in &self.routines {
            memory[*addr..*addr + bytes.len()].copy_from_slice(bytes);
        }

        let checksum = memory[0x40..]
            .iter()
            .fold(0u16, |sum, b| sum.wrapping_add(*b as u16));
        put_word(&mut memory, 0x1C, checksum);
        memory
    }

    pub fn game(&self) -> Game {
        Game::from_memory(self.build()).expect("synthetic story should load")
    }

    pub fn interpreter(&self) -> Interpreter<HeadlessHost> {
        self.interpreter_with(HeadlessHost::new())
    }

    pub fn interpreter_with(&self, host: HeadlessHost) -> Interpreter<HeadlessHost> {
        Interpreter::new(self.game(), host).expect("interpreter should start")
    }
}

/// The standard test world: a room holding a lamp and a key, and a
/// handful of vocabulary words
pub fn small_world() -> StoryBuilder {
    StoryBuilder::new()
        .object("room", 0, 0, 2)
        .property(10, &[0x00, 0x64])
        .object("lamp", 1, 3, 0)
        .property(10, &[0x00, 0xC8])
        .property(5, &[0x02])
        .object("key", 1, 0, 0)
        .object("box", 0, 0, 0)
        .words(&["take", "lamp", "north", "key"])
}

pub fn put_word(memory: &mut [u8], addr: usize, value: u16) {
    memory[addr..addr + 2].copy_from_slice(&value.to_be_bytes());
}
