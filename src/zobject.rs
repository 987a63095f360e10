/// Z-Machine object tree for version 3
///
/// V3 object format:
/// - Maximum 255 objects, numbered from 1 (0 is the "nothing" sentinel)
/// - 32 attributes (0-31), most significant bit first
/// - 31 default properties at the start of the object table
/// - 9-byte object entries: attributes[4], parent, sibling, child, properties[2]
/// - Property numbers 1-31, size 1-8 in the top 3 bits of the size byte
use bitvec::prelude::*;
use log::{debug, warn};

use crate::error::{ZError, ZResult};
use crate::text;
use crate::vm::VM;

pub const MAX_OBJECTS: u16 = 255;
pub const MAX_ATTRIBUTES: u16 = 31;
pub const MAX_PROPERTIES: u16 = 31;
pub const OBJECT_ENTRY_SIZE: usize = 9;

const PARENT_OFFSET: usize = 4;
const SIBLING_OFFSET: usize = 5;
const CHILD_OFFSET: usize = 6;
const PROPERTIES_OFFSET: usize = 7;

/// Object tree and property access over the VM's memory
pub trait ObjectSystem {
    fn object_addr(&self, obj_num: u16) -> ZResult<usize>;
    fn get_parent(&self, obj_num: u16) -> ZResult<u16>;
    fn get_sibling(&self, obj_num: u16) -> ZResult<u16>;
    fn get_child(&self, obj_num: u16) -> ZResult<u16>;
    fn set_parent(&mut self, obj_num: u16, parent: u16) -> ZResult<()>;
    fn set_sibling(&mut self, obj_num: u16, sibling: u16) -> ZResult<()>;
    fn set_child(&mut self, obj_num: u16, child: u16) -> ZResult<()>;
    fn test_attribute(&self, obj_num: u16, attr_num: u16) -> ZResult<bool>;
    fn set_attribute(&mut self, obj_num: u16, attr_num: u16, value: bool) -> ZResult<()>;
    fn object_name(&self, obj_num: u16) -> ZResult<String>;
    fn get_property(&self, obj_num: u16, prop_num: u16) -> ZResult<u16>;
    fn put_property(&mut self, obj_num: u16, prop_num: u16, value: u16) -> ZResult<()>;
    fn get_property_addr(&self, obj_num: u16, prop_num: u16) -> ZResult<u16>;
    fn get_property_len(&self, data_addr: u16) -> u16;
    fn get_next_property(&self, obj_num: u16, prop_num: u16) -> ZResult<u16>;
    fn remove_object(&mut self, obj_num: u16) -> ZResult<()>;
    fn insert_object(&mut self, obj_num: u16, dest_num: u16) -> ZResult<()>;
}

/// One entry in an object's property list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PropertyEntry {
    number: u16,
    /// Address of the size byte
    addr: usize,
    /// Data length in bytes (1-8)
    len: usize,
}

impl PropertyEntry {
    fn data_addr(&self) -> usize {
        self.addr + 1
    }
}

impl VM {
    fn link(&self, obj_num: u16, offset: usize) -> ZResult<u16> {
        if obj_num == 0 {
            return Ok(0);
        }
        let addr = self.object_addr(obj_num)?;
        Ok(self.read_byte((addr + offset) as u32) as u16)
    }

    fn set_link(&mut self, obj_num: u16, offset: usize, target: u16) -> ZResult<()> {
        if obj_num == 0 {
            warn!("Ignoring link update on object 0");
            return Ok(());
        }
        if target > MAX_OBJECTS {
            return Err(ZError::InvalidObject(target));
        }
        let addr = self.object_addr(obj_num)?;
        self.write_byte((addr + offset) as u32, target as u8)
    }

    /// Start of the property list (just past the short name)
    fn first_property_addr(&self, obj_num: u16) -> ZResult<usize> {
        let obj_addr = self.object_addr(obj_num)?;
        let table = self.read_word((obj_addr + PROPERTIES_OFFSET) as u32) as usize;
        let text_len = self.read_byte(table as u32) as usize;
        Ok(table + 1 + text_len * 2)
    }

    fn property_at(&self, addr: usize) -> Option<PropertyEntry> {
        let size_byte = self.read_byte(addr as u32);
        if size_byte == 0 {
            return None;
        }
        Some(PropertyEntry {
            number: (size_byte & 0x1F) as u16,
            addr,
            len: ((size_byte >> 5) & 0x07) as usize + 1,
        })
    }

    /// Walk the descending property list looking for `prop_num`
    fn find_property(&self, obj_num: u16, prop_num: u16) -> ZResult<Option<PropertyEntry>> {
        let mut addr = self.first_property_addr(obj_num)?;
        while let Some(entry) = self.property_at(addr) {
            if entry.number == prop_num {
                return Ok(Some(entry));
            }
            if entry.number < prop_num {
                break;
            }
            addr = entry.data_addr() + entry.len;
        }
        Ok(None)
    }

    fn default_property(&self, prop_num: u16) -> u16 {
        if prop_num == 0 || prop_num > MAX_PROPERTIES {
            return 0;
        }
        let addr = self.game.header.object_table_addr + (prop_num as usize - 1) * 2;
        self.read_word(addr as u32)
    }
}

impl ObjectSystem for VM {
    fn object_addr(&self, obj_num: u16) -> ZResult<usize> {
        if obj_num == 0 || obj_num > MAX_OBJECTS {
            return Err(ZError::InvalidObject(obj_num));
        }
        let tree_base = self.game.header.object_table_addr + MAX_PROPERTIES as usize * 2;
        let addr = tree_base + (obj_num as usize - 1) * OBJECT_ENTRY_SIZE;
        if addr + OBJECT_ENTRY_SIZE > self.game.memory.len() {
            return Err(ZError::InvalidObject(obj_num));
        }
        Ok(addr)
    }

    fn get_parent(&self, obj_num: u16) -> ZResult<u16> {
        self.link(obj_num, PARENT_OFFSET)
    }

    fn get_sibling(&self, obj_num: u16) -> ZResult<u16> {
        self.link(obj_num, SIBLING_OFFSET)
    }

    fn get_child(&self, obj_num: u16) -> ZResult<u16> {
        self.link(obj_num, CHILD_OFFSET)
    }

    fn set_parent(&mut self, obj_num: u16, parent: u16) -> ZResult<()> {
        self.set_link(obj_num, PARENT_OFFSET, parent)
    }

    fn set_sibling(&mut self, obj_num: u16, sibling: u16) -> ZResult<()> {
        self.set_link(obj_num, SIBLING_OFFSET, sibling)
    }

    fn set_child(&mut self, obj_num: u16, child: u16) -> ZResult<()> {
        self.set_link(obj_num, CHILD_OFFSET, child)
    }

    fn test_attribute(&self, obj_num: u16, attr_num: u16) -> ZResult<bool> {
        if obj_num == 0 {
            return Ok(false);
        }
        if attr_num > MAX_ATTRIBUTES {
            debug!("Attribute {attr_num} out of range for v3 - testing as false");
            return Ok(false);
        }
        let addr = self.object_addr(obj_num)?;
        let bits = self.game.memory[addr..addr + 4].view_bits::<Msb0>();
        Ok(bits[attr_num as usize])
    }

    fn set_attribute(&mut self, obj_num: u16, attr_num: u16, value: bool) -> ZResult<()> {
        if obj_num == 0 {
            warn!("Ignoring attribute {attr_num} change on object 0");
            return Ok(());
        }
        if attr_num > MAX_ATTRIBUTES {
            debug!("Attribute {attr_num} out of range for v3 - ignored");
            return Ok(());
        }
        let addr = self.object_addr(obj_num)?;
        if addr + 4 > self.game.dynamic_size() {
            return Err(ZError::MemoryAccess {
                addr: addr as u32,
                write: true,
            });
        }
        self.game.memory[addr..addr + 4]
            .view_bits_mut::<Msb0>()
            .set(attr_num as usize, value);
        Ok(())
    }

    fn object_name(&self, obj_num: u16) -> ZResult<String> {
        if obj_num == 0 {
            return Ok(String::new());
        }
        let obj_addr = self.object_addr(obj_num)?;
        let table = self.read_word((obj_addr + PROPERTIES_OFFSET) as u32) as usize;
        if self.read_byte(table as u32) == 0 {
            return Ok(String::new());
        }
        let (name, _) = text::decode_string(
            &self.game.memory,
            table + 1,
            self.game.header.abbrev_table,
        )?;
        Ok(name)
    }

    fn get_property(&self, obj_num: u16, prop_num: u16) -> ZResult<u16> {
        if obj_num == 0 {
            return Ok(0);
        }
        match self.find_property(obj_num, prop_num)? {
            Some(entry) if entry.len == 1 => Ok(self.read_byte(entry.data_addr() as u32) as u16),
            Some(entry) => {
                if entry.len > 2 {
                    debug!(
                        "get_prop on {}-byte property {} of object {} - reading first word",
                        entry.len, prop_num, obj_num
                    );
                }
                Ok(self.read_word(entry.data_addr() as u32))
            }
            None => Ok(self.default_property(prop_num)),
        }
    }

    fn put_property(&mut self, obj_num: u16, prop_num: u16, value: u16) -> ZResult<()> {
        if obj_num == 0 {
            warn!("Ignoring put_prop {prop_num} on object 0");
            return Ok(());
        }
        let entry = self
            .find_property(obj_num, prop_num)?
            .ok_or(ZError::InvalidProperty {
                object: obj_num,
                property: prop_num,
            })?;
        match entry.len {
            1 => self.write_byte(entry.data_addr() as u32, value as u8),
            2 => self.write_word(entry.data_addr() as u32, value),
            _ => Err(ZError::InvalidProperty {
                object: obj_num,
                property: prop_num,
            }),
        }
    }

    fn get_property_addr(&self, obj_num: u16, prop_num: u16) -> ZResult<u16> {
        if obj_num == 0 {
            return Ok(0);
        }
        Ok(self
            .find_property(obj_num, prop_num)?
            .map(|entry| entry.data_addr() as u16)
            .unwrap_or(0))
    }

    fn get_property_len(&self, data_addr: u16) -> u16 {
        if data_addr == 0 {
            return 0;
        }
        let size_byte = self.read_byte(data_addr as u32 - 1);
        ((size_byte >> 5) & 0x07) as u16 + 1
    }

    fn get_next_property(&self, obj_num: u16, prop_num: u16) -> ZResult<u16> {
        if obj_num == 0 {
            return Ok(0);
        }
        let next_addr = if prop_num == 0 {
            self.first_property_addr(obj_num)?
        } else {
            let entry = self
                .find_property(obj_num, prop_num)?
                .ok_or(ZError::InvalidProperty {
                    object: obj_num,
                    property: prop_num,
                })?;
            entry.data_addr() + entry.len
        };
        Ok(self.property_at(next_addr).map(|e| e.number).unwrap_or(0))
    }

    /// Detach an object from its parent, keeping the sibling chain intact
    fn remove_object(&mut self, obj_num: u16) -> ZResult<()> {
        if obj_num == 0 {
            warn!("Ignoring remove_obj on object 0");
            return Ok(());
        }
        let parent = self.get_parent(obj_num)?;
        if parent == 0 {
            return Ok(());
        }
        let next = self.get_sibling(obj_num)?;

        let first = self.get_child(parent)?;
        if first == obj_num {
            self.set_child(parent, next)?;
        } else {
            // Find the predecessor in the sibling chain
            let mut current = first;
            let mut steps = 0;
            loop {
                if current == 0 || steps > MAX_OBJECTS {
                    warn!(
                        "Object {obj_num} not found in child chain of its parent {parent}; chain left as is"
                    );
                    break;
                }
                let sibling = self.get_sibling(current)?;
                if sibling == obj_num {
                    self.set_sibling(current, next)?;
                    break;
                }
                current = sibling;
                steps += 1;
            }
        }

        self.set_parent(obj_num, 0)?;
        self.set_sibling(obj_num, 0)
    }

    /// Move an object to be the first child of `dest_num`, or detach it when `dest_num` is 0
    fn insert_object(&mut self, obj_num: u16, dest_num: u16) -> ZResult<()> {
        if obj_num == 0 {
            warn!("Ignoring insert_obj of object 0");
            return Ok(());
        }
        self.remove_object(obj_num)?;
        if dest_num == 0 {
            return Ok(());
        }
        let first = self.get_child(dest_num)?;
        self.set_sibling(obj_num, first)?;
        self.set_parent(obj_num, dest_num)?;
        self.set_child(dest_num, obj_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Game;
    use test_log::test;

    const OBJ_TABLE: usize = 0x100;
    const PROPS: usize = 0x300;

    /// Five objects, each with property 12 (word), 7 (byte) and 3 (4 bytes)
    fn test_vm() -> VM {
        let mut memory = vec![0u8; 0x1000];
        memory[0x00] = 3;
        memory[0x06] = 0x08; // Initial PC
        memory[0x0a] = (OBJ_TABLE >> 8) as u8;
        memory[0x0b] = OBJ_TABLE as u8;
        memory[0x0c] = 0x04; // Globals at 0x0400
        memory[0x0e] = 0x06; // Static memory at 0x0600

        // Default for property 5
        memory[OBJ_TABLE + 8] = 0x12;
        memory[OBJ_TABLE + 9] = 0x34;

        for obj in 1..=5usize {
            let entry = OBJ_TABLE + 62 + (obj - 1) * OBJECT_ENTRY_SIZE;
            let table = PROPS + (obj - 1) * 0x20;
            memory[entry + 7] = (table >> 8) as u8;
            memory[entry + 8] = table as u8;

            let name = text::encode_string("box");
            memory[table] = (name.len() / 2) as u8;
            memory[table + 1..table + 1 + name.len()].copy_from_slice(&name);
            let mut p = table + 1 + name.len();
            for (size_byte, data) in [
                (0x20 | 12u8, vec![0x01, 0x00 + obj as u8]),
                (7u8, vec![obj as u8]),
                (0x60 | 3u8, vec![1, 2, 3, 4]),
            ] {
                memory[p] = size_byte;
                memory[p + 1..p + 1 + data.len()].copy_from_slice(&data);
                p += 1 + data.len();
            }
            memory[p] = 0;
        }

        VM::new(Game::from_memory(memory).unwrap())
    }

    fn children(vm: &VM, parent: u16) -> Vec<u16> {
        let mut out = Vec::new();
        let mut current = vm.get_child(parent).unwrap();
        while current != 0 {
            out.push(current);
            assert!(out.len() <= 255, "cycle in sibling chain");
            current = vm.get_sibling(current).unwrap();
        }
        out
    }

    #[test]
    fn insert_makes_object_first_child() {
        let mut vm = test_vm();
        vm.insert_object(2, 1).unwrap();
        vm.insert_object(3, 1).unwrap();
        vm.insert_object(4, 1).unwrap();
        assert_eq!(children(&vm, 1), vec![4, 3, 2]);
        assert_eq!(vm.get_parent(3).unwrap(), 1);
    }

    #[test]
    fn moves_preserve_chain_integrity() {
        let mut vm = test_vm();
        for obj in 2..=5 {
            vm.insert_object(obj, 1).unwrap();
        }
        // Middle, head, then tail of the chain
        vm.insert_object(3, 2).unwrap();
        vm.insert_object(5, 2).unwrap();
        vm.insert_object(2, 4).unwrap();

        assert_eq!(children(&vm, 1), vec![4]);
        assert_eq!(children(&vm, 4), vec![2]);
        assert_eq!(children(&vm, 2), vec![5, 3]);
        for obj in [2, 3, 5] {
            let parent = vm.get_parent(obj).unwrap();
            assert_eq!(children(&vm, parent).iter().filter(|c| **c == obj).count(), 1);
        }
    }

    #[test]
    fn insert_into_nothing_detaches() {
        let mut vm = test_vm();
        vm.insert_object(2, 1).unwrap();
        vm.insert_object(2, 0).unwrap();
        assert_eq!(vm.get_parent(2).unwrap(), 0);
        assert_eq!(vm.get_sibling(2).unwrap(), 0);
        assert!(children(&vm, 1).is_empty());
    }

    #[test]
    fn object_zero_is_a_sentinel() {
        let mut vm = test_vm();
        assert_eq!(vm.get_parent(0).unwrap(), 0);
        assert_eq!(vm.get_child(0).unwrap(), 0);
        assert!(!vm.test_attribute(0, 3).unwrap());
        vm.remove_object(0).unwrap();
        assert!(matches!(vm.object_addr(0), Err(ZError::InvalidObject(0))));
    }

    #[test]
    fn attributes_are_msb_first() {
        let mut vm = test_vm();
        vm.set_attribute(1, 0, true).unwrap();
        vm.set_attribute(1, 31, true).unwrap();
        let addr = vm.object_addr(1).unwrap();
        assert_eq!(vm.read_byte(addr as u32), 0x80);
        assert_eq!(vm.read_byte(addr as u32 + 3), 0x01);
        assert!(vm.test_attribute(1, 31).unwrap());
        vm.set_attribute(1, 0, false).unwrap();
        assert!(!vm.test_attribute(1, 0).unwrap());
    }

    #[test]
    fn properties_and_defaults() {
        let vm = test_vm();
        assert_eq!(vm.get_property(2, 12).unwrap(), 0x0102);
        assert_eq!(vm.get_property(2, 7).unwrap(), 2);
        assert_eq!(vm.get_property(2, 5).unwrap(), 0x1234);
        assert_eq!(vm.get_property(2, 20).unwrap(), 0);
        assert_eq!(vm.object_name(2).unwrap(), "box");
    }

    #[test]
    fn property_addresses_and_lengths() {
        let vm = test_vm();
        let addr = vm.get_property_addr(1, 3).unwrap();
        assert_ne!(addr, 0);
        assert_eq!(vm.get_property_len(addr), 4);
        assert_eq!(vm.read_byte(addr as u32 + 3), 4);
        assert_eq!(vm.get_property_addr(1, 4).unwrap(), 0);
        assert_eq!(vm.get_property_len(0), 0);
    }

    #[test]
    fn next_property_walks_descending() {
        let vm = test_vm();
        assert_eq!(vm.get_next_property(1, 0).unwrap(), 12);
        assert_eq!(vm.get_next_property(1, 12).unwrap(), 7);
        assert_eq!(vm.get_next_property(1, 7).unwrap(), 3);
        assert_eq!(vm.get_next_property(1, 3).unwrap(), 0);
        assert!(vm.get_next_property(1, 9).is_err());
    }

    #[test]
    fn put_property_rules() {
        let mut vm = test_vm();
        vm.put_property(1, 12, 0xABCD).unwrap();
        vm.put_property(1, 7, 0x1FF).unwrap();
        assert_eq!(vm.get_property(1, 12).unwrap(), 0xABCD);
        assert_eq!(vm.get_property(1, 7).unwrap(), 0xFF);
        assert_eq!(
            vm.put_property(1, 9, 1),
            Err(ZError::InvalidProperty { object: 1, property: 9 })
        );
        assert!(vm.put_property(1, 3, 1).is_err());
    }
}
