//! Bank listings of the patches and performances stored on the synth.

use crate::bits::BitBuffer;
use crate::error::EntryError;
use crate::schema::EntryData;
use g2_types::EntryType;
use log::debug;
use std::collections::BTreeMap;

const BANK_MARKER: u32 = 0x03;
const LIST_DONE: u32 = 0x04;
const LIST_MORE: u32 = 0x05;

// Constant bytes between the list type code and the entry type.
const HEADER_LEN: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub category: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryBank {
    pub bank: u32,
    pub first_entry: u32,
    pub entries: Vec<Entry>,
}

/// One response to a list request. A listing that is not `done` continues from the entry
/// following the last one returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryList {
    pub entry_type: EntryType,
    pub banks: Vec<EntryBank>,
    pub done: bool,
}

impl EntryList {
    /// Parses the content following the list type code.
    pub fn parse(content: &[u8]) -> Result<EntryList, EntryError> {
        let data = content.get(HEADER_LEN..).unwrap_or_default();
        let mut bb = BitBuffer::from(data);

        let type_index = bb.get(8)?;
        let entry_type = EntryType::from_index(type_index).ok_or(EntryError::UnknownType(type_index))?;

        let mut banks: Vec<EntryBank> = Vec::new();
        while bb.bits_remaining() >= 8 {
            match bb.peek(8)? {
                BANK_MARKER => {
                    bb.get(8)?;
                    banks.push(EntryBank {
                        bank: bb.get(8)?,
                        first_entry: bb.get(8)?,
                        entries: vec![],
                    });
                }
                LIST_DONE | LIST_MORE => {
                    let done = bb.get(8)? == LIST_DONE;
                    debug!("Entry list for {}: {} banks, done: {}", entry_type, banks.len(), done);
                    return Ok(EntryList {
                        entry_type,
                        banks,
                        done,
                    });
                }
                _ => {
                    let bank = banks.last_mut().ok_or(EntryError::NoBank)?;
                    let values = EntryData::fields().read(&mut bb)?;
                    bank.entries.push(Entry {
                        name: values.string(EntryData::Name)?.to_string(),
                        category: values.int(EntryData::Category)?,
                    });
                }
            }
        }
        Err(EntryError::Unterminated)
    }

    /// Where the next request should continue from, if the listing is incomplete.
    pub fn next_position(&self) -> Option<(u32, u32)> {
        if self.done {
            return None;
        }
        let last = self.banks.last()?;
        Some((last.bank, last.first_entry + last.entries.len() as u32))
    }
}

/// Accumulated listings, bank then entry index to entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entries {
    banks: BTreeMap<u32, BTreeMap<u32, Entry>>,
}

impl Entries {
    pub fn merge(&mut self, list: &EntryList) {
        for bank in &list.banks {
            let entries = self.banks.entry(bank.bank).or_default();
            for (offset, entry) in bank.entries.iter().enumerate() {
                entries.insert(bank.first_entry + offset as u32, entry.clone());
            }
        }
    }

    pub fn bank(&self, bank: u32) -> Option<&BTreeMap<u32, Entry>> {
        self.banks.get(&bank)
    }

    pub fn banks(&self) -> impl Iterator<Item = (&u32, &BTreeMap<u32, Entry>)> {
        self.banks.iter()
    }

    pub fn len(&self) -> usize {
        self.banks.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        bytes
    }

    fn listing(terminator: u8) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x01, 0x05];
        data.extend(name("Bass"));
        data.push(2);
        data.extend(name("Pad"));
        data.push(7);
        data.extend([0x03, 0x02, 0x00]);
        data.extend(name("Lead"));
        data.push(1);
        data.push(terminator);
        data
    }

    #[test]
    fn parses_banks() {
        let list = EntryList::parse(&listing(0x05)).unwrap();
        assert_eq!(list.entry_type, EntryType::Patch);
        assert!(!list.done);
        assert_eq!(list.banks.len(), 2);
        assert_eq!(list.banks[0].bank, 1);
        assert_eq!(list.banks[0].first_entry, 5);
        assert_eq!(
            list.banks[0].entries[1],
            Entry {
                name: String::from("Pad"),
                category: 7
            }
        );
        assert_eq!(list.next_position(), Some((2, 1)));

        let mut entries = Entries::default();
        entries.merge(&list);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.bank(1).unwrap()[&6].name, "Pad");
    }

    #[test]
    fn final_listing() {
        let list = EntryList::parse(&listing(0x04)).unwrap();
        assert!(list.done);
        assert_eq!(list.next_position(), None);
    }

    #[test]
    fn malformed_listings() {
        let missing_bank = [0, 0, 0, 0, 0x01, b'X', 0x00, 0x01, 0x04];
        assert!(matches!(
            EntryList::parse(&missing_bank),
            Err(EntryError::NoBank)
        ));

        let unterminated = [0, 0, 0, 0, 0x01, 0x03, 0x00, 0x00];
        assert!(matches!(
            EntryList::parse(&unterminated),
            Err(EntryError::Unterminated)
        ));

        assert!(matches!(
            EntryList::parse(&[0, 0, 0, 0, 0x09, 0x04]),
            Err(EntryError::UnknownType(9))
        ));
    }
}
