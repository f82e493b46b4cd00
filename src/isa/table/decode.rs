//! Reference decoder and encoder over a [`TableList`].

use std::cmp::Reverse;

use super::TableList;
use super::entry::{FieldEntry, TableEntry};
use crate::isa::bitfield::{BitSlice, fits_in, sign_extend};
use crate::isa::error::InstError;

/// One non-fixed field extracted from an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOperand {
    pub name: String,
    pub word: u32,
    /// Bits as stored in the word.
    pub raw: u64,
    /// Sign-extended when the field is signed, with the bias added back.
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct DecodedInstruction<'a> {
    pub entry: &'a TableEntry,
    pub operands: Vec<DecodedOperand>,
}

impl DecodedInstruction<'_> {
    pub fn mnemonic(&self) -> &str {
        &self.entry.mnemonic
    }

    pub fn operand(&self, name: &str) -> Option<&DecodedOperand> {
        self.operands.iter().find(|operand| operand.name == name)
    }
}

impl TableList {
    /// Decodes an instruction given as one integer per word.
    ///
    /// Among the entries whose fixed bits all match, the one with the most fixed bits wins;
    /// equal candidates resolve to the earliest in canonical order.
    pub fn decode(&self, words: &[u64]) -> Option<DecodedInstruction<'_>> {
        self.entries()
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.matches(words))
            .max_by_key(|(idx, entry)| (entry.specificity, Reverse(*idx)))
            .map(|(_, entry)| extract(entry, words))
    }

    /// Decodes from the start of a byte stream, reading each candidate's words with the byte
    /// order and widths of the Root it came from.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Option<DecodedInstruction<'_>> {
        self.entries()
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let words = read_words(entry, bytes)?;
                entry.matches(&words).then_some((idx, entry, words))
            })
            .max_by_key(|(idx, entry, _)| (entry.specificity, Reverse(*idx)))
            .map(|(_, entry, words)| extract(entry, &words))
    }

    /// Builds the words of `mnemonic` with fixed fields set and the given operands inserted.
    ///
    /// Operand values are logical: the bias is removed before insertion, and signed fields
    /// accept negative values. Operands that are not named stay zero.
    pub fn encode(&self, mnemonic: &str, operands: &[(&str, i64)]) -> Result<Vec<u64>, InstError> {
        let entry = self
            .get(mnemonic)
            .ok_or_else(|| InstError::Encode(format!("unknown instruction '{mnemonic}'")))?;
        let mut words: Vec<u64> = entry.words.iter().map(|word| word.value).collect();
        for &(name, value) in operands {
            let Some((word, field)) = entry.field(name) else {
                return Err(InstError::Encode(format!(
                    "instruction '{mnemonic}' has no field '{name}'"
                )));
            };
            if field.is_fixed() {
                return Err(InstError::Encode(format!(
                    "field '{name}' of '{mnemonic}' is fixed and cannot be set"
                )));
            }
            let raw = raw_bits(field, value).ok_or_else(|| {
                InstError::Encode(format!(
                    "value {value} does not fit field '{name}' of '{mnemonic}' ({} bits{}{})",
                    field.width,
                    if field.signed { ", signed" } else { "" },
                    if field.minus != 0 {
                        format!(", minus {}", field.minus)
                    } else {
                        String::new()
                    }
                ))
            })?;
            let slice = BitSlice::new(field.offset, field.width)
                .map_err(|err| InstError::Encode(err.to_string()))?;
            let slot = &mut words[word.index as usize];
            *slot = slice
                .write(*slot, raw)
                .map_err(|err| InstError::Encode(err.to_string()))?;
        }
        Ok(words)
    }
}

fn read_words(entry: &TableEntry, bytes: &[u8]) -> Option<Vec<u64>> {
    if bytes.len() < entry.byte_len() {
        return None;
    }
    let mut offset = 0;
    let words = entry
        .words
        .iter()
        .map(|word| {
            let len = word.byte_len();
            let value = entry.endianness.decode_word(&bytes[offset..offset + len]);
            offset += len;
            value
        })
        .collect();
    Some(words)
}

fn extract<'a>(entry: &'a TableEntry, words: &[u64]) -> DecodedInstruction<'a> {
    let operands = entry
        .fields()
        .filter(|(_, field)| !field.is_fixed())
        .map(|(word, field)| {
            let raw = field.read(words[word.index as usize]);
            let base = if field.signed {
                sign_extend(raw, field.width)
            } else {
                raw as i64
            };
            // The validator bounds `minus` to i64::MAX.
            DecodedOperand {
                name: field.name.clone(),
                word: word.index,
                raw,
                value: base.wrapping_add(field.minus as i64),
            }
        })
        .collect();
    DecodedInstruction { entry, operands }
}

/// Stored bits for a logical value, or `None` when it does not fit.
fn raw_bits(field: &FieldEntry, value: i64) -> Option<u64> {
    let stored = value.checked_sub(i64::try_from(field.minus).ok()?)?;
    if field.signed {
        if field.width >= 64 {
            return Some(stored as u64);
        }
        let min = -(1i64 << (field.width - 1));
        let max = (1i64 << (field.width - 1)) - 1;
        (min..=max)
            .contains(&stored)
            .then(|| (stored as u64) & ((1u64 << field.width) - 1))
    } else {
        let stored = u64::try_from(stored).ok()?;
        fits_in(stored, field.width).then_some(stored)
    }
}
