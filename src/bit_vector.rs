//! Fixed-size bitset used as the live-documents overlay of a segment.
//!
//! A set bit means the document at that ordinal is live; deleting a document
//! clears its bit. The population count is computed with a byte lookup table
//! and cached until the next mutation.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, IoContext, Result};

const UNKNOWN_COUNT: usize = usize::MAX;

static BYTE_COUNTS: [u8; 256] = [
    0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4, 1, 2, 2, 3, 2, 3, 3, 4, 2, 3, 3, 4, 3, 4, 4, 5,
    1, 2, 2, 3, 2, 3, 3, 4, 2, 3, 3, 4, 3, 4, 4, 5, 2, 3, 3, 4, 3, 4, 4, 5, 3, 4, 4, 5, 4, 5, 5, 6,
    1, 2, 2, 3, 2, 3, 3, 4, 2, 3, 3, 4, 3, 4, 4, 5, 2, 3, 3, 4, 3, 4, 4, 5, 3, 4, 4, 5, 4, 5, 5, 6,
    2, 3, 3, 4, 3, 4, 4, 5, 3, 4, 4, 5, 4, 5, 5, 6, 3, 4, 4, 5, 4, 5, 5, 6, 4, 5, 5, 6, 5, 6, 6, 7,
    1, 2, 2, 3, 2, 3, 3, 4, 2, 3, 3, 4, 3, 4, 4, 5, 2, 3, 3, 4, 3, 4, 4, 5, 3, 4, 4, 5, 4, 5, 5, 6,
    2, 3, 3, 4, 3, 4, 4, 5, 3, 4, 4, 5, 4, 5, 5, 6, 3, 4, 4, 5, 4, 5, 5, 6, 4, 5, 5, 6, 5, 6, 6, 7,
    2, 3, 3, 4, 3, 4, 4, 5, 3, 4, 4, 5, 4, 5, 5, 6, 3, 4, 4, 5, 4, 5, 5, 6, 4, 5, 5, 6, 5, 6, 6, 7,
    3, 4, 4, 5, 4, 5, 5, 6, 4, 5, 5, 6, 5, 6, 6, 7, 4, 5, 5, 6, 5, 6, 6, 7, 5, 6, 6, 7, 6, 7, 7, 8,
];

#[derive(Debug)]
pub struct BitVector {
    bits: Vec<u8>,
    size: usize,
    count: AtomicUsize,
}

impl Clone for BitVector {
    fn clone(&self) -> BitVector {
        BitVector {
            bits: self.bits.clone(),
            size: self.size,
            count: AtomicUsize::new(self.count.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for BitVector {
    fn eq(&self, other: &BitVector) -> bool {
        self.size == other.size && self.bits == other.bits
    }
}

impl BitVector {
    /// A vector of `n` clear bits.
    pub fn new(n: usize) -> BitVector {
        BitVector {
            bits: vec![0; (n >> 3) + 1],
            size: n,
            count: AtomicUsize::new(0),
        }
    }

    /// A vector of `n` set bits, the state of a segment without deletions.
    pub fn full(n: usize) -> BitVector {
        let mut bits = vec![0xFFu8; (n >> 3) + 1];
        // Trailing bits past `size` stay clear so the count is exact.
        let last = n >> 3;
        bits[last] = ((1u16 << (n & 7)) - 1) as u8;
        BitVector {
            bits,
            size: n,
            count: AtomicUsize::new(n),
        }
    }

    #[inline]
    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.size);
        self.bits[bit >> 3] |= 1 << (bit & 7);
        self.count.store(UNKNOWN_COUNT, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear(&mut self, bit: usize) {
        debug_assert!(bit < self.size);
        self.bits[bit >> 3] &= !(1 << (bit & 7));
        self.count.store(UNKNOWN_COUNT, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self, bit: usize) -> bool {
        debug_assert!(bit < self.size);
        (self.bits[bit >> 3] & (1 << (bit & 7))) != 0
    }

    pub fn try_get(&self, bit: usize) -> Result<bool> {
        self.check(bit)?;
        Ok(self.get(bit))
    }

    pub fn try_set(&mut self, bit: usize) -> Result<()> {
        self.check(bit)?;
        self.set(bit);
        Ok(())
    }

    pub fn try_clear(&mut self, bit: usize) -> Result<()> {
        self.check(bit)?;
        self.clear(bit);
        Ok(())
    }

    fn check(&self, bit: usize) -> Result<()> {
        if bit < self.size {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "bit {} out of range for vector of size {}",
                bit, self.size
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        let cached = self.count.load(Ordering::Relaxed);
        if cached != UNKNOWN_COUNT {
            return cached;
        }
        let c = self.count_bits();
        self.count.store(c, Ordering::Relaxed);
        c
    }

    fn count_bits(&self) -> usize {
        self.bits
            .iter()
            .map(|b| BYTE_COUNTS[*b as usize] as usize)
            .sum()
    }

    pub fn write_to(&self, write: &mut dyn Write) -> std::io::Result<()> {
        write.write_u32::<BigEndian>(self.size as u32)?;
        write.write_u32::<BigEndian>(self.count() as u32)?;
        write.write_all(&self.bits)
    }

    /// Reads a vector written by `write_to`. The stored count is checked
    /// against the bits; a mismatch is reported as `Err(reason)`.
    pub fn read_from(read: &mut dyn Read) -> std::result::Result<BitVector, String> {
        let size = read.read_u32::<BigEndian>().map_err(|e| e.to_string())? as usize;
        let count = read.read_u32::<BigEndian>().map_err(|e| e.to_string())? as usize;
        let mut bits = vec![0u8; (size >> 3) + 1];
        read.read_exact(&mut bits)
            .map_err(|e| format!("truncated bits: {}", e))?;
        let mut trailing = [0u8; 1];
        match read.read(&mut trailing) {
            Ok(0) => (),
            Ok(_) => return Err("trailing bytes after bit vector".to_string()),
            Err(e) => return Err(e.to_string()),
        }
        let vector = BitVector {
            bits,
            size,
            count: AtomicUsize::new(UNKNOWN_COUNT),
        };
        let actual = vector.count_bits();
        if actual != count {
            return Err(format!(
                "stored count {} does not match {} set bits",
                count, actual
            ));
        }
        vector.count.store(actual, Ordering::Relaxed);
        Ok(vector)
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).at("create", path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer).at("write", path)?;
        writer.flush().at("flush", path)?;
        writer
            .get_ref()
            .sync_all()
            .at("sync", path)
    }

    pub fn read_file(path: &Path) -> Result<BitVector> {
        let file = File::open(path).at("open", path)?;
        BitVector::read_from(&mut BufReader::new(file)).map_err(|reason| Error::corrupt(path, reason))
    }

    /// Ordinals of the clear bits, i.e. deleted documents.
    pub fn iter_clear(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(move |i| !self.get(*i))
    }
}
