//! Row-key hashing used to partition rows before matching

use crate::error::{EqualizerError, Result};
use crate::partition::KeyColumns;
use crate::spec::TableSpec;
use crate::table::ColumnarTable;
use crate::value::Value;
use blake3::Hasher;

/// Initial capacity of the per-value encoding buffer
const BUFFER_INITIAL_SIZE: usize = 1024;

// Type tags prefixed to every encoded key component. Null carries no payload,
// so it can never collide with an encoded string.
const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STR: u8 = 0x04;

/// Reusable accumulator that turns an ordered key tuple into a 64-bit digest.
pub struct RowKeyHasher {
    buffer: Vec<u8>,
    state: Hasher,
    count: usize,
}

impl Default for RowKeyHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl RowKeyHasher {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(BUFFER_INITIAL_SIZE),
            state: Hasher::new(),
            count: 0,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state.reset();
        self.count = 0;
    }

    /// Fold one key component into the running digest.
    pub fn update(&mut self, value: &Value) {
        self.buffer.clear();
        encode(&mut self.buffer, value);
        self.state.update(&self.buffer);
        self.count += 1;
    }

    /// Low 64 bits of the digest accumulated since the last reset.
    pub fn digest(&self) -> Result<u64> {
        if self.count == 0 {
            return Err(EqualizerError::EmptyDigest);
        }
        let hash = self.state.finalize();
        let bytes = hash.as_bytes();
        let mut low = [0u8; 8];
        low.copy_from_slice(&bytes[bytes.len() - 8..]);
        Ok(u64::from_be_bytes(low))
    }

    /// Reset, feed `values` in order and return the digest.
    pub fn hash_key<'a, I>(&mut self, values: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.reset();
        for value in values {
            self.update(value);
        }
        self.digest()
    }
}

fn encode(buffer: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buffer.push(TAG_NULL),
        Value::Bool(b) => {
            buffer.push(TAG_BOOL);
            buffer.push(u8::from(*b));
        }
        Value::Int(i) => {
            buffer.push(TAG_INT);
            buffer.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(x) => {
            buffer.push(TAG_FLOAT);
            // -0.0 == 0.0, so both must land in the same partition
            let x = if *x == 0.0 { 0.0f64 } else { *x };
            buffer.extend_from_slice(&x.to_bits().to_le_bytes());
        }
        Value::Str(s) => {
            buffer.push(TAG_STR);
            buffer.extend_from_slice(&(s.len() as u64).to_le_bytes());
            buffer.extend_from_slice(s.as_bytes());
        }
    }
}

/// Hash the key tuple of one row, reading key columns in `spec.key_columns` order.
pub fn compute_row_key_hash(
    hasher: &mut RowKeyHasher,
    spec: &TableSpec,
    table: &ColumnarTable,
    row: usize,
) -> Result<u64> {
    let keys = KeyColumns::resolve(spec, table)?;
    keys.hash_row(hasher, row)
}
