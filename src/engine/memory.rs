//! In-memory variable table implementing [`DataAccess`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use super::DataAccess;

/// Handle into a [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(usize);

/// Value held by a variable. The variant fixes the variable's type and,
/// for arrays and buffers, its length.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Scalar int
    Int(i32),
    /// Scalar float
    Float(f32),
    /// Scalar double
    Double(f64),
    /// Fixed-length int array
    IntArray(Vec<i32>),
    /// Fixed-length float array
    FloatArray(Vec<f32>),
    /// Fixed-length double array
    DoubleArray(Vec<f64>),
    /// Fixed-length byte buffer
    Bytes(Vec<u8>),
}

#[derive(Debug, Default)]
struct Table {
    index: HashMap<String, VariableId>,
    values: Vec<Value>,
}

/// Thread-safe table of named variables.
///
/// Accessors behave like a simulator's data access layer: a type mismatch
/// reads as zero and ignores writes, and array accesses are clipped to the
/// variable's length.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
    accessor_calls: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MemoryStore::insert`].
    #[must_use]
    pub fn with(self, name: &str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a variable.
    pub fn insert(&self, name: &str, value: Value) -> VariableId {
        let mut table = self.table.write();
        if let Some(&id) = table.index.get(name) {
            table.values[id.0] = value;
            return id;
        }
        let id = VariableId(table.values.len());
        table.values.push(value);
        table.index.insert(name.to_owned(), id);
        id
    }

    /// Current value of a variable.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        let table = self.table.read();
        table
            .index
            .get(name)
            .map(|id| table.values[id.0].clone())
    }

    /// Number of get/set calls made so far, lookups excluded.
    #[must_use]
    pub fn accessor_calls(&self) -> u64 {
        self.accessor_calls.load(Ordering::Relaxed)
    }

    fn read<T>(&self, id: VariableId, f: impl FnOnce(&Value) -> T) -> T {
        self.accessor_calls.fetch_add(1, Ordering::Relaxed);
        f(&self.table.read().values[id.0])
    }

    fn write(&self, id: VariableId, f: impl FnOnce(&mut Value) -> bool) {
        self.accessor_calls.fetch_add(1, Ordering::Relaxed);
        if !f(&mut self.table.write().values[id.0]) {
            debug!(?id, "write ignored: type mismatch");
        }
    }
}

fn copy_out<T: Copy>(source: &[T], offset: usize, out: &mut [T]) -> usize {
    let Some(available) = source.get(offset..) else {
        return 0;
    };
    let n = available.len().min(out.len());
    out[..n].copy_from_slice(&available[..n]);
    n
}

fn copy_in<T: Copy>(target: &mut [T], offset: usize, values: &[T]) {
    if let Some(available) = target.get_mut(offset..) {
        let n = available.len().min(values.len());
        available[..n].copy_from_slice(&values[..n]);
    }
}

impl DataAccess for MemoryStore {
    type Handle = VariableId;

    fn find(&self, name: &str) -> Option<VariableId> {
        self.table.read().index.get(name).copied()
    }

    fn get_int(&self, handle: VariableId) -> i32 {
        self.read(handle, |value| match value {
            Value::Int(v) => *v,
            _ => 0,
        })
    }

    fn set_int(&self, handle: VariableId, new: i32) {
        self.write(handle, |value| match value {
            Value::Int(v) => {
                *v = new;
                true
            }
            _ => false,
        });
    }

    fn get_float(&self, handle: VariableId) -> f32 {
        self.read(handle, |value| match value {
            Value::Float(v) => *v,
            _ => 0.0,
        })
    }

    fn set_float(&self, handle: VariableId, new: f32) {
        self.write(handle, |value| match value {
            Value::Float(v) => {
                *v = new;
                true
            }
            _ => false,
        });
    }

    fn get_double(&self, handle: VariableId) -> f64 {
        self.read(handle, |value| match value {
            Value::Double(v) => *v,
            _ => 0.0,
        })
    }

    fn set_double(&self, handle: VariableId, new: f64) {
        self.write(handle, |value| match value {
            Value::Double(v) => {
                *v = new;
                true
            }
            _ => false,
        });
    }

    fn get_ints(&self, handle: VariableId, offset: usize, out: &mut [i32]) -> usize {
        self.read(handle, |value| match value {
            Value::IntArray(v) => copy_out(v, offset, out),
            _ => 0,
        })
    }

    fn set_ints(&self, handle: VariableId, offset: usize, values: &[i32]) {
        self.write(handle, |value| match value {
            Value::IntArray(v) => {
                copy_in(v, offset, values);
                true
            }
            _ => false,
        });
    }

    fn get_floats(&self, handle: VariableId, offset: usize, out: &mut [f32]) -> usize {
        self.read(handle, |value| match value {
            Value::FloatArray(v) => copy_out(v, offset, out),
            _ => 0,
        })
    }

    fn set_floats(&self, handle: VariableId, offset: usize, values: &[f32]) {
        self.write(handle, |value| match value {
            Value::FloatArray(v) => {
                copy_in(v, offset, values);
                true
            }
            _ => false,
        });
    }

    fn get_doubles(&self, handle: VariableId, offset: usize, out: &mut [f64]) -> usize {
        self.read(handle, |value| match value {
            Value::DoubleArray(v) => copy_out(v, offset, out),
            _ => 0,
        })
    }

    fn set_doubles(&self, handle: VariableId, offset: usize, values: &[f64]) {
        self.write(handle, |value| match value {
            Value::DoubleArray(v) => {
                copy_in(v, offset, values);
                true
            }
            _ => false,
        });
    }

    fn get_bytes(&self, handle: VariableId, offset: usize, out: &mut [u8]) -> usize {
        self.read(handle, |value| match value {
            Value::Bytes(v) => copy_out(v, offset, out),
            _ => 0,
        })
    }

    fn set_bytes(&self, handle: VariableId, offset: usize, values: &[u8]) {
        self.write(handle, |value| match value {
            Value::Bytes(v) => {
                copy_in(v, offset, values);
                true
            }
            _ => false,
        });
    }
}
