//! Variable access capability consumed from the simulation engine
//!
//! The bridge never looks inside the engine: it resolves a name to an
//! opaque handle once per request and then calls the typed accessors below.

mod memory;

use std::fmt;

pub use memory::{MemoryStore, Value, VariableId};

/// Typed get/set access to the engine's named variables.
///
/// Vector and buffer accessors address the variable's backing array from
/// `offset`; getters return how many elements were copied into `out`.
pub trait DataAccess: Send + Sync {
    /// Resolved variable handle
    type Handle: Copy + fmt::Debug;

    /// Resolve a variable by name.
    fn find(&self, name: &str) -> Option<Self::Handle>;

    /// Read a scalar int.
    fn get_int(&self, handle: Self::Handle) -> i32;
    /// Write a scalar int.
    fn set_int(&self, handle: Self::Handle, value: i32);

    /// Read a scalar float.
    fn get_float(&self, handle: Self::Handle) -> f32;
    /// Write a scalar float.
    fn set_float(&self, handle: Self::Handle, value: f32);

    /// Read a scalar double.
    fn get_double(&self, handle: Self::Handle) -> f64;
    /// Write a scalar double.
    fn set_double(&self, handle: Self::Handle, value: f64);

    /// Read int elements starting at `offset`.
    fn get_ints(&self, handle: Self::Handle, offset: usize, out: &mut [i32]) -> usize;
    /// Write int elements starting at `offset`.
    fn set_ints(&self, handle: Self::Handle, offset: usize, values: &[i32]);

    /// Read float elements starting at `offset`.
    fn get_floats(&self, handle: Self::Handle, offset: usize, out: &mut [f32]) -> usize;
    /// Write float elements starting at `offset`.
    fn set_floats(&self, handle: Self::Handle, offset: usize, values: &[f32]);

    /// Read double elements starting at `offset`.
    fn get_doubles(&self, handle: Self::Handle, offset: usize, out: &mut [f64]) -> usize;
    /// Write double elements starting at `offset`.
    fn set_doubles(&self, handle: Self::Handle, offset: usize, values: &[f64]);

    /// Read bytes starting at `offset`.
    fn get_bytes(&self, handle: Self::Handle, offset: usize, out: &mut [u8]) -> usize;
    /// Write bytes starting at `offset`.
    fn set_bytes(&self, handle: Self::Handle, offset: usize, values: &[u8]);
}
