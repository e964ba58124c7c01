//! Type-driven dispatch of a validated query onto the engine accessors.
//!
//! The scalar-only form of the protocol (no arrays, no byte buffers) is a
//! subset of this one: a record with a count of 0 or 1 and `treat_as_array`
//! clear takes the scalar path for every numeric kind.

use crate::engine::DataAccess;
use crate::protocol::{DataKind, Query, QueryRecord};

/// Accessor shape selected for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One value in slot element 0
    Scalar,
    /// `count` elements from offset 0 of the variable's array
    Vector,
    /// `count` raw bytes from offset 0
    Buffer,
}

impl Shape {
    /// Select the shape for a kind, count and array flag
    #[must_use]
    pub const fn select(kind: DataKind, count: usize, treat_as_array: bool) -> Self {
        match kind {
            DataKind::Byte => Self::Buffer,
            DataKind::Int | DataKind::Float | DataKind::Double => {
                if count > 1 || treat_as_array {
                    Self::Vector
                } else {
                    Self::Scalar
                }
            }
        }
    }

    /// Shape of a validated query
    #[must_use]
    pub const fn of(query: &Query<'_>) -> Self {
        Self::select(query.kind, query.count, query.treat_as_array)
    }
}

/// Fetch the variable into the payload slot of `out`.
///
/// The requested range is zeroed first, so elements the engine does not
/// supply read back as zero. `query.count` must already be validated.
pub fn read<D: DataAccess>(engine: &D, handle: D::Handle, query: &Query<'_>, out: &mut QueryRecord) {
    let count = query.count;
    match (query.kind, Shape::of(query)) {
        (DataKind::Int, Shape::Scalar) => out.int_values_mut()[0] = engine.get_int(handle),
        (DataKind::Float, Shape::Scalar) => out.float_values_mut()[0] = engine.get_float(handle),
        (DataKind::Double, Shape::Scalar) => {
            out.double_values_mut()[0] = engine.get_double(handle);
        }
        (DataKind::Int, _) => {
            let slot = &mut out.int_values_mut()[..count];
            slot.fill(0);
            engine.get_ints(handle, 0, slot);
        }
        (DataKind::Float, _) => {
            let slot = &mut out.float_values_mut()[..count];
            slot.fill(0.0);
            engine.get_floats(handle, 0, slot);
        }
        (DataKind::Double, _) => {
            let slot = &mut out.double_values_mut()[..count];
            slot.fill(0.0);
            engine.get_doubles(handle, 0, slot);
        }
        (DataKind::Byte, _) => {
            let slot = &mut out.byte_values_mut()[..count];
            slot.fill(0);
            engine.get_bytes(handle, 0, slot);
        }
    }
}

/// Push the payload slot of `record` into the variable.
///
/// `query.count` must already be validated.
pub fn write<D: DataAccess>(engine: &D, handle: D::Handle, query: &Query<'_>, record: &QueryRecord) {
    let count = query.count;
    match (query.kind, Shape::of(query)) {
        (DataKind::Int, Shape::Scalar) => engine.set_int(handle, record.int_values()[0]),
        (DataKind::Float, Shape::Scalar) => engine.set_float(handle, record.float_values()[0]),
        (DataKind::Double, Shape::Scalar) => engine.set_double(handle, record.double_values()[0]),
        (DataKind::Int, _) => engine.set_ints(handle, 0, &record.int_values()[..count]),
        (DataKind::Float, _) => engine.set_floats(handle, 0, &record.float_values()[..count]),
        (DataKind::Double, _) => engine.set_doubles(handle, 0, &record.double_values()[..count]),
        (DataKind::Byte, _) => engine.set_bytes(handle, 0, &record.byte_values()[..count]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryStore, Value};
    use crate::protocol::Operation;

    #[test]
    fn test_shape_selection() {
        assert_eq!(Shape::select(DataKind::Int, 0, false), Shape::Scalar);
        assert_eq!(Shape::select(DataKind::Int, 1, false), Shape::Scalar);
        assert_eq!(Shape::select(DataKind::Float, 1, true), Shape::Vector);
        assert_eq!(Shape::select(DataKind::Float, 2, false), Shape::Vector);
        assert_eq!(Shape::select(DataKind::Double, 8, false), Shape::Vector);
        assert_eq!(Shape::select(DataKind::Byte, 0, false), Shape::Buffer);
        assert_eq!(Shape::select(DataKind::Byte, 1, false), Shape::Buffer);
    }

    #[test]
    fn test_scalar_read() {
        let store = MemoryStore::new().with("sim/alt", Value::Double(1234.5));
        let handle = store.find("sim/alt").unwrap();
        let request = QueryRecord::read("sim/alt", DataKind::Double, 1).unwrap();
        let query = request.query().unwrap();

        let mut out = request;
        read(&store, handle, &query, &mut out);
        assert_eq!(out.double_values()[0], 1234.5);
    }

    #[test]
    fn test_vector_read_zero_fills_short_variables() {
        let store = MemoryStore::new().with("sim/arr", Value::FloatArray(vec![1.0, 2.0]));
        let handle = store.find("sim/arr").unwrap();
        let mut request = QueryRecord::read("sim/arr", DataKind::Float, 4).unwrap();
        request.float_values_mut()[..4].copy_from_slice(&[9.0; 4]);
        let query = request.query().unwrap();

        let mut out = request;
        read(&store, handle, &query, &mut out);
        assert_eq!(&out.float_values()[..4], &[1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_double_vector_write() {
        let store = MemoryStore::new().with("sim/d", Value::DoubleArray(vec![0.0; 3]));
        let handle = store.find("sim/d").unwrap();
        let record = QueryRecord::write_doubles("sim/d", &[1.0, 2.0]).unwrap();
        let query = record.query().unwrap();
        assert_eq!(query.operation, Operation::Write);

        write(&store, handle, &query, &record);
        assert_eq!(
            store.value("sim/d"),
            Some(Value::DoubleArray(vec![1.0, 2.0, 0.0]))
        );
    }

    #[test]
    fn test_single_element_array_write() {
        let store = MemoryStore::new().with("sim/i", Value::IntArray(vec![0; 2]));
        let handle = store.find("sim/i").unwrap();
        let record = QueryRecord::write_ints("sim/i", &[42]).unwrap();
        let query = record.query().unwrap();
        assert_eq!(Shape::of(&query), Shape::Vector);

        write(&store, handle, &query, &record);
        assert_eq!(store.value("sim/i"), Some(Value::IntArray(vec![42, 0])));
    }

    #[test]
    fn test_buffer_roundtrip() {
        let store = MemoryStore::new().with("sim/tail", Value::Bytes(vec![0; 8]));
        let handle = store.find("sim/tail").unwrap();
        let record = QueryRecord::write_bytes("sim/tail", b"N172SP").unwrap();
        write(&store, handle, &record.query().unwrap(), &record);

        let request = QueryRecord::read("sim/tail", DataKind::Byte, 6).unwrap();
        let mut out = request;
        read(&store, handle, &request.query().unwrap(), &mut out);
        assert_eq!(&out.byte_values()[..6], b"N172SP");
    }
}
