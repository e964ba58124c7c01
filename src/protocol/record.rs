//! Query record: the fixed layout exchanged through both mailboxes
//!
//! The record is 4736 bytes, packed and little-endian.

use bytes::{Buf, BufMut};

use super::{
    DataKind, Error, MAX_BYTE_VALUES, MAX_NAME_LEN, MAX_NUMERIC_VALUES, NAME_CAPACITY, Operation,
    RECORD_SIZE, Result, Status,
};

const RESERVED_TAIL: usize = 6;

/// One variable query, as stored in a mailbox region
///
/// # Wire Format
///
/// ```text
/// offset  size  field
///      0   128  name (NUL terminated)
///    128     1  data kind
///    129     1  operation
///    130     1  value count, low byte
///    131     1  treat as array (0 / 1)
///    132   500  byte values
///    632  1024  int values    (256 x i32)
///   1656  1024  float values  (256 x f32)
///   2680  2048  double values (256 x f64)
///   4728     1  status
///   4729     1  value count, high byte
///   4730     6  reserved (zero)
/// ```
///
/// Kind and operation are kept as raw bytes so a listener can answer a record
/// it does not understand instead of dropping it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryRecord {
    name: [u8; NAME_CAPACITY],
    kind: u8,
    operation: u8,
    count_low: u8,
    treat_as_array: u8,
    byte_values: [u8; MAX_BYTE_VALUES],
    int_values: [i32; MAX_NUMERIC_VALUES],
    float_values: [f32; MAX_NUMERIC_VALUES],
    double_values: [f64; MAX_NUMERIC_VALUES],
    status: u8,
    count_high: u8,
}

/// Validated view of a record's addressing fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query<'a> {
    /// Variable name
    pub name: &'a str,
    /// Value type
    pub kind: DataKind,
    /// Requested operation
    pub operation: Operation,
    /// Element count, already checked against the kind's capacity
    pub count: usize,
    /// Force vector semantics for a single element
    pub treat_as_array: bool,
}

impl QueryRecord {
    /// Create an empty record addressed at `name`
    pub fn new(name: &str, kind: DataKind, operation: Operation) -> Result<Self> {
        let mut record = Self::default();
        record.set_name(name)?;
        record.kind = kind.as_u8();
        record.operation = operation.as_u8();
        Ok(record)
    }

    /// Build a read request for `count` elements (0 or 1 reads a scalar)
    pub fn read(name: &str, kind: DataKind, count: usize) -> Result<Self> {
        let mut record = Self::new(name, kind, Operation::Read)?;
        record.set_value_count(kind, count)?;
        Ok(record)
    }

    /// Build a read request that always uses vector semantics
    pub fn read_array(name: &str, kind: DataKind, count: usize) -> Result<Self> {
        let mut record = Self::read(name, kind, count)?;
        record.set_treat_as_array(true);
        Ok(record)
    }

    /// Build a scalar int write
    pub fn write_int(name: &str, value: i32) -> Result<Self> {
        let mut record = Self::new(name, DataKind::Int, Operation::Write)?;
        record.set_value_count(DataKind::Int, 1)?;
        record.int_values[0] = value;
        Ok(record)
    }

    /// Build a scalar float write
    pub fn write_float(name: &str, value: f32) -> Result<Self> {
        let mut record = Self::new(name, DataKind::Float, Operation::Write)?;
        record.set_value_count(DataKind::Float, 1)?;
        record.float_values[0] = value;
        Ok(record)
    }

    /// Build a scalar double write
    pub fn write_double(name: &str, value: f64) -> Result<Self> {
        let mut record = Self::new(name, DataKind::Double, Operation::Write)?;
        record.set_value_count(DataKind::Double, 1)?;
        record.double_values[0] = value;
        Ok(record)
    }

    /// Build an int array write starting at element 0
    pub fn write_ints(name: &str, values: &[i32]) -> Result<Self> {
        let mut record = Self::new(name, DataKind::Int, Operation::Write)?;
        record.set_value_count(DataKind::Int, values.len())?;
        record.set_treat_as_array(true);
        record.int_values[..values.len()].copy_from_slice(values);
        Ok(record)
    }

    /// Build a float array write starting at element 0
    pub fn write_floats(name: &str, values: &[f32]) -> Result<Self> {
        let mut record = Self::new(name, DataKind::Float, Operation::Write)?;
        record.set_value_count(DataKind::Float, values.len())?;
        record.set_treat_as_array(true);
        record.float_values[..values.len()].copy_from_slice(values);
        Ok(record)
    }

    /// Build a double array write starting at element 0
    pub fn write_doubles(name: &str, values: &[f64]) -> Result<Self> {
        let mut record = Self::new(name, DataKind::Double, Operation::Write)?;
        record.set_value_count(DataKind::Double, values.len())?;
        record.set_treat_as_array(true);
        record.double_values[..values.len()].copy_from_slice(values);
        Ok(record)
    }

    /// Build a byte buffer write starting at byte 0
    pub fn write_bytes(name: &str, values: &[u8]) -> Result<Self> {
        let mut record = Self::new(name, DataKind::Byte, Operation::Write)?;
        record.set_value_count(DataKind::Byte, values.len())?;
        record.byte_values[..values.len()].copy_from_slice(values);
        Ok(record)
    }

    /// Variable name up to the first NUL
    pub fn name(&self) -> Result<&str> {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::InvalidName {
                reason: "missing NUL terminator",
            })?;
        if len == 0 {
            return Err(Error::InvalidName { reason: "empty" });
        }
        std::str::from_utf8(&self.name[..len]).map_err(|_| Error::InvalidName {
            reason: "not UTF-8",
        })
    }

    /// Replace the variable name, zero-filling the rest of the field
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        if bytes.is_empty() {
            return Err(Error::InvalidName { reason: "empty" });
        }
        if bytes.len() > MAX_NAME_LEN {
            return Err(Error::InvalidName {
                reason: "longer than 127 bytes",
            });
        }
        if bytes.contains(&0) {
            return Err(Error::InvalidName {
                reason: "contains NUL",
            });
        }
        self.name = [0; NAME_CAPACITY];
        self.name[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Get data kind byte
    #[must_use]
    pub const fn kind_byte(&self) -> u8 {
        self.kind
    }

    /// Get data kind
    #[must_use]
    pub const fn data_kind(&self) -> Option<DataKind> {
        DataKind::from_u8(self.kind)
    }

    /// Set data kind
    pub fn set_data_kind(&mut self, kind: DataKind) {
        self.kind = kind.as_u8();
    }

    /// Get operation byte
    #[must_use]
    pub const fn operation_byte(&self) -> u8 {
        self.operation
    }

    /// Get operation
    #[must_use]
    pub const fn operation(&self) -> Option<Operation> {
        Operation::from_u8(self.operation)
    }

    /// Set operation
    pub fn set_operation(&mut self, operation: Operation) {
        self.operation = operation.as_u8();
    }

    /// Element count, combining the legacy low byte with the high byte
    #[must_use]
    pub const fn value_count(&self) -> usize {
        (self.count_low as usize) | ((self.count_high as usize) << 8)
    }

    /// Set the element count after checking it against `kind`'s slot
    pub fn set_value_count(&mut self, kind: DataKind, count: usize) -> Result<()> {
        let capacity = kind.capacity();
        if count > capacity {
            return Err(Error::CountExceedsCapacity {
                kind,
                count,
                capacity,
            });
        }
        self.set_raw_value_count(count as u16);
        Ok(())
    }

    /// Set the element count without validation
    pub fn set_raw_value_count(&mut self, count: u16) {
        let [low, high] = count.to_le_bytes();
        self.count_low = low;
        self.count_high = high;
    }

    /// Check if vector semantics are forced
    #[must_use]
    pub const fn treat_as_array(&self) -> bool {
        self.treat_as_array != 0
    }

    /// Force or clear vector semantics
    pub fn set_treat_as_array(&mut self, treat_as_array: bool) {
        self.treat_as_array = u8::from(treat_as_array);
    }

    /// Get status byte
    #[must_use]
    pub const fn status_byte(&self) -> u8 {
        self.status
    }

    /// Get status
    #[must_use]
    pub const fn status(&self) -> Option<Status> {
        Status::from_u8(self.status)
    }

    /// Set status
    pub fn set_status(&mut self, status: Status) {
        self.status = status.as_u8();
    }

    /// Byte payload slot
    #[must_use]
    pub const fn byte_values(&self) -> &[u8; MAX_BYTE_VALUES] {
        &self.byte_values
    }

    /// Mutable byte payload slot
    pub fn byte_values_mut(&mut self) -> &mut [u8; MAX_BYTE_VALUES] {
        &mut self.byte_values
    }

    /// Int payload slot
    #[must_use]
    pub const fn int_values(&self) -> &[i32; MAX_NUMERIC_VALUES] {
        &self.int_values
    }

    /// Mutable int payload slot
    pub fn int_values_mut(&mut self) -> &mut [i32; MAX_NUMERIC_VALUES] {
        &mut self.int_values
    }

    /// Float payload slot
    #[must_use]
    pub const fn float_values(&self) -> &[f32; MAX_NUMERIC_VALUES] {
        &self.float_values
    }

    /// Mutable float payload slot
    pub fn float_values_mut(&mut self) -> &mut [f32; MAX_NUMERIC_VALUES] {
        &mut self.float_values
    }

    /// Double payload slot
    #[must_use]
    pub const fn double_values(&self) -> &[f64; MAX_NUMERIC_VALUES] {
        &self.double_values
    }

    /// Mutable double payload slot
    pub fn double_values_mut(&mut self) -> &mut [f64; MAX_NUMERIC_VALUES] {
        &mut self.double_values
    }

    /// Validate the addressing fields and return a typed view
    ///
    /// Checks run in wire order of importance: operation, name, kind, count.
    pub fn query(&self) -> Result<Query<'_>> {
        let operation = self.operation().ok_or(Error::UnknownOperation {
            op_byte: self.operation,
        })?;
        let name = self.name()?;
        let kind = self.data_kind().ok_or(Error::InvalidDataKind {
            kind_byte: self.kind,
        })?;

        let count = self.value_count();
        let capacity = kind.capacity();
        if count > capacity {
            return Err(Error::CountExceedsCapacity {
                kind,
                count,
                capacity,
            });
        }

        Ok(Query {
            name,
            kind,
            operation,
            count,
            treat_as_array: self.treat_as_array(),
        })
    }

    /// Copy of this record marked as a response with the given status
    #[must_use]
    pub fn to_response(&self, status: Status) -> Self {
        let mut response = *self;
        response.operation = Operation::Response.as_u8();
        response.status = status.as_u8();
        response
    }

    /// Whether this record is the listener's reply to `request`.
    ///
    /// A reply is a copy of its request with the operation rewritten, so the
    /// addressing fields must match byte for byte.
    #[must_use]
    pub fn answers(&self, request: &Self) -> bool {
        self.operation == Operation::Response.as_u8()
            && self.name == request.name
            && self.kind == request.kind
            && self.count_low == request.count_low
            && self.count_high == request.count_high
            && self.treat_as_array == request.treat_as_array
    }

    /// Convert to bytes (little-endian)
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        let mut buf = &mut bytes[..];

        buf.put_slice(&self.name);
        buf.put_u8(self.kind);
        buf.put_u8(self.operation);
        buf.put_u8(self.count_low);
        buf.put_u8(self.treat_as_array);
        buf.put_slice(&self.byte_values);
        for value in &self.int_values {
            buf.put_i32_le(*value);
        }
        for value in &self.float_values {
            buf.put_f32_le(*value);
        }
        for value in &self.double_values {
            buf.put_f64_le(*value);
        }
        buf.put_u8(self.status);
        buf.put_u8(self.count_high);
        buf.put_bytes(0, RESERVED_TAIL);

        bytes
    }

    /// Parse from bytes (little-endian)
    ///
    /// Only the length is checked here; call [`QueryRecord::query`] to
    /// validate the contents.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_SIZE {
            return Err(Error::BufferTooSmall {
                needed: RECORD_SIZE,
                got: bytes.len(),
            });
        }

        let mut buf = &bytes[..RECORD_SIZE];
        let mut record = Self::default();

        buf.copy_to_slice(&mut record.name);
        record.kind = buf.get_u8();
        record.operation = buf.get_u8();
        record.count_low = buf.get_u8();
        record.treat_as_array = buf.get_u8();
        buf.copy_to_slice(&mut record.byte_values);
        for value in &mut record.int_values {
            *value = buf.get_i32_le();
        }
        for value in &mut record.float_values {
            *value = buf.get_f32_le();
        }
        for value in &mut record.double_values {
            *value = buf.get_f64_le();
        }
        record.status = buf.get_u8();
        record.count_high = buf.get_u8();

        Ok(record)
    }
}

impl Default for QueryRecord {
    fn default() -> Self {
        Self {
            name: [0; NAME_CAPACITY],
            kind: 0,
            operation: 0,
            count_low: 0,
            treat_as_array: 0,
            byte_values: [0; MAX_BYTE_VALUES],
            int_values: [0; MAX_NUMERIC_VALUES],
            float_values: [0.0; MAX_NUMERIC_VALUES],
            double_values: [0.0; MAX_NUMERIC_VALUES],
            status: 0,
            count_high: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size() {
        let bytes = QueryRecord::default().to_bytes();
        assert_eq!(bytes.len(), 4736);
    }

    #[test]
    fn test_field_offsets() {
        let mut record = QueryRecord::write_ints("sim/a", &[0x0102_0304, 7]).unwrap();
        record.byte_values_mut()[0] = 0xAB;
        record.float_values_mut()[0] = 1.5;
        record.double_values_mut()[0] = -2.0;
        record.set_status(Status::VariableNotFound);

        let bytes = record.to_bytes();
        assert_eq!(&bytes[0..5], b"sim/a");
        assert_eq!(bytes[5], 0);
        assert_eq!(bytes[128], DataKind::Int.as_u8());
        assert_eq!(bytes[129], Operation::Write.as_u8());
        assert_eq!(bytes[130], 2);
        assert_eq!(bytes[131], 1);
        assert_eq!(bytes[132], 0xAB);
        assert_eq!(&bytes[632..636], &0x0102_0304_i32.to_le_bytes());
        assert_eq!(&bytes[636..640], &7_i32.to_le_bytes());
        assert_eq!(&bytes[1656..1660], &1.5_f32.to_le_bytes());
        assert_eq!(&bytes[2680..2688], &(-2.0_f64).to_le_bytes());
        assert_eq!(bytes[4728], Status::VariableNotFound.as_u8());
        assert_eq!(bytes[4729], 0);
        assert!(bytes[4730..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_roundtrip() {
        let record = QueryRecord::write_bytes("sim/aircraft/view/acf_tailnum", &[7; 300]).unwrap();
        let decoded = QueryRecord::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.value_count(), 300);
        assert_eq!(decoded.to_bytes()[4729], 1);
    }

    #[test]
    fn test_from_bytes_too_small() {
        let result = QueryRecord::from_bytes(&[0u8; 100]);
        assert!(matches!(
            result,
            Err(Error::BufferTooSmall {
                needed: RECORD_SIZE,
                got: 100
            })
        ));
    }

    #[test]
    fn test_name_limits() {
        let longest = "x".repeat(MAX_NAME_LEN);
        let record = QueryRecord::read(&longest, DataKind::Int, 1).unwrap();
        assert_eq!(record.name().unwrap(), longest);

        let too_long = "x".repeat(NAME_CAPACITY);
        assert!(matches!(
            QueryRecord::read(&too_long, DataKind::Int, 1),
            Err(Error::InvalidName { .. })
        ));
        assert!(matches!(
            QueryRecord::read("", DataKind::Int, 1),
            Err(Error::InvalidName { .. })
        ));
        assert!(QueryRecord::default().name().is_err());
    }

    #[test]
    fn test_unterminated_name_rejected() {
        let mut bytes = QueryRecord::default().to_bytes();
        bytes[..NAME_CAPACITY].fill(b'a');
        let record = QueryRecord::from_bytes(&bytes).unwrap();
        assert!(matches!(
            record.name(),
            Err(Error::InvalidName {
                reason: "missing NUL terminator"
            })
        ));
    }

    #[test]
    fn test_builder_rejects_oversized_payload() {
        let result = QueryRecord::write_floats("sim/f", &[0.0; 257]);
        assert!(matches!(
            result,
            Err(Error::CountExceedsCapacity {
                count: 257,
                capacity: 256,
                ..
            })
        ));
        assert!(QueryRecord::write_bytes("sim/b", &[0; 500]).is_ok());
        assert!(QueryRecord::write_bytes("sim/b", &[0; 501]).is_err());
    }

    #[test]
    fn test_query_validation_order() {
        let mut bytes = QueryRecord::read("sim/x", DataKind::Int, 1)
            .unwrap()
            .to_bytes();
        bytes[128] = 0x09;
        bytes[129] = 0x09;
        let record = QueryRecord::from_bytes(&bytes).unwrap();
        assert!(matches!(
            record.query(),
            Err(Error::UnknownOperation { op_byte: 0x09 })
        ));

        bytes[129] = Operation::Read.as_u8();
        let record = QueryRecord::from_bytes(&bytes).unwrap();
        assert!(matches!(
            record.query(),
            Err(Error::InvalidDataKind { kind_byte: 0x09 })
        ));
    }

    #[test]
    fn test_query_rejects_oversized_count() {
        let mut record = QueryRecord::new("sim/x", DataKind::Float, Operation::Read).unwrap();
        record.set_raw_value_count(257);
        assert!(matches!(
            record.query(),
            Err(Error::CountExceedsCapacity { count: 257, .. })
        ));

        record.set_data_kind(DataKind::Byte);
        let query = record.query().unwrap();
        assert_eq!(query.count, 257);
        assert_eq!(query.kind, DataKind::Byte);
    }

    #[test]
    fn test_answers_matches_own_request_only() {
        let request = QueryRecord::read("sim/alt", DataKind::Float, 1).unwrap();
        let other = QueryRecord::read("sim/alt2", DataKind::Float, 1).unwrap();

        assert!(request.to_response(Status::Ok).answers(&request));
        assert!(request.to_response(Status::VariableNotFound).answers(&request));
        assert!(!request.answers(&request));
        assert!(!other.to_response(Status::Ok).answers(&request));

        let wider = QueryRecord::read_array("sim/alt", DataKind::Float, 1).unwrap();
        assert!(!wider.to_response(Status::Ok).answers(&request));
    }

    #[test]
    fn test_to_response() {
        let record = QueryRecord::read("sim/x", DataKind::Double, 1).unwrap();
        let response = record.to_response(Status::Ok);
        assert_eq!(response.operation(), Some(Operation::Response));
        assert_eq!(response.status(), Some(Status::Ok));
        assert_eq!(response.name().unwrap(), "sim/x");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: decoding never panics and always re-encodes to the same bytes
            #[test]
            fn prop_decode_reencode_is_identity(
                bytes in prop::collection::vec(any::<u8>(), RECORD_SIZE..=RECORD_SIZE),
            ) {
                let mut bytes = bytes;
                bytes[4730..].fill(0);
                let record = QueryRecord::from_bytes(&bytes).unwrap();
                prop_assert_eq!(&record.to_bytes()[..], &bytes[..]);
            }

            /// Property: any name of 1..=127 printable bytes is accepted and recovered
            #[test]
            fn prop_name_roundtrip(name in "[a-z/_0-9]{1,127}") {
                let record = QueryRecord::read(&name, DataKind::Int, 1).unwrap();
                let decoded = QueryRecord::from_bytes(&record.to_bytes()).unwrap();
                prop_assert_eq!(decoded.name().unwrap(), name.as_str());
            }
        }
    }
}
