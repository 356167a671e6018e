//! Parcel buffer
//!
//! A `Parcel` is the flat little-endian record the modem daemon exchanges
//! with the telephony stack. Integers are 4 bytes; strings are UTF-16 with an
//! i32 length prefix (code units, `-1` for null), a NUL terminator and zero
//! padding to a 4-byte boundary.
//!
//! Reads advance a position cursor. The cursor can be saved and restored with
//! [`Parcel::data_position`] / [`Parcel::set_data_position`], which is what
//! lets the unsolicited router peek at an opcode and hand the untouched
//! parcel to another parser.

use crate::error::ParseError;

/// Owned parcel buffer with a read cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parcel {
    data: Vec<u8>,
    pos: usize,
}

impl Parcel {
    /// Create an empty parcel
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(64),
            pos: 0,
        }
    }

    /// Wrap received bytes; the cursor starts at 0
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the parcel holds no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the cursor and the end
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Current cursor position
    pub fn data_position(&self) -> usize {
        self.pos
    }

    /// Move the cursor. Positions past the end are rejected.
    pub fn set_data_position(&mut self, position: usize) -> Result<(), ParseError> {
        if position > self.data.len() {
            return Err(ParseError::InvalidPosition {
                position,
                len: self.data.len(),
            });
        }
        self.pos = position;
        Ok(())
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the parcel, returning the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Append a 32-bit integer
    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a UTF-16 string (`None` encodes as the null string)
    pub fn write_string(&mut self, value: Option<&str>) {
        let Some(s) = value else {
            self.write_i32(-1);
            return;
        };

        let units: Vec<u16> = s.encode_utf16().collect();
        self.write_i32(units.len() as i32);
        for unit in &units {
            self.data.extend_from_slice(&unit.to_le_bytes());
        }
        // NUL terminator
        self.data.extend_from_slice(&[0, 0]);
        self.pad_to_word();
    }

    fn pad_to_word(&mut self) {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
    }

    fn take(&mut self, n: usize) -> Result<&[u8], ParseError> {
        if self.remaining() < n {
            return Err(ParseError::Incomplete {
                needed: n - self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    /// Read a 32-bit integer at the cursor
    pub fn read_i32(&mut self) -> Result<i32, ParseError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a UTF-16 string at the cursor (`None` for the null string)
    pub fn read_string(&mut self) -> Result<Option<String>, ParseError> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(ParseError::InvalidLength(len));
        }

        // Code units plus terminator, rounded up to a word
        let byte_len = (len as usize + 1) * 2;
        let padded = (byte_len + 3) & !3;
        let bytes = self.take(padded)?;

        let units: Vec<u16> = bytes[..len as usize * 2]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units)
            .map(Some)
            .map_err(|_| ParseError::InvalidString)
    }

    /// Read the 32-bit integer at the cursor without consuming it
    pub fn peek_i32(&self) -> Result<i32, ParseError> {
        if self.remaining() < 4 {
            return Err(ParseError::Incomplete {
                needed: 4 - self.remaining(),
            });
        }
        let b = &self.data[self.pos..self.pos + 4];
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_layout_is_little_endian() {
        let mut p = Parcel::new();
        p.write_i32(0x113);
        assert_eq!(p.as_bytes(), &[0x13, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_string_is_padded_to_word() {
        let mut p = Parcel::new();
        p.write_string(Some("+1"));
        // len(4) + 2 units(4) + NUL(2) + pad(2)
        assert_eq!(p.len(), 12);
        assert_eq!(&p.as_bytes()[..4], &[2, 0, 0, 0]);
        assert_eq!(&p.as_bytes()[4..8], &[b'+', 0, b'1', 0]);

        let mut p = Parcel::from_bytes(p.into_bytes());
        assert_eq!(p.read_string().unwrap(), Some("+1".to_string()));
        assert_eq!(p.remaining(), 0);
    }

    #[test]
    fn test_null_string() {
        let mut p = Parcel::new();
        p.write_string(None);
        p.write_i32(7);

        let mut p = Parcel::from_bytes(p.into_bytes());
        assert_eq!(p.read_string().unwrap(), None);
        assert_eq!(p.read_i32().unwrap(), 7);
    }

    #[test]
    fn test_short_read_reports_missing_bytes() {
        let mut p = Parcel::from_bytes(vec![0x01, 0x02]);
        assert_eq!(p.read_i32(), Err(ParseError::Incomplete { needed: 2 }));
    }

    #[test]
    fn test_peek_does_not_move_cursor() {
        let mut p = Parcel::new();
        p.write_i32(1053);
        p.write_i32(2);
        let mut p = Parcel::from_bytes(p.into_bytes());

        assert_eq!(p.peek_i32().unwrap(), 1053);
        assert_eq!(p.data_position(), 0);
        assert_eq!(p.read_i32().unwrap(), 1053);
        assert_eq!(p.data_position(), 4);
    }

    #[test]
    fn test_rewind() {
        let mut p = Parcel::new();
        p.write_i32(1);
        p.write_i32(2);
        let mut p = Parcel::from_bytes(p.into_bytes());

        let start = p.data_position();
        p.read_i32().unwrap();
        p.set_data_position(start).unwrap();
        assert_eq!(p.read_i32().unwrap(), 1);

        assert!(p.set_data_position(9).is_err());
    }
}
