//! Little-endian byte reader over one operand block or region

use super::TranslateError;

/// Cursor over action bytes
///
/// Offsets in errors are absolute within the region: `base` is the region
/// offset of the first byte of `bytes`.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::at(bytes, 0)
    }

    /// Reader whose first byte sits at region offset `base`
    pub fn at(bytes: &'a [u8], base: usize) -> Self {
        ByteReader { bytes, pos: 0, base }
    }

    /// Region offset of the next byte
    #[inline]
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], TranslateError> {
        if n > self.remaining() {
            return Err(TranslateError::Truncated {
                offset: self.offset(),
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TranslateError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, TranslateError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, TranslateError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, TranslateError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, TranslateError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, TranslateError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32, TranslateError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// SWF doubles store the high 32-bit word first, each word little-endian
    pub fn f64(&mut self) -> Result<f64, TranslateError> {
        let high = self.u32()? as u64;
        let low = self.u32()? as u64;
        Ok(f64::from_bits((high << 32) | low))
    }

    /// NUL-terminated string, without the terminator
    ///
    /// A missing terminator takes the rest of the block.
    pub fn cstr(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.pos += end + 1;
                &rest[..end]
            }
            None => {
                self.pos = self.bytes.len();
                rest
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        let mut r = ByteReader::new(&[0x34, 0x12, 0xFE, 0xFF, 0x07]);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.i16().unwrap(), -2);
        assert_eq!(r.u8().unwrap(), 7);
        assert!(r.is_empty());
    }

    #[test]
    fn test_word_swapped_double() {
        let bits = 1.5f64.to_bits();
        let mut bytes = ((bits >> 32) as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&(bits as u32).to_le_bytes());
        assert_eq!(ByteReader::new(&bytes).f64().unwrap(), 1.5);
    }

    #[test]
    fn test_strings() {
        let mut r = ByteReader::new(b"ab\0cd");
        assert_eq!(r.cstr(), b"ab");
        assert_eq!(r.cstr(), b"cd");
        assert_eq!(r.cstr(), b"");
    }

    #[test]
    fn test_truncation_reports_offset() {
        let mut r = ByteReader::at(&[1, 2, 3], 10);
        r.u8().unwrap();
        assert_eq!(r.u32(), Err(TranslateError::Truncated { offset: 11, needed: 2 }));
    }
}
