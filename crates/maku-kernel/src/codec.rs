//! Binary codec for the graph cache and the worker wire frames.
//!
//! The codec covers a small closed set of shapes: fixed-width integers,
//! length-prefixed byte strings, homogeneous (possibly nested) sequences,
//! and string-keyed mappings. All multi-byte integers are little-endian on
//! the wire; this module is the only place byte order is considered.
//!
//! Encoding appends to a `Vec<u8>`. Decoding drives a borrowing [`Cursor`]
//! that advances by exactly the bytes consumed; [`Cursor::finish`] rejects
//! anything left over, so a decoded payload accounts for every byte.

use std::collections::HashMap;
use std::hash::Hash;

use maku_types::{MakuError, MakuResult, NodeId};

/// Append a `u32` length prefix, failing if `len` does not fit.
pub(crate) fn put_len(len: usize, what: &'static str, out: &mut Vec<u8>) -> MakuResult<()> {
    let len = u32::try_from(len).map_err(|_| MakuError::EncodeOverflow(what))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

/// A value that can be appended to an encoded buffer.
pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>) -> MakuResult<()>;
}

/// A value that can be read back from a [`Cursor`].
pub trait Decode: Sized {
    fn decode(cur: &mut Cursor<'_>) -> MakuResult<Self>;
}

/// Borrowing read cursor over an encoded buffer.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> MakuResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(MakuError::CacheCorrupt("short read".to_string()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Assert that the whole buffer was consumed.
    pub fn finish(self) -> MakuResult<()> {
        if self.remaining() != 0 {
            return Err(MakuError::CacheCorrupt("trailing bytes".to_string()));
        }
        Ok(())
    }
}

impl Encode for u32 {
    fn encode(&self, out: &mut Vec<u8>) -> MakuResult<()> {
        out.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl Decode for u32 {
    fn decode(cur: &mut Cursor<'_>) -> MakuResult<Self> {
        let b = cur.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl Encode for i32 {
    fn encode(&self, out: &mut Vec<u8>) -> MakuResult<()> {
        out.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl Decode for i32 {
    fn decode(cur: &mut Cursor<'_>) -> MakuResult<Self> {
        let b = cur.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl Encode for NodeId {
    fn encode(&self, out: &mut Vec<u8>) -> MakuResult<()> {
        self.0.encode(out)
    }
}

impl Decode for NodeId {
    fn decode(cur: &mut Cursor<'_>) -> MakuResult<Self> {
        Ok(NodeId(u32::decode(cur)?))
    }
}

impl Encode for str {
    fn encode(&self, out: &mut Vec<u8>) -> MakuResult<()> {
        put_len(self.len(), "string", out)?;
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl Encode for String {
    fn encode(&self, out: &mut Vec<u8>) -> MakuResult<()> {
        self.as_str().encode(out)
    }
}

impl Decode for String {
    fn decode(cur: &mut Cursor<'_>) -> MakuResult<Self> {
        let len = u32::decode(cur)? as usize;
        let bytes = cur.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| MakuError::CacheCorrupt("string is not utf-8".to_string()))
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) -> MakuResult<()> {
        put_len(self.len(), "sequence", out)?;
        for item in self {
            item.encode(out)?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(cur: &mut Cursor<'_>) -> MakuResult<Self> {
        let len = u32::decode(cur)? as usize;
        // a corrupt length must not drive preallocation past the buffer
        let mut items = Vec::with_capacity(len.min(cur.remaining()));
        for _ in 0..len {
            items.push(T::decode(cur)?);
        }
        Ok(items)
    }
}

impl<K: Encode, V: Encode> Encode for HashMap<K, V> {
    fn encode(&self, out: &mut Vec<u8>) -> MakuResult<()> {
        put_len(self.len(), "mapping", out)?;
        // iteration order is implementation-defined; the reader rebuilds by
        // insertion, so order is not observable after a round-trip
        for (k, v) in self {
            k.encode(out)?;
            v.encode(out)?;
        }
        Ok(())
    }
}

impl<K: Decode + Eq + Hash, V: Decode> Decode for HashMap<K, V> {
    fn decode(cur: &mut Cursor<'_>) -> MakuResult<Self> {
        let len = u32::decode(cur)? as usize;
        let mut map = HashMap::with_capacity(len.min(cur.remaining()));
        for _ in 0..len {
            let k = K::decode(cur)?;
            let v = V::decode(cur)?;
            map.insert(k, v);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = Vec::new();
        value.encode(&mut buf).unwrap();
        let mut cur = Cursor::new(&buf);
        assert_eq!(T::decode(&mut cur).unwrap(), value);
        cur.finish().unwrap();
    }

    #[test]
    fn scalars_round_trip() {
        round_trip(0u32);
        round_trip(u32::MAX);
        round_trip(-1i32);
        round_trip(NodeId(42));
    }

    #[test]
    fn integers_are_little_endian() {
        let mut buf = Vec::new();
        0x0102_0304u32.encode(&mut buf).unwrap();
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn strings_round_trip() {
        round_trip(String::new());
        round_trip("cc -o app app.c".to_string());
        round_trip("ビルド".to_string());
    }

    #[test]
    fn string_layout_is_length_then_bytes() {
        let mut buf = Vec::new();
        "ab".encode(&mut buf).unwrap();
        assert_eq!(buf, [2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn nested_sequences_round_trip() {
        round_trip(vec![vec![NodeId(0), NodeId(1)], vec![], vec![NodeId(7)]]);
        round_trip(vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]]);
    }

    #[test]
    fn mappings_round_trip() {
        let map: HashMap<String, NodeId> =
            [("app".to_string(), NodeId(0)), ("lib".to_string(), NodeId(1))].into();
        round_trip(map);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut buf = Vec::new();
        "hello".encode(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);

        let mut cur = Cursor::new(&buf);
        assert!(matches!(
            String::decode(&mut cur),
            Err(MakuError::CacheCorrupt(_))
        ));
    }

    #[test]
    fn declared_length_past_end_is_rejected() {
        // sequence of u32 claiming 3 elements but carrying 1
        let mut buf = Vec::new();
        3u32.encode(&mut buf).unwrap();
        9u32.encode(&mut buf).unwrap();

        let mut cur = Cursor::new(&buf);
        assert!(matches!(
            Vec::<u32>::decode(&mut cur),
            Err(MakuError::CacheCorrupt(_))
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = Vec::new();
        7u32.encode(&mut buf).unwrap();
        buf.push(0);

        let mut cur = Cursor::new(&buf);
        u32::decode(&mut cur).unwrap();
        assert!(matches!(cur.finish(), Err(MakuError::CacheCorrupt(_))));
    }

    #[test]
    fn oversized_length_prefix_overflows() {
        let mut buf = Vec::new();
        let err = put_len(u32::MAX as usize + 1, "sequence", &mut buf).unwrap_err();
        assert!(matches!(err, MakuError::EncodeOverflow("sequence")));
    }
}
