use bytes::{Buf, BytesMut};
use std::io;

/// A RESP2 value.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// +OK\r\n
    SimpleString(String),
    /// -ERR message\r\n
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n  or  $-1\r\n (null)
    BulkString(Option<Vec<u8>>),
    /// *2\r\n...  or  *-1\r\n (null)
    Array(Option<Vec<RespValue>>),
    /// _\r\n — accepted on the wire, never emitted by handlers
    Null,
    /// #t\r\n / #f\r\n — accepted on the wire, never emitted by handlers
    Boolean(bool),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Vec<u8>>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(Some(items))
    }

    /// Serialize this value to RESP bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    /// Write RESP bytes into the given buffer.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Error(s) => {
                buf.push(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                buf.push(b':');
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::BulkString(None) => {
                buf.extend_from_slice(b"$-1\r\n");
            }
            RespValue::BulkString(Some(data)) => {
                buf.push(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Array(None) => {
                buf.extend_from_slice(b"*-1\r\n");
            }
            RespValue::Array(Some(items)) => {
                buf.push(b'*');
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.write_to(buf);
                }
            }
            RespValue::Null => {
                buf.extend_from_slice(b"_\r\n");
            }
            RespValue::Boolean(true) => {
                buf.extend_from_slice(b"#t\r\n");
            }
            RespValue::Boolean(false) => {
                buf.extend_from_slice(b"#f\r\n");
            }
        }
    }

    /// Try to interpret this value as raw string bytes (for command parsing).
    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(Some(data)) => Some(data),
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Convert to a UTF-8 string, if possible.
    pub fn to_string_lossy(&self) -> Option<String> {
        self.as_str()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
const MAX_ARRAY_LEN: i64 = 1024 * 1024;
const MAX_INLINE_LEN: usize = 64 * 1024;

/// Streaming RESP parser.
///
/// Handles partial reads — call `parse()` repeatedly as data arrives.
/// Returns `Ok(Some(value))` when a complete value is parsed,
/// `Ok(None)` when more data is needed.
pub struct RespParser;

impl RespParser {
    /// Try to parse a complete RESP value from the buffer.
    ///
    /// Parsing is measure-then-consume: a cursor walks the buffer without
    /// touching it, and the measured bytes are drained only once a whole
    /// value (nested elements included) is present. Incomplete input
    /// therefore returns `Ok(None)` with the buffer intact.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };

        let mut scan = Scan::over(&buf[..]);
        let outcome = match first {
            b'+' | b'-' | b':' | b'$' | b'*' | b'_' | b'#' => scan.value()?,
            // anything else is an inline command line
            _ => scan.inline()?,
        };

        match outcome {
            Some(value) => {
                let measured = scan.measured();
                buf.advance(measured);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// A read-only cursor over the unconsumed buffer.
struct Scan<'a> {
    input: &'a [u8],
    cursor: usize,
}

impl<'a> Scan<'a> {
    fn over(input: &'a [u8]) -> Self {
        Scan { input, cursor: 0 }
    }

    /// How many bytes the completed parse covered.
    fn measured(&self) -> usize {
        self.cursor
    }

    fn remaining(&self) -> &'a [u8] {
        &self.input[self.cursor..]
    }

    /// The bytes up to the next CRLF, cursor moved past the terminator.
    /// None until the terminator has arrived.
    fn line(&mut self) -> Option<&'a [u8]> {
        let rest = self.remaining();
        let end = rest.windows(2).position(|pair| pair == b"\r\n")?;
        self.cursor += end + 2;
        Some(&rest[..end])
    }

    /// Exactly `len` payload bytes, which must be followed by CRLF.
    fn payload(&mut self, len: usize) -> Result<Option<&'a [u8]>, RespError> {
        let rest = self.remaining();
        if rest.len() < len + 2 {
            return Ok(None);
        }
        if &rest[len..len + 2] != b"\r\n" {
            return Err(RespError::InvalidData(
                "missing trailing CRLF after bulk string".into(),
            ));
        }
        self.cursor += len + 2;
        Ok(Some(&rest[..len]))
    }

    /// One typed value: a marker byte, its header line, and for bulk
    /// strings and arrays whatever the header says follows.
    fn value(&mut self) -> Result<Option<RespValue>, RespError> {
        let Some(&marker) = self.remaining().first() else {
            return Ok(None);
        };
        self.cursor += 1;

        let Some(header) = self.line() else {
            return Ok(None);
        };

        match marker {
            b'+' => Ok(Some(RespValue::SimpleString(lossy(header)))),
            b'-' => Ok(Some(RespValue::Error(lossy(header)))),
            b':' => Ok(Some(RespValue::Integer(ascii_i64(
                header,
                "invalid integer",
            )?))),
            b'_' => {
                if header.is_empty() {
                    Ok(Some(RespValue::Null))
                } else {
                    Err(RespError::InvalidData("malformed null".into()))
                }
            }
            b'#' => match header {
                b"t" => Ok(Some(RespValue::Boolean(true))),
                b"f" => Ok(Some(RespValue::Boolean(false))),
                _ => Err(RespError::InvalidData("malformed boolean".into())),
            },
            b'$' => self.bulk_body(header),
            b'*' => self.array_body(header),
            other => Err(RespError::InvalidByte(other)),
        }
    }

    fn bulk_body(&mut self, header: &[u8]) -> Result<Option<RespValue>, RespError> {
        match ascii_i64(header, "invalid bulk length")? {
            -1 => Ok(Some(RespValue::BulkString(None))),
            len if (0..=MAX_BULK_LEN).contains(&len) => Ok(self
                .payload(len as usize)?
                .map(|data| RespValue::BulkString(Some(data.to_vec())))),
            _ => Err(RespError::InvalidData("invalid bulk length".into())),
        }
    }

    fn array_body(&mut self, header: &[u8]) -> Result<Option<RespValue>, RespError> {
        let count = ascii_i64(header, "invalid multibulk length")?;
        if count < 0 {
            // -1 is the null array; other negative counts collapse to it
            return Ok(Some(RespValue::Array(None)));
        }
        if count > MAX_ARRAY_LEN {
            return Err(RespError::InvalidData("invalid multibulk length".into()));
        }

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.value()? {
                Some(item) => items.push(item),
                // a missing element abandons the measurement; nothing was
                // consumed from the real buffer yet
                None => return Ok(None),
            }
        }
        Ok(Some(RespValue::Array(Some(items))))
    }

    /// An inline command: a plain text line split on whitespace into bulk
    /// strings. A bare CRLF becomes an empty array the caller skips.
    fn inline(&mut self) -> Result<Option<RespValue>, RespError> {
        let Some(raw) = self.line() else {
            if self.input.len() > MAX_INLINE_LEN {
                return Err(RespError::InvalidData("inline command too long".into()));
            }
            return Ok(None);
        };

        let line = String::from_utf8_lossy(raw);
        let items: Vec<RespValue> = line
            .split_whitespace()
            .map(|word| RespValue::BulkString(Some(word.as_bytes().to_vec())))
            .collect();
        Ok(Some(RespValue::Array(Some(items))))
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn ascii_i64(bytes: &[u8], what: &str) -> Result<i64, RespError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RespError::InvalidData(what.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error("unexpected type byte '{}'", *.0 as char)]
    InvalidByte(u8),

    #[error("Protocol error: {0}")]
    InvalidData(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
