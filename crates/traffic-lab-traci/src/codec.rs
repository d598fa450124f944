//! TraCI wire format.
//!
//! ```text
//! message  := u32 total_len (including itself) command*
//! command  := u8 len id content            (len counts itself and id)
//!           | 0x00 u32 len id content      (when the short form would exceed 255)
//! string   := u32 len bytes
//! typed    := u8 type value
//! ```
//!
//! Every command is answered by a status command carrying a result byte and
//! a description, optionally followed by a response command with the value.
//! All integers are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const CMD_GETVERSION: u8 = 0x00;
pub const CMD_SIMSTEP: u8 = 0x02;
pub const CMD_CLOSE: u8 = 0x7f;

pub const CMD_GET_EDGE_VARIABLE: u8 = 0xaa;
pub const RESPONSE_GET_EDGE_VARIABLE: u8 = 0xba;
pub const CMD_GET_SIM_VARIABLE: u8 = 0xab;
pub const RESPONSE_GET_SIM_VARIABLE: u8 = 0xbb;

pub const TRACI_ID_LIST: u8 = 0x00;
pub const LAST_STEP_VEHICLE_NUMBER: u8 = 0x10;
pub const LAST_STEP_MEAN_SPEED: u8 = 0x11;
pub const LAST_STEP_OCCUPANCY: u8 = 0x13;
pub const VAR_MIN_EXPECTED_VEHICLES: u8 = 0x7d;

pub const TYPE_INTEGER: u8 = 0x09;
pub const TYPE_DOUBLE: u8 = 0x0b;
pub const TYPE_STRING: u8 = 0x0c;
pub const TYPE_STRINGLIST: u8 = 0x0e;

pub const RTYPE_OK: u8 = 0x00;
pub const RTYPE_NOTIMPLEMENTED: u8 = 0x01;
pub const RTYPE_ERR: u8 = 0xff;

/// Size of the message length prefix.
pub const HEADER_LEN: usize = 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("response truncated: needed {needed} more bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    #[error("expected type 0x{expected:02x}, got 0x{got:02x}")]
    UnexpectedType { expected: u8, got: u8 },

    #[error("expected response to command 0x{expected:02x}, got 0x{got:02x}")]
    UnexpectedCommand { expected: u8, got: u8 },

    #[error("invalid command length {0}")]
    BadLength(u32),

    #[error("string is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Append one command (length header, id, content) to `buf`.
pub fn put_command(buf: &mut BytesMut, id: u8, content: &[u8]) {
    let short_len = 1 + 1 + content.len();
    if short_len <= u8::MAX as usize {
        buf.put_u8(short_len as u8);
    } else {
        buf.put_u8(0);
        buf.put_u32((1 + 4 + 1 + content.len()) as u32);
    }
    buf.put_u8(id);
    buf.put_slice(content);
}

pub fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

/// Wrap encoded commands in a length-prefixed message.
pub fn frame(commands: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + commands.len());
    out.put_u32((HEADER_LEN + commands.len()) as u32);
    out.put_slice(commands);
    out.freeze()
}

/// Encode a single-command message.
pub fn encode_message(id: u8, content: &[u8]) -> Bytes {
    let mut commands = BytesMut::new();
    put_command(&mut commands, id, content);
    frame(&commands)
}

/// Content of a variable query: variable id followed by the object id.
pub fn get_variable_content(variable: u8, object_id: &str) -> BytesMut {
    let mut content = BytesMut::with_capacity(1 + 4 + object_id.len());
    content.put_u8(variable);
    put_string(&mut content, object_id);
    content
}

/// The status part of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub command: u8,
    pub result: u8,
    pub description: String,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        self.result == RTYPE_OK
    }
}

/// Cursor over the body of one reply message (length prefix already stripped).
#[derive(Debug)]
pub struct ResponseReader {
    buf: Bytes,
}

impl ResponseReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(DecodeError::Truncated { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        self.ensure(4)?;
        let len = self.buf.get_u32() as usize;
        self.ensure(len)?;
        let raw = self.buf.split_to(len);
        Ok(String::from_utf8(raw.to_vec())?)
    }

    pub fn read_string_list(&mut self) -> Result<Vec<String>, DecodeError> {
        self.ensure(4)?;
        let count = self.buf.get_u32() as usize;
        // every entry needs at least its length prefix
        self.ensure(count.saturating_mul(4))?;
        (0..count).map(|_| self.read_string()).collect()
    }

    fn expect_type(&mut self, expected: u8) -> Result<(), DecodeError> {
        let got = self.read_u8()?;
        if got != expected {
            return Err(DecodeError::UnexpectedType { expected, got });
        }
        Ok(())
    }

    pub fn read_typed_int(&mut self) -> Result<i32, DecodeError> {
        self.expect_type(TYPE_INTEGER)?;
        self.read_i32()
    }

    pub fn read_typed_double(&mut self) -> Result<f64, DecodeError> {
        self.expect_type(TYPE_DOUBLE)?;
        self.read_f64()
    }

    pub fn read_typed_string(&mut self) -> Result<String, DecodeError> {
        self.expect_type(TYPE_STRING)?;
        self.read_string()
    }

    pub fn read_typed_string_list(&mut self) -> Result<Vec<String>, DecodeError> {
        self.expect_type(TYPE_STRINGLIST)?;
        self.read_string_list()
    }

    /// Read a command header, returning its id and the length of its content.
    pub fn read_command_header(&mut self) -> Result<(u8, usize), DecodeError> {
        let short = self.read_u8()?;
        let content_len = if short == 0 {
            let long = self.read_u32()?;
            if long < 6 {
                return Err(DecodeError::BadLength(long));
            }
            long as usize - 6
        } else {
            if short < 2 {
                return Err(DecodeError::BadLength(short as u32));
            }
            short as usize - 2
        };
        let id = self.read_u8()?;
        Ok((id, content_len))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_status(&mut self) -> Result<Status, DecodeError> {
        let (command, _) = self.read_command_header()?;
        let result = self.read_u8()?;
        let description = self.read_string()?;
        Ok(Status {
            command,
            result,
            description,
        })
    }

    /// Skip the header of a variable response and leave the cursor on the typed value.
    pub fn read_variable_response(
        &mut self,
        response: u8,
        variable: u8,
    ) -> Result<String, DecodeError> {
        let (id, _) = self.read_command_header()?;
        if id != response {
            return Err(DecodeError::UnexpectedCommand {
                expected: response,
                got: id,
            });
        }
        let var = self.read_u8()?;
        if var != variable {
            return Err(DecodeError::UnexpectedCommand {
                expected: variable,
                got: var,
            });
        }
        self.read_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_bytes(buf: &mut BytesMut, command: u8, result: u8, description: &str) {
        let mut content = BytesMut::new();
        content.put_u8(result);
        put_string(&mut content, description);
        put_command(buf, command, &content);
    }

    #[test]
    fn short_command_layout() {
        let msg = encode_message(CMD_SIMSTEP, &0.0f64.to_be_bytes());
        // 4 length + 1 len + 1 id + 8 double
        assert_eq!(msg.len(), 14);
        assert_eq!(&msg[..4], &14u32.to_be_bytes());
        assert_eq!(msg[4], 10);
        assert_eq!(msg[5], CMD_SIMSTEP);
    }

    #[test]
    fn long_command_uses_extended_length() {
        let content = vec![7u8; 300];
        let mut buf = BytesMut::new();
        put_command(&mut buf, CMD_GET_EDGE_VARIABLE, &content);
        assert_eq!(buf[0], 0);
        assert_eq!(&buf[1..5], &306u32.to_be_bytes());
        assert_eq!(buf[5], CMD_GET_EDGE_VARIABLE);

        let mut reader = ResponseReader::new(buf.freeze());
        assert_eq!(
            reader.read_command_header().unwrap(),
            (CMD_GET_EDGE_VARIABLE, 300)
        );
    }

    #[test]
    fn get_variable_content_layout() {
        let content = get_variable_content(LAST_STEP_MEAN_SPEED, "e12");
        assert_eq!(&content[..], &[0x11, 0, 0, 0, 3, b'e', b'1', b'2']);
    }

    #[test]
    fn decodes_status_and_string_list() {
        let mut buf = BytesMut::new();
        status_bytes(&mut buf, CMD_GET_EDGE_VARIABLE, RTYPE_OK, "");
        let mut content = get_variable_content(TRACI_ID_LIST, "");
        content.put_u8(TYPE_STRINGLIST);
        content.put_u32(2);
        put_string(&mut content, "A");
        put_string(&mut content, ":J1_0");
        put_command(&mut buf, RESPONSE_GET_EDGE_VARIABLE, &content);

        let mut reader = ResponseReader::new(buf.freeze());
        let status = reader.read_status().unwrap();
        assert!(status.is_ok());
        assert_eq!(status.command, CMD_GET_EDGE_VARIABLE);
        let object = reader
            .read_variable_response(RESPONSE_GET_EDGE_VARIABLE, TRACI_ID_LIST)
            .unwrap();
        assert_eq!(object, "");
        assert_eq!(
            reader.read_typed_string_list().unwrap(),
            vec!["A".to_string(), ":J1_0".to_string()]
        );
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn error_status_keeps_description() {
        let mut buf = BytesMut::new();
        status_bytes(&mut buf, CMD_GET_EDGE_VARIABLE, RTYPE_ERR, "Edge 'x' is not known");
        let status = ResponseReader::new(buf.freeze()).read_status().unwrap();
        assert!(!status.is_ok());
        assert_eq!(status.description, "Edge 'x' is not known");
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut reader = ResponseReader::new(Bytes::from_static(&[0, 0, 0, 9, b'a']));
        assert_eq!(
            reader.read_string(),
            Err(DecodeError::Truncated {
                needed: 9,
                remaining: 1
            })
        );
    }

    #[test]
    fn wrong_type_byte_is_rejected() {
        let mut reader = ResponseReader::new(Bytes::from_static(&[TYPE_DOUBLE, 0, 0, 0, 1]));
        assert_eq!(
            reader.read_typed_int(),
            Err(DecodeError::UnexpectedType {
                expected: TYPE_INTEGER,
                got: TYPE_DOUBLE
            })
        );
    }
}
