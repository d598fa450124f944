use std::io::{Read, Write};
use std::net::TcpStream;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;
use traffic_lab_abstract::EngineError;

use crate::codec::{self, DecodeError, ResponseReader};

impl From<DecodeError> for EngineError {
    fn from(err: DecodeError) -> Self {
        EngineError::Protocol(err.to_string())
    }
}

/// A variable domain: the query command id and the id of its response.
#[derive(Debug, Clone, Copy)]
pub struct Domain {
    pub get: u8,
    pub response: u8,
}

pub const EDGE: Domain = Domain {
    get: codec::CMD_GET_EDGE_VARIABLE,
    response: codec::RESPONSE_GET_EDGE_VARIABLE,
};

pub const SIMULATION: Domain = Domain {
    get: codec::CMD_GET_SIM_VARIABLE,
    response: codec::RESPONSE_GET_SIM_VARIABLE,
};

/// Blocking request/response channel to a TraCI server.
#[derive(Debug)]
pub struct TraciConnection {
    stream: TcpStream,
}

impl TraciConnection {
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Send one command and return the reply positioned after its status.
    ///
    /// A non-OK status becomes [`EngineError::Command`] with the server's description.
    pub fn exchange(&mut self, id: u8, content: &[u8]) -> Result<ResponseReader, EngineError> {
        let message = codec::encode_message(id, content);
        self.stream.write_all(&message)?;
        self.stream.flush()?;

        let mut reader = ResponseReader::new(self.read_message()?);
        let status = reader.read_status()?;
        if status.command != id {
            return Err(DecodeError::UnexpectedCommand {
                expected: id,
                got: status.command,
            }
            .into());
        }
        if !status.is_ok() {
            return Err(EngineError::Command {
                command: id,
                message: status.description,
            });
        }
        if !status.description.is_empty() {
            debug!("TraCI 0x{:02x}: {}", id, status.description);
        }
        Ok(reader)
    }

    fn read_message(&mut self) -> Result<Bytes, EngineError> {
        let mut header = [0u8; codec::HEADER_LEN];
        self.stream.read_exact(&mut header)?;
        let total = u32::from_be_bytes(header) as usize;
        if total < codec::HEADER_LEN {
            return Err(DecodeError::BadLength(total as u32).into());
        }
        let mut body = BytesMut::zeroed(total - codec::HEADER_LEN);
        self.stream.read_exact(&mut body)?;
        Ok(body.freeze())
    }

    /// Returns the server's API level and its version string.
    pub fn get_version(&mut self) -> Result<(i32, String), EngineError> {
        let mut reader = self.exchange(codec::CMD_GETVERSION, &[])?;
        let (id, _) = reader.read_command_header()?;
        if id != codec::CMD_GETVERSION {
            return Err(DecodeError::UnexpectedCommand {
                expected: codec::CMD_GETVERSION,
                got: id,
            }
            .into());
        }
        let api = reader.read_i32()?;
        let version = reader.read_string()?;
        Ok((api, version))
    }

    /// Advance the simulation. A target of `0.0` means exactly one step.
    pub fn simulation_step(&mut self, target_time: f64) -> Result<(), EngineError> {
        let mut content = BytesMut::with_capacity(8);
        content.put_f64(target_time);
        let mut reader = self.exchange(codec::CMD_SIMSTEP, &content)?;
        // No subscriptions are ever registered, but the count is always sent.
        if reader.remaining() >= 4 {
            let subscriptions = reader.read_i32()?;
            if subscriptions != 0 {
                debug!("ignoring {subscriptions} subscription results");
            }
        }
        Ok(())
    }

    /// Query a variable and return the reply positioned on its typed value.
    pub fn get_variable(
        &mut self,
        domain: Domain,
        variable: u8,
        object_id: &str,
    ) -> Result<ResponseReader, EngineError> {
        let content = codec::get_variable_content(variable, object_id);
        let mut reader = self.exchange(domain.get, &content)?;
        let object = reader.read_variable_response(domain.response, variable)?;
        if object != object_id {
            return Err(EngineError::Protocol(format!(
                "asked for '{object_id}', engine answered for '{object}'"
            )));
        }
        Ok(reader)
    }

    pub fn get_int(
        &mut self,
        domain: Domain,
        variable: u8,
        object_id: &str,
    ) -> Result<i32, EngineError> {
        Ok(self
            .get_variable(domain, variable, object_id)?
            .read_typed_int()?)
    }

    pub fn get_double(
        &mut self,
        domain: Domain,
        variable: u8,
        object_id: &str,
    ) -> Result<f64, EngineError> {
        Ok(self
            .get_variable(domain, variable, object_id)?
            .read_typed_double()?)
    }

    pub fn get_string_list(
        &mut self,
        domain: Domain,
        variable: u8,
        object_id: &str,
    ) -> Result<Vec<String>, EngineError> {
        Ok(self
            .get_variable(domain, variable, object_id)?
            .read_typed_string_list()?)
    }

    pub fn close(&mut self) -> Result<(), EngineError> {
        self.exchange(codec::CMD_CLOSE, &[])?;
        Ok(())
    }
}
