//! Drives a SUMO process over its TraCI remote-control protocol.

pub mod codec;
pub mod connection;
pub mod launcher;
pub mod session;

use tracing::info;
use traffic_lab_abstract::{EngineError, EngineOptions, SimulationConfig, SimulationEngine};

pub use connection::TraciConnection;
pub use session::SumoSession;

/// Launches one SUMO process per run.
#[derive(Debug, Clone, Default)]
pub struct SumoEngine {
    options: EngineOptions,
}

impl SumoEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl SimulationEngine for SumoEngine {
    type Session = SumoSession;

    fn start(&mut self, config: &SimulationConfig) -> Result<SumoSession, EngineError> {
        let launcher::Launched {
            mut child,
            stream,
            port,
        } = launcher::launch(&self.options, config)?;
        let connection = match TraciConnection::new(stream) {
            Ok(connection) => connection,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };
        let mut session = SumoSession::new(connection, Some(child));
        // a failed handshake drops the session, which kills the process
        let (api, version) = session.version()?;
        info!("Connected to {version} (TraCI API {api}) on port {port}");
        Ok(session)
    }
}
