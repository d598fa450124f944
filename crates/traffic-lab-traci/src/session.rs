use std::process::Child;

use tracing::{debug, info, warn};
use traffic_lab_abstract::{EngineError, EngineSession};

use crate::codec;
use crate::connection::{EDGE, SIMULATION, TraciConnection};

/// A running SUMO process and its TraCI connection.
///
/// Dropping a session that was never closed kills and reaps the process.
#[derive(Debug)]
pub struct SumoSession {
    connection: Option<TraciConnection>,
    child: Option<Child>,
}

impl SumoSession {
    pub fn new(connection: TraciConnection, child: Option<Child>) -> Self {
        Self {
            connection: Some(connection),
            child,
        }
    }

    fn connection(&mut self) -> Result<&mut TraciConnection, EngineError> {
        self.connection.as_mut().ok_or(EngineError::Closed)
    }

    pub fn version(&mut self) -> Result<(i32, String), EngineError> {
        self.connection()?.get_version()
    }

    fn count(value: i32, what: &str) -> Result<u32, EngineError> {
        u32::try_from(value)
            .map_err(|_| EngineError::Protocol(format!("negative {what} reported: {value}")))
    }
}

impl EngineSession for SumoSession {
    fn step(&mut self) -> Result<(), EngineError> {
        self.connection()?.simulation_step(0.0)
    }

    fn edge_ids(&mut self) -> Result<Vec<String>, EngineError> {
        self.connection()?
            .get_string_list(EDGE, codec::TRACI_ID_LIST, "")
    }

    fn vehicle_count(&mut self, edge: &str) -> Result<u32, EngineError> {
        let value = self
            .connection()?
            .get_int(EDGE, codec::LAST_STEP_VEHICLE_NUMBER, edge)?;
        Self::count(value, "vehicle count")
    }

    fn mean_speed(&mut self, edge: &str) -> Result<f64, EngineError> {
        self.connection()?
            .get_double(EDGE, codec::LAST_STEP_MEAN_SPEED, edge)
    }

    fn occupancy(&mut self, edge: &str) -> Result<f64, EngineError> {
        self.connection()?
            .get_double(EDGE, codec::LAST_STEP_OCCUPANCY, edge)
    }

    fn pending_or_active_count(&mut self) -> Result<u32, EngineError> {
        let value = self
            .connection()?
            .get_int(SIMULATION, codec::VAR_MIN_EXPECTED_VEHICLES, "")?;
        Self::count(value, "expected vehicle count")
    }

    fn close(&mut self) -> Result<(), EngineError> {
        let mut connection = self.connection.take().ok_or(EngineError::Closed)?;
        let sent = connection.close();
        drop(connection);
        if let Some(mut child) = self.child.take() {
            if sent.is_ok() {
                let status = child.wait()?;
                info!("SUMO exited with {status}");
            } else {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
        sent
    }
}

impl Drop for SumoSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            warn!("SUMO session dropped without close; killing process");
            if let Err(e) = child.kill() {
                debug!("kill failed: {e}");
            }
            let _ = child.wait();
        }
    }
}
