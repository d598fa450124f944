use crate::config::SimulationConfig;

/// Errors raised by an engine implementation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine process could not be brought up or reached.
    #[error("failed to launch simulation engine: {0}")]
    Launch(String),

    #[error("I/O error while talking to the simulation engine")]
    Io(#[from] std::io::Error),

    /// The engine answered a command with an error status. The message is the engine's own.
    #[error("engine rejected command 0x{command:02x}: {message}")]
    Command { command: u8, message: String },

    /// The engine answered with bytes we could not make sense of.
    #[error("malformed engine response: {0}")]
    Protocol(String),

    #[error("engine session is already closed")]
    Closed,
}

/// Something that can start a simulation run.
///
/// Only one session is attached to a given engine at a time; the sampler
/// owns the engine for the whole run instead of reaching for a global.
pub trait SimulationEngine {
    type Session: EngineSession;

    /// Launch the engine with `config`. The configuration is validated by
    /// the engine, not by the caller.
    fn start(&mut self, config: &SimulationConfig) -> Result<Self::Session, EngineError>;
}

/// An attached connection to a running simulation.
///
/// Every call blocks until the engine has answered.
pub trait EngineSession {
    /// Advance simulated time by one fixed step.
    fn step(&mut self) -> Result<(), EngineError>;

    /// Ids of every edge the engine currently knows about.
    fn edge_ids(&mut self) -> Result<Vec<String>, EngineError>;

    /// Vehicles on `edge` during the last step.
    fn vehicle_count(&mut self, edge: &str) -> Result<u32, EngineError>;

    /// Mean speed on `edge` during the last step, in m/s.
    fn mean_speed(&mut self, edge: &str) -> Result<f64, EngineError>;

    /// Fraction of the last step during which `edge` was occupied.
    fn occupancy(&mut self, edge: &str) -> Result<f64, EngineError>;

    /// Vehicles still waiting to depart plus vehicles currently in the network.
    fn pending_or_active_count(&mut self) -> Result<u32, EngineError>;

    /// Detach from the engine and let it shut down.
    fn close(&mut self) -> Result<(), EngineError>;
}
