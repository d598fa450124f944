use serde::Serialize;
use tracing::{debug, info, warn};
use traffic_lab_abstract::{
    EdgeSamples, EngineError, EngineSession, SamplerConfig, SimulationConfig, SimulationEngine,
};

/// Everything a completed run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampledRun {
    /// Number of times the engine was stepped.
    pub steps: u64,
    pub edges: EdgeSamples,
}

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// The engine could not be launched or rejected the configuration.
    #[error("failed to start simulation engine")]
    EngineStart(#[source] EngineError),

    /// The engine failed after a successful start. Samples collected so far are discarded.
    #[error("simulation engine failed at step {step}")]
    EngineStep {
        step: u64,
        #[source]
        source: EngineError,
    },

    /// `max_steps` was reached while vehicles were still pending.
    #[error("step limit of {limit} reached with {pending} vehicles still pending")]
    StepLimitExceeded { limit: u64, pending: u32 },
}

/// Steps an engine until no vehicle is pending and collects per-edge samples.
#[derive(Debug)]
pub struct SimulationSampler<E> {
    engine: E,
    config: SamplerConfig,
}

impl<E: SimulationEngine> SimulationSampler<E> {
    pub fn new(engine: E, config: SamplerConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Run one simulation to completion.
    ///
    /// The session is closed exactly once on every path out of the loop,
    /// before any error reaches the caller. A run is all or nothing: on
    /// failure no samples are returned.
    pub fn run(&mut self, config: &SimulationConfig) -> Result<SampledRun, SamplerError> {
        info!(
            "Starting simulation with configuration {}",
            config.config_path.display()
        );
        let session = self
            .engine
            .start(config)
            .map_err(SamplerError::EngineStart)?;
        let mut guard = SessionGuard::new(session);

        let run = sample(guard.session(), &self.config)?;

        guard.close().map_err(|source| SamplerError::EngineStep {
            step: run.steps,
            source,
        })?;
        info!(
            "Simulation completed: {} steps, {} edges sampled",
            run.steps,
            run.edges.len()
        );
        Ok(run)
    }
}

fn sample<S: EngineSession>(
    session: &mut S,
    config: &SamplerConfig,
) -> Result<SampledRun, SamplerError> {
    let at = |step: u64| move |source: EngineError| SamplerError::EngineStep { step, source };

    let mut edges = EdgeSamples::new();
    let mut steps: u64 = 0;
    loop {
        let pending = session.pending_or_active_count().map_err(at(steps))?;
        if steps > 0 && config.progress_interval > 0 && steps % config.progress_interval == 0 {
            info!("Step {steps}: {pending} vehicles remaining");
        }
        if pending == 0 {
            break;
        }
        if let Some(limit) = config.max_steps
            && steps >= limit
        {
            return Err(SamplerError::StepLimitExceeded { limit, pending });
        }

        session.step().map_err(at(steps + 1))?;
        steps += 1;

        let edge_ids = session.edge_ids().map_err(at(steps))?;
        for edge_id in &edge_ids {
            let vehicles = session.vehicle_count(edge_id).map_err(at(steps))?;
            let speed = session.mean_speed(edge_id).map_err(at(steps))?;
            let occupancy = session.occupancy(edge_id).map_err(at(steps))?;
            edges.record(edge_id, vehicles, speed, occupancy);
        }
        debug!("step {steps}: sampled {} edges", edge_ids.len());
    }
    Ok(SampledRun { steps, edges })
}

/// Closes the wrapped session when dropped, unless it was closed explicitly.
struct SessionGuard<S: EngineSession> {
    session: S,
    closed: bool,
}

impl<S: EngineSession> SessionGuard<S> {
    fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    fn session(&mut self) -> &mut S {
        &mut self.session
    }

    fn close(mut self) -> Result<(), EngineError> {
        self.closed = true;
        self.session.close()
    }
}

impl<S: EngineSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.session.close() {
            warn!("Failed to close simulation engine after an error: {e}");
        }
    }
}
