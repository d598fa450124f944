//! A scripted stand-in for the simulation engine.
//!
//! [`ScriptedEngine`] replays a fixed list of frames, one per step, and
//! records every call made against it so tests can check call order and
//! counts. Failures can be injected at any point of any iteration.

use std::cell::RefCell;
use std::rc::Rc;

use traffic_lab_abstract::{EngineError, EngineSession, SimulationConfig, SimulationEngine};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Start,
    Step,
    EdgeIds,
    VehicleCount(String),
    MeanSpeed(String),
    Occupancy(String),
    PendingOrActive,
    Close,
}

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    PendingOrActive,
    Step,
    EdgeIds,
    VehicleCount,
    MeanSpeed,
    Occupancy,
    Close,
}

/// One edge as reported after a step.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeReading {
    pub edge_id: String,
    pub vehicles: u32,
    pub speed: f64,
    pub occupancy: f64,
}

impl EdgeReading {
    pub fn new(edge_id: impl Into<String>, vehicles: u32, speed: f64) -> Self {
        Self {
            edge_id: edge_id.into(),
            vehicles,
            speed,
            occupancy: 0.0,
        }
    }

    pub fn with_occupancy(mut self, occupancy: f64) -> Self {
        self.occupancy = occupancy;
        self
    }
}

/// Everything the engine reports after one step.
pub type Frame = Vec<EdgeReading>;

/// Shared record of calls made against a scripted engine and its sessions.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<EngineCall>>>);

impl CallLog {
    fn push(&self, call: EngineCall) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.borrow().clone()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.0.borrow().iter().filter(|c| *c == call).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    frames: Vec<Frame>,
    start_error: Option<String>,
    failure: Option<(u64, FailPoint)>,
    stalled: bool,
    log: CallLog,
}

impl ScriptedEngine {
    /// The engine reports vehicles pending until every frame has been stepped through.
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    pub fn failing_start(message: impl Into<String>) -> Self {
        Self {
            start_error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Fail `point` during iteration `iteration` (1-based). An iteration is the
    /// pending check, the step and the reads that follow it. `Close` ignores
    /// the iteration.
    pub fn fail_on(mut self, iteration: u64, point: FailPoint) -> Self {
        self.failure = Some((iteration, point));
        self
    }

    /// Never report zero pending vehicles; the last frame repeats forever.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

impl SimulationEngine for ScriptedEngine {
    type Session = ScriptedSession;

    fn start(&mut self, _config: &SimulationConfig) -> Result<ScriptedSession, EngineError> {
        self.log.push(EngineCall::Start);
        if let Some(message) = &self.start_error {
            return Err(EngineError::Launch(message.clone()));
        }
        Ok(ScriptedSession {
            frames: self.frames.clone(),
            failure: self.failure,
            stalled: self.stalled,
            log: self.log.clone(),
            steps: 0,
        })
    }
}

#[derive(Debug)]
pub struct ScriptedSession {
    frames: Vec<Frame>,
    failure: Option<(u64, FailPoint)>,
    stalled: bool,
    log: CallLog,
    steps: u64,
}

impl ScriptedSession {
    fn check(&self, point: FailPoint) -> Result<(), EngineError> {
        let iteration = match point {
            FailPoint::PendingOrActive | FailPoint::Step => self.steps + 1,
            _ => self.steps,
        };
        match self.failure {
            Some((_, FailPoint::Close)) if point == FailPoint::Close => {
                Err(Self::failure(point, iteration))
            }
            Some((at, fail)) if fail == point && at == iteration => {
                Err(Self::failure(point, iteration))
            }
            _ => Ok(()),
        }
    }

    fn failure(point: FailPoint, iteration: u64) -> EngineError {
        EngineError::Command {
            command: 0,
            message: format!("scripted {point:?} failure in iteration {iteration}"),
        }
    }

    fn frame(&self) -> &[EdgeReading] {
        let index = self.steps.saturating_sub(1) as usize;
        match self.frames.get(index).or(self.frames.last()) {
            Some(frame) if self.steps > 0 => frame.as_slice(),
            _ => &[],
        }
    }

    fn reading(&self, edge: &str) -> Result<&EdgeReading, EngineError> {
        self.frame()
            .iter()
            .find(|r| r.edge_id == edge)
            .ok_or_else(|| EngineError::Command {
                command: 0,
                message: format!("Edge '{edge}' is not known"),
            })
    }
}

impl EngineSession for ScriptedSession {
    fn step(&mut self) -> Result<(), EngineError> {
        self.log.push(EngineCall::Step);
        self.check(FailPoint::Step)?;
        self.steps += 1;
        Ok(())
    }

    fn edge_ids(&mut self) -> Result<Vec<String>, EngineError> {
        self.log.push(EngineCall::EdgeIds);
        self.check(FailPoint::EdgeIds)?;
        Ok(self.frame().iter().map(|r| r.edge_id.clone()).collect())
    }

    fn vehicle_count(&mut self, edge: &str) -> Result<u32, EngineError> {
        self.log.push(EngineCall::VehicleCount(edge.to_string()));
        self.check(FailPoint::VehicleCount)?;
        Ok(self.reading(edge)?.vehicles)
    }

    fn mean_speed(&mut self, edge: &str) -> Result<f64, EngineError> {
        self.log.push(EngineCall::MeanSpeed(edge.to_string()));
        self.check(FailPoint::MeanSpeed)?;
        Ok(self.reading(edge)?.speed)
    }

    fn occupancy(&mut self, edge: &str) -> Result<f64, EngineError> {
        self.log.push(EngineCall::Occupancy(edge.to_string()));
        self.check(FailPoint::Occupancy)?;
        Ok(self.reading(edge)?.occupancy)
    }

    fn pending_or_active_count(&mut self) -> Result<u32, EngineError> {
        self.log.push(EngineCall::PendingOrActive);
        self.check(FailPoint::PendingOrActive)?;
        let remaining = (self.frames.len() as u64).saturating_sub(self.steps) as u32;
        Ok(if self.stalled { remaining.max(1) } else { remaining })
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.log.push(EngineCall::Close);
        self.check(FailPoint::Close)
    }
}
