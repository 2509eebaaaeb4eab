//! Resumable scan controller.
//!
//! A scan spans many calls to [`Scanner::step`], one per control tick. Each
//! call does a bounded amount of camera work and returns `None` until the
//! result is known. Camera moves and frame grabs are followed by a settle
//! delay counted in calls, not wall-clock time.

use serde::Serialize;
use std::ops::Index;
use tetra_cam::{CamError, Camera, Grid};
use tetra_link::Transport;
use tetra_proto::event::{ScanEvent, ScanPhase};
use tracing::{debug, info, warn};

use crate::preempt::Preempt;
use crate::program::{Opcode, ScanProgram, MAX_VIRTUAL_TARGETS};
use crate::sink::EventSink;
use crate::translate::{StartingPosition, TranslationTable, PHYSICAL_TARGETS};

/// Wait calls between an aim/grab and the next opcode. The camera servo
/// needs roughly this long at the robot's tick rate.
pub const SETTLE_TICKS: u8 = 3;

/// Detections per physical target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Sightings([u16; PHYSICAL_TARGETS]);

impl Sightings {
    pub fn counts(&self) -> [u16; PHYSICAL_TARGETS] {
        self.0
    }

    pub fn get(&self, id: usize) -> Option<u16> {
        self.0.get(id).copied()
    }

    pub fn total(&self) -> u32 {
        self.0.iter().map(|&c| c as u32).sum()
    }

    /// Physical target with the most detections. Ties go to the lower id;
    /// `None` if nothing was seen.
    pub fn best(&self) -> Option<u8> {
        let mut best: Option<(u8, u16)> = None;
        for (id, &count) in self.0.iter().enumerate() {
            if count > best.map_or(0, |(_, c)| c) {
                best = Some((id as u8, count));
            }
        }
        best.map(|(id, _)| id)
    }

    fn add(&mut self, id: u8, count: u16) {
        let slot = &mut self.0[id as usize];
        *slot = slot.saturating_add(count);
    }
}

impl Index<usize> for Sightings {
    type Output = u16;

    fn index(&self, id: usize) -> &u16 {
        &self.0[id]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Scan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Wait { next: Resume, ticks: u8 },
    Scan,
    Sum,
    Done,
}

impl Phase {
    fn settle() -> Self {
        Phase::Wait { next: Resume::Scan, ticks: 0 }
    }

    fn kind(self) -> ScanPhase {
        match self {
            Phase::Init => ScanPhase::Init,
            Phase::Wait { .. } => ScanPhase::Wait,
            Phase::Scan => ScanPhase::Scan,
            Phase::Sum => ScanPhase::Sum,
            Phase::Done => ScanPhase::Done,
        }
    }
}

enum Flow {
    /// Run the next phase in this same call.
    Continue,
    /// Return to the caller; the scan is not finished.
    Yield,
}

struct Session {
    position: StartingPosition,
    phase: Phase,
    cursor: usize,
    acc: [u16; MAX_VIRTUAL_TARGETS],
    result: Sightings,
    grid: Grid,
    ticks: u32,
}

impl Session {
    fn begin(position: StartingPosition, grid: Grid) -> Self {
        Self {
            position,
            phase: Phase::Init,
            cursor: 0,
            acc: [0; MAX_VIRTUAL_TARGETS],
            result: Sightings::default(),
            grid,
            ticks: 0,
        }
    }
}

pub struct Scanner<T: Transport> {
    camera: Camera<T>,
    program: ScanProgram,
    translation: TranslationTable,
    grid: Grid,
    session: Option<Session>,
    events: Box<dyn EventSink + Send>,
}

impl<T: Transport> Scanner<T> {
    pub fn new(camera: Camera<T>, program: ScanProgram, translation: TranslationTable, grid: Grid) -> Self {
        Self {
            camera,
            program,
            translation,
            grid,
            session: None,
            events: Box::new(()),
        }
    }

    pub fn with_events<S: EventSink + Send + 'static>(mut self, sink: S) -> Self {
        self.events = Box::new(sink);
        self
    }

    /// Advance the scan by one tick.
    ///
    /// The first call after construction or [`reset`](Self::reset) begins a
    /// scan for `position`; later calls continue that scan and ignore
    /// `position`. Returns the sightings once the scan is done, and the same
    /// sightings on every call after that.
    pub fn step<P: Preempt + ?Sized>(&mut self, position: StartingPosition, preempt: &mut P) -> Option<Sightings> {
        let mut s = match self.session.take() {
            Some(s) => s,
            None => {
                info!("scan: begin {}", position);
                Session::begin(position, self.grid)
            }
        };

        if s.phase != Phase::Done {
            s.ticks += 1;
        }

        let out = loop {
            let flow = match s.phase {
                Phase::Init => self.init(&mut s),
                Phase::Wait { .. } => self.wait(&mut s),
                Phase::Scan => self.scan(&mut s, preempt),
                Phase::Sum => self.sum(&mut s),
                Phase::Done => break Some(s.result),
            };
            if let Flow::Yield = flow {
                break None;
            }
        };

        self.session = Some(s);
        out
    }

    /// Drop the current session. The next `step` starts over.
    pub fn reset(&mut self) {
        if self.session.take().is_some() {
            debug!("scan: session reset");
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.cursor)
    }

    pub fn phase(&self) -> Option<ScanPhase> {
        self.session.as_ref().map(|s| s.phase.kind())
    }

    /// Calls spent on the current session, not counting calls after it finished.
    pub fn ticks(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.ticks)
    }

    pub fn is_done(&self) -> bool {
        self.phase() == Some(ScanPhase::Done)
    }

    pub fn camera(&self) -> &Camera<T> {
        &self.camera
    }

    pub fn program(&self) -> &ScanProgram {
        &self.program
    }

    pub fn into_camera(self) -> Camera<T> {
        self.camera
    }

    fn enter(&mut self, s: &mut Session, phase: Phase) {
        s.phase = phase;
        debug!("scan: {:?} at cursor {}", phase.kind(), s.cursor);
        self.events.emit(ScanEvent::PhaseEntered { phase: phase.kind(), cursor: s.cursor });
    }

    fn report(&mut self, e: &CamError) {
        debug!("scan: `{}` failed: {}", e.command(), e);
        self.events.emit(ScanEvent::CommandFailed { command: e.command().to_string(), fault: e.fault() });
    }

    fn init(&mut self, s: &mut Session) -> Flow {
        s.acc = [0; MAX_VIRTUAL_TARGETS];
        s.result = Sightings::default();
        s.cursor = 0;
        s.grid = self.grid;

        if let Err(e) = self.camera.initialize() {
            warn!("scan: camera setup incomplete: {}", e);
            self.report(&e);
        }

        match self.program.find_start(s.position.index()) {
            Some(marker) => {
                s.cursor = marker + 1;
                self.enter(s, Phase::settle());
                Flow::Yield
            }
            None => {
                warn!("scan: no scan block for {}", s.position);
                self.events.emit(ScanEvent::NoStartMarker { position: s.position.index() });
                s.cursor = self.program.end_index();
                self.enter(s, Phase::Sum);
                Flow::Continue
            }
        }
    }

    fn wait(&mut self, s: &mut Session) -> Flow {
        let Phase::Wait { next, ticks } = s.phase else {
            return Flow::Continue;
        };
        let ticks = ticks + 1;

        if ticks == 1 {
            // Keeps the camera's command parser busy while the servo moves.
            let (x, y) = s.grid.last_cell();
            self.camera.classify(&s.grid, x, y);
        }

        if ticks >= SETTLE_TICKS {
            let phase = match next {
                Resume::Scan => Phase::Scan,
            };
            self.enter(s, phase);
        } else {
            s.phase = Phase::Wait { next, ticks };
        }
        Flow::Yield
    }

    fn scan<P: Preempt + ?Sized>(&mut self, s: &mut Session, preempt: &mut P) -> Flow {
        loop {
            if preempt.should_yield() {
                return Flow::Yield;
            }

            let op = self.program.get(s.cursor).unwrap_or(Opcode::End);
            match op {
                Opcode::StartMarker { .. } | Opcode::End => {
                    self.enter(s, Phase::Sum);
                    return Flow::Continue;
                }
                Opcode::SetAngle { angle } => {
                    s.cursor += 1;
                    if let Err(e) = self.camera.aim(angle) {
                        self.report(&e);
                    }
                    self.enter(s, Phase::settle());
                    return Flow::Yield;
                }
                Opcode::Grab => {
                    s.cursor += 1;
                    if let Err(e) = self.camera.grab_frame() {
                        self.report(&e);
                    }
                    self.enter(s, Phase::settle());
                    return Flow::Yield;
                }
                Opcode::Probe { x, y, target } => {
                    s.cursor += 1;
                    match self.camera.sample(&s.grid, x, y) {
                        Ok(sample) if sample.category == self.camera.active_color() => {
                            let slot = &mut s.acc[target as usize];
                            *slot = slot.saturating_add(1);
                            self.events.emit(ScanEvent::Sighting { x, y, target });
                        }
                        Ok(_) => {}
                        Err(e) => self.report(&e),
                    }
                }
            }
        }
    }

    fn sum(&mut self, s: &mut Session) -> Flow {
        for (virtual_target, &count) in s.acc.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let target = virtual_target as u8;
            match self.translation.lookup(s.position, target) {
                Some(id) => s.result.add(id, count),
                None => {
                    warn!("scan: virtual target {} has no translation for {}, {} sightings dropped", target, s.position, count);
                    self.events.emit(ScanEvent::Untranslated { position: s.position.index(), target, count });
                }
            }
        }

        info!("scan: done {} in {} ticks: {:?}", s.position, s.ticks, s.result.counts());
        self.events.emit(ScanEvent::Finished { position: s.position.index(), counts: s.result.counts() });
        self.enter(s, Phase::Done);
        Flow::Continue
    }
}
