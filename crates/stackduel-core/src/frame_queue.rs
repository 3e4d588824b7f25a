use crate::state::BoardState;

/// Absolute simulation frame number.
pub type Frame = i64;

pub const DEFAULT_CAPACITY: usize = 100;

/// Ticks between an attack being sent and the garbage landing.
pub const DEFAULT_INCOMING: Frame = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    OutOfRange { frame: Frame, sim_frame: Frame },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { frame, sim_frame } => {
                write!(f, "frame {frame} out of range (simulating {sim_frame})")
            },
        }
    }
}

impl std::error::Error for FrameError {}

/// Garbage sent from one player to the other, stamped with the sender's
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attack {
    pub lines: u32,
    pub at_frame: Frame,
}

/// Circular buffer of per-frame board states plus the garbage and cancel
/// rings.
///
/// Only frames within `capacity / 2` of the simulation cursor can be
/// addressed. Ring slots are zeroed as the cursor passes them, so a slot
/// reused `capacity` frames later starts clean.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    slots: Vec<BoardState>,
    garbage: Vec<u32>,
    cancel: Vec<i32>,
    sim_frame: Frame,
    incoming: Frame,
}

impl FrameQueue {
    /// Queue with every slot primed with `initial`, cursor at frame 0.
    pub fn new(capacity: usize, incoming: Frame, initial: BoardState) -> Self {
        let capacity = capacity.max(2);
        Self {
            slots: vec![initial; capacity],
            garbage: vec![0; capacity],
            cancel: vec![0; capacity],
            sim_frame: 0,
            incoming,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn incoming(&self) -> Frame {
        self.incoming
    }

    /// Last fully simulated frame.
    pub fn sim_frame(&self) -> Frame {
        self.sim_frame
    }

    /// Furthest frame ahead of the cursor that can be addressed.
    pub fn horizon(&self) -> Frame {
        self.sim_frame + (self.capacity() / 2) as Frame
    }

    fn index(&self, frame: Frame) -> Result<usize, FrameError> {
        let cap = self.capacity() as Frame;
        if (frame - self.sim_frame).abs() > cap / 2 {
            return Err(FrameError::OutOfRange {
                frame,
                sim_frame: self.sim_frame,
            });
        }
        Ok(frame.rem_euclid(cap) as usize)
    }

    pub fn get(&self, frame: Frame) -> Result<&BoardState, FrameError> {
        let idx = self.index(frame)?;
        Ok(&self.slots[idx])
    }

    pub fn get_mut(&mut self, frame: Frame) -> Result<&mut BoardState, FrameError> {
        let idx = self.index(frame)?;
        Ok(&mut self.slots[idx])
    }

    pub fn set(&mut self, frame: Frame, state: BoardState) -> Result<(), FrameError> {
        let idx = self.index(frame)?;
        self.slots[idx] = state;
        Ok(())
    }

    /// Garbage lines scheduled to land on `frame`.
    pub fn garbage_at(&self, frame: Frame) -> Result<u32, FrameError> {
        let idx = self.index(frame)?;
        Ok(self.garbage[idx])
    }

    /// Net cancel-credit change on `frame`: negative grants, positive expires.
    pub fn cancel_at(&self, frame: Frame) -> Result<i32, FrameError> {
        let idx = self.index(frame)?;
        Ok(self.cancel[idx])
    }

    /// Schedule `qty` lines to land `incoming` frames after `frame`.
    ///
    /// Already simulated frames are never rewritten: a target at or before
    /// the cursor lands on the next frame instead. Returns the landing frame.
    pub fn garbage_upcoming(&mut self, frame: Frame, qty: u32) -> Result<Frame, FrameError> {
        let target = (frame + self.incoming).max(self.sim_frame + 1);
        let idx = self.index(target)?;
        self.garbage[idx] += qty;
        Ok(target)
    }

    /// Grant `qty` lines of cancel credit from the frame after `frame`,
    /// expiring `incoming` frames after `frame`.
    pub fn cancel_garbage(&mut self, frame: Frame, qty: u32) -> Result<(), FrameError> {
        let start = self.index(frame + 1)?;
        let expiry = self.index(frame + self.incoming)?;
        let qty = qty as i32;
        self.cancel[start] -= qty;
        self.cancel[expiry] += qty;
        Ok(())
    }

    /// Advance the cursor past the frame just simulated.
    pub fn forward(&mut self) {
        self.sim_frame += 1;
        let idx = self.sim_frame.rem_euclid(self.capacity() as Frame) as usize;
        self.garbage[idx] = 0;
        self.cancel[idx] = 0;
    }
}
