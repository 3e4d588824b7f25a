use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use stackduel_core::frame_queue::{Attack, Frame};
use stackduel_core::net::messages::FrameInput;

/// Everything a clock multiplexes besides its own ticks.
#[derive(Debug)]
pub enum ClockEvent {
    Inputs {
        inputs: Vec<FrameInput>,
        latest_frame: Frame,
    },
    Attack(Attack),
    Pause,
    Resume,
    Quit,
}

/// Whether the clock keeps running after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// The single owner of whatever a clock drives. Every callback runs on the
/// clock task, so implementors need no locking.
pub trait TickHandler: Send + 'static {
    fn on_tick(&mut self, tick: u64) -> TickFlow;

    fn on_inputs(&mut self, inputs: Vec<FrameInput>, latest_frame: Frame);

    fn on_attack(&mut self, attack: Attack);
}

/// Sending side of a clock's event channel.
#[derive(Debug, Clone)]
pub struct ClockHandle {
    tx: mpsc::UnboundedSender<ClockEvent>,
}

pub type ClockReceiver = mpsc::UnboundedReceiver<ClockEvent>;

impl ClockHandle {
    fn send(&self, event: ClockEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn record_inputs(&self, inputs: Vec<FrameInput>, latest_frame: Frame) -> bool {
        self.send(ClockEvent::Inputs {
            inputs,
            latest_frame,
        })
    }

    pub fn attack(&self, attack: Attack) -> bool {
        self.send(ClockEvent::Attack(attack))
    }

    pub fn pause(&self) -> bool {
        self.send(ClockEvent::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(ClockEvent::Resume)
    }

    pub fn quit(&self) -> bool {
        self.send(ClockEvent::Quit)
    }

    /// True once the clock task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a clock's channel ahead of spawning it, so two clocks can be
/// handed each other's handles.
pub fn clock_channel() -> (ClockHandle, ClockReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ClockHandle { tx }, rx)
}

/// Spawn a fixed-rate clock driving `handler` as a tokio task.
pub fn spawn_clock<H: TickHandler>(handler: H, rx: ClockReceiver, period: Duration) -> JoinHandle<()> {
    tokio::spawn(run_clock(handler, rx, period))
}

async fn run_clock<H: TickHandler>(mut handler: H, mut rx: ClockReceiver, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut tick: u64 = 0;
    let mut paused = false;

    loop {
        tokio::select! {
            _ = interval.tick(), if !paused => {
                tick += 1;
                if handler.on_tick(tick) == TickFlow::Stop {
                    tracing::debug!(tick, "Clock stopped by handler");
                    break;
                }
            },
            event = rx.recv() => match event {
                Some(ClockEvent::Inputs { inputs, latest_frame }) => {
                    handler.on_inputs(inputs, latest_frame);
                },
                Some(ClockEvent::Attack(attack)) => handler.on_attack(attack),
                Some(ClockEvent::Pause) => paused = true,
                Some(ClockEvent::Resume) => {
                    if paused {
                        paused = false;
                        interval.reset();
                    }
                },
                Some(ClockEvent::Quit) | None => {
                    tracing::debug!(tick, "Clock quit");
                    break;
                },
            },
        }
    }
}
