//! In-memory stand-ins for every pipeline stage, recording the calls they
//! receive into one shared event log.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::capture::domain::frame_source::FrameSource;
use crate::container::domain::container_writer::{ContainerFormat, ContainerWriter};
use crate::encoding::domain::encoder_session::{EncoderSession, EncoderState};
use crate::shared::encoded_packet::EncodedPacket;
use crate::shared::error::RecorderError;
use crate::shared::planar_frame::{PlanarFrame, PlanarLayout};
use crate::shared::rational::Rational;
use crate::shared::raw_frame::{PixelLayout, RawFrame};
use crate::shared::stream_descriptor::StreamDescriptor;

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Begin,
    Submit(i64),
    Flush,
    Write { pts: Option<i64>, dts: Option<i64> },
    Finalize,
    EncoderClosed,
    SourceClosed,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

pub fn count(log: &EventLog, event: &Event) -> usize {
    events(log).iter().filter(|e| *e == event).count()
}

pub fn written_pts(log: &EventLog) -> Vec<i64> {
    let mut pts: Vec<i64> = events(log)
        .iter()
        .filter_map(|e| match e {
            Event::Write { pts, .. } => *pts,
            _ => None,
        })
        .collect();
    pts.sort_unstable();
    pts
}

/// Source producing `frames` frames (`None` = endless).
pub struct StubSource {
    remaining: Option<u64>,
    frame: RawFrame,
    grabbed: u64,
    fail_at: Option<u64>,
    exit_after: Option<u64>,
    cancel_after: Option<(u64, Arc<AtomicBool>)>,
    log: EventLog,
}

impl StubSource {
    pub fn new(frames: Option<u64>, log: &EventLog) -> Self {
        Self {
            remaining: frames,
            frame: RawFrame::blank(WIDTH, HEIGHT, PixelLayout::Bgr24),
            grabbed: 0,
            fail_at: None,
            exit_after: None,
            cancel_after: None,
            log: log.clone(),
        }
    }

    /// The grab with this zero-based index fails.
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn exit_after(mut self, frames: u64) -> Self {
        self.exit_after = Some(frames);
        self
    }

    /// Raises `flag` once `frames` frames have been grabbed, like a Ctrl+C
    /// arriving mid-session.
    pub fn cancel_after(mut self, frames: u64, flag: Arc<AtomicBool>) -> Self {
        self.cancel_after = Some((frames, flag));
        self
    }
}

impl FrameSource for StubSource {
    fn grab(&mut self) -> Result<Option<&RawFrame>, RecorderError> {
        if self.fail_at == Some(self.grabbed) {
            return Err(RecorderError::Capture("device unplugged".into()));
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        self.frame.set_index(self.grabbed);
        self.grabbed += 1;
        if let Some((after, flag)) = &self.cancel_after {
            if self.grabbed >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(Some(&self.frame))
    }

    fn poll_exit(&mut self) -> bool {
        self.exit_after.is_some_and(|n| self.grabbed >= n)
    }

    fn close(&mut self) {
        self.log.lock().unwrap().push(Event::SourceClosed);
    }
}

pub fn descriptor() -> StreamDescriptor {
    StreamDescriptor {
        encoder_name: "stub".into(),
        codec_name: "stub".into(),
        width: WIDTH,
        height: HEIGHT,
        pixel_format: PlanarLayout::Yuv420p,
        time_base: Rational::new(1, 24),
        frame_rate: Rational::new(24, 1),
        bit_rate: 0,
        extradata: Vec::new(),
    }
}

/// Encoder holding back `latency` frames before emitting packets, the way
/// lookahead codecs do.
pub struct StubEncoder {
    descriptor: StreamDescriptor,
    latency: usize,
    pending: VecDeque<i64>,
    next_pts: i64,
    state: EncoderState,
    fail_at: Option<i64>,
    log: EventLog,
}

impl StubEncoder {
    pub fn new(latency: usize, log: &EventLog) -> Self {
        Self {
            descriptor: descriptor(),
            latency,
            pending: VecDeque::new(),
            next_pts: 0,
            state: EncoderState::Open,
            fail_at: None,
            log: log.clone(),
        }
    }

    /// Submitting the frame with this pts fails.
    pub fn failing_at(mut self, pts: i64) -> Self {
        self.fail_at = Some(pts);
        self
    }
}

impl EncoderSession for StubEncoder {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn state(&self) -> EncoderState {
        self.state
    }

    fn submit(&mut self, frame: Option<&PlanarFrame>) -> Result<(), RecorderError> {
        if !self.state.accepts_input() {
            return Err(RecorderError::InvalidState(format!("submit while {:?}", self.state)));
        }
        match frame {
            Some(_) => {
                if self.fail_at == Some(self.next_pts) {
                    return Err(RecorderError::Encoding("codec rejected frame".into()));
                }
                self.log.lock().unwrap().push(Event::Submit(self.next_pts));
                self.pending.push_back(self.next_pts);
                self.next_pts += 1;
                self.state = EncoderState::Encoding;
            }
            None => {
                self.log.lock().unwrap().push(Event::Flush);
                self.state = EncoderState::Flushing;
            }
        }
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Option<EncodedPacket>, RecorderError> {
        let ready = match self.state {
            EncoderState::Encoding => self.pending.len() > self.latency,
            EncoderState::Flushing => !self.pending.is_empty(),
            EncoderState::Closed => {
                return Err(RecorderError::InvalidState("receive after close".into()))
            }
            _ => false,
        };
        if !ready {
            if self.state == EncoderState::Flushing {
                self.state = EncoderState::Drained;
            }
            return Ok(None);
        }
        let pts = self.pending.pop_front();
        Ok(Some(EncodedPacket {
            data: vec![0, 0, 1],
            pts,
            dts: pts,
            duration: 1,
            is_key: pts == Some(0),
            time_base: self.descriptor.time_base,
        }))
    }

    fn close(&mut self) {
        if self.state != EncoderState::Closed {
            self.state = EncoderState::Closed;
            self.log.lock().unwrap().push(Event::EncoderClosed);
        }
    }
}

/// Writer enforcing the begin / write / finalize call order.
pub struct StubWriter {
    format: ContainerFormat,
    begun: bool,
    finalized: bool,
    fail_begin: bool,
    fail_write_at: Option<usize>,
    writes: usize,
    log: EventLog,
}

impl StubWriter {
    pub fn new(log: &EventLog) -> Self {
        Self {
            format: ContainerFormat {
                name: "stub".into(),
                long_name: "stub container".into(),
                video_codec: "stub".into(),
                video_encoder: Some("stub".into()),
                global_header: false,
            },
            begun: false,
            finalized: false,
            fail_begin: false,
            fail_write_at: None,
            writes: 0,
            log: log.clone(),
        }
    }

    pub fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    /// The write with this zero-based index fails with an I/O error.
    pub fn failing_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }
}

impl ContainerWriter for StubWriter {
    fn format(&self) -> &ContainerFormat {
        &self.format
    }

    fn begin(&mut self, _descriptor: &StreamDescriptor) -> Result<(), RecorderError> {
        if self.fail_begin {
            return Err(RecorderError::OutputOpen {
                path: "/nowhere/out.mp4".into(),
                reason: "permission denied".into(),
            });
        }
        if self.begun {
            return Err(RecorderError::InvalidState("begin twice".into()));
        }
        self.begun = true;
        self.log.lock().unwrap().push(Event::Begin);
        Ok(())
    }

    fn stream_time_base(&self) -> Option<Rational> {
        self.begun.then(|| Rational::new(1, 24))
    }

    fn write(&mut self, packet: EncodedPacket) -> Result<(), RecorderError> {
        if !self.begun || self.finalized {
            return Err(RecorderError::InvalidState("write outside begin/finalize".into()));
        }
        if self.fail_write_at == Some(self.writes) {
            return Err(RecorderError::Io("disk full".into()));
        }
        self.writes += 1;
        self.log.lock().unwrap().push(Event::Write {
            pts: packet.pts,
            dts: packet.dts,
        });
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), RecorderError> {
        if self.begun && !self.finalized {
            self.finalized = true;
            self.log.lock().unwrap().push(Event::Finalize);
        }
        Ok(())
    }
}
