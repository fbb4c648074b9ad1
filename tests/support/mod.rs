#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Duration;

use framefx::{
    CompositeFrame, DisplayTransform, EncodeFailure, EncodedSample, Encoder, EncoderEvent,
    FrameSource, FramefxError, FramefxResult, Mask, MediaTime, PipelineEvent, PipelineHandle,
    QualityLevel, RawFrame, RunReport, SegmentationEngine, SourceStatus, TargetEncoding,
    VideoDescriptor,
};

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

/// `frames` frames of 1/30 s at `WIDTH x HEIGHT`.
pub fn descriptor(frames: i64) -> VideoDescriptor {
    VideoDescriptor {
        width: WIDTH,
        height: HEIGHT,
        duration: MediaTime::new(frames, 30).unwrap(),
        frame_duration: MediaTime::new(1, 30).unwrap(),
        transform: DisplayTransform::default(),
    }
}

/// Luma of frame `index`; every frame is a distinct neutral gray.
pub fn luma_for(index: u64) -> u8 {
    (16 + (index * 7) % 219) as u8
}

/// Composite red channel of frame `index` after color conversion.
pub fn gray_for(index: u64) -> u8 {
    framefx::render::color::ycbcr8_to_rgb8(luma_for(index), 128, 128, TargetEncoding::Srgb)[0]
}

/// Source producing solid gray frames with uniform 1/30 s timestamps.
pub struct SyntheticSource {
    desc: VideoDescriptor,
    total: u64,
    next: u64,
    status: SourceStatus,
    cancel_after: Option<u64>,
    fail_after: Option<u64>,
    fail_start: bool,
    read_delay: Duration,
    reads: Arc<AtomicU64>,
}

impl SyntheticSource {
    pub fn new(frames: u64) -> Self {
        Self {
            desc: descriptor(frames as i64),
            total: frames,
            next: 0,
            status: SourceStatus::Unknown,
            cancel_after: None,
            fail_after: None,
            fail_start: false,
            read_delay: Duration::ZERO,
            reads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Report `Cancelled` once `n` frames were delivered.
    pub fn cancelled_after(mut self, n: u64) -> Self {
        self.cancel_after = Some(n);
        self
    }

    /// Report `Failed` once `n` frames were delivered.
    pub fn failing_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Refuse to start reading.
    pub fn failing_to_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Sleep before every read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Counter of frames delivered.
    pub fn reads(&self) -> Arc<AtomicU64> {
        self.reads.clone()
    }
}

impl FrameSource for SyntheticSource {
    fn descriptor(&self) -> VideoDescriptor {
        self.desc
    }

    fn start_reading(&mut self) -> FramefxResult<()> {
        if self.fail_start {
            return Err(FramefxError::validation("synthetic reader refused to start"));
        }
        self.status = SourceStatus::Reading;
        Ok(())
    }

    fn read_next(&mut self, frame: &mut RawFrame) -> bool {
        if self.status != SourceStatus::Reading {
            return false;
        }
        if self.cancel_after == Some(self.next) {
            self.status = SourceStatus::Cancelled;
            return false;
        }
        if self.fail_after == Some(self.next) {
            self.status = SourceStatus::Failed("synthetic decode error".to_owned());
            return false;
        }
        if self.next == self.total {
            self.status = SourceStatus::Completed;
            return false;
        }
        std::thread::sleep(self.read_delay);

        frame.ensure_size(self.desc.width, self.desc.height);
        frame.fill_solid(luma_for(self.next), 128, 128);
        frame.pts = MediaTime::new(self.next as i64, 30).unwrap();
        frame.duration = self.desc.frame_duration;
        self.next += 1;
        self.reads.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn status(&self) -> SourceStatus {
        self.status.clone()
    }

    fn cancel(&mut self) {
        self.status = SourceStatus::Cancelled;
    }
}

/// Segmentation engine marking everything foreground, with an optional gap.
pub struct ScriptedSegmenter {
    missing_at: Option<u64>,
    next: u64,
}

impl ScriptedSegmenter {
    pub fn all_foreground() -> Self {
        Self {
            missing_at: None,
            next: 0,
        }
    }

    /// Produce no mask for the frame with zero-based index `index`.
    pub fn missing_at(index: u64) -> Self {
        Self {
            missing_at: Some(index),
            next: 0,
        }
    }
}

impl SegmentationEngine for ScriptedSegmenter {
    fn segment(
        &mut self,
        _frame: &RawFrame,
        _quality: QualityLevel,
        mask: &mut Mask,
    ) -> FramefxResult<bool> {
        let index = self.next;
        self.next += 1;
        if self.missing_at == Some(index) {
            return Ok(false);
        }
        mask.as_mut_slice().fill(1.0);
        Ok(true)
    }
}

enum Job {
    Frame {
        seq: u64,
        frame: CompositeFrame,
        pts: MediaTime,
        duration: MediaTime,
    },
    Flush,
}

/// Encoder that answers on a worker thread, in batches, last submission first.
///
/// Samples carry the first pixel of the composite as read at encode time, so a buffer reused
/// before its release shows up as a wrong value.
pub struct DelayedEncoder {
    batch: usize,
    delay: Duration,
    fail_seq: Option<u64>,
    jobs: Option<Sender<Job>>,
    worker: Option<std::thread::JoinHandle<()>>,
    invalidations: Arc<AtomicUsize>,
}

impl DelayedEncoder {
    pub fn new(batch: usize, delay: Duration) -> Self {
        Self {
            batch: batch.max(1),
            delay,
            fail_seq: None,
            jobs: None,
            worker: None,
            invalidations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer `seq` with an encode failure.
    pub fn failing_at(mut self, seq: u64) -> Self {
        self.fail_seq = Some(seq);
        self
    }

    pub fn invalidations(&self) -> Arc<AtomicUsize> {
        self.invalidations.clone()
    }
}

impl Encoder for DelayedEncoder {
    fn begin(&mut self, _desc: &VideoDescriptor, events: Sender<EncoderEvent>) -> FramefxResult<()> {
        let (tx, rx) = mpsc::channel::<Job>();
        let (batch, delay, fail_seq) = (self.batch, self.delay, self.fail_seq);
        self.worker = Some(std::thread::spawn(move || {
            let mut pending = Vec::new();
            loop {
                let drain = match rx.recv_timeout(Duration::from_millis(5)) {
                    Ok(Job::Frame {
                        seq,
                        frame,
                        pts,
                        duration,
                    }) => {
                        pending.push((seq, frame, pts, duration));
                        pending.len() >= batch
                    }
                    Ok(Job::Flush) | Err(RecvTimeoutError::Timeout) => true,
                    Err(RecvTimeoutError::Disconnected) => return,
                };
                if !drain {
                    continue;
                }
                while let Some((seq, frame, pts, duration)) = pending.pop() {
                    std::thread::sleep(delay);
                    let result = if fail_seq == Some(seq) {
                        Err(EncodeFailure {
                            status: 7,
                            detail: "synthetic encode failure".to_owned(),
                        })
                    } else {
                        Ok(EncodedSample {
                            data: frame.data[..3].to_vec(),
                            pts,
                            duration,
                            is_keyframe: seq == 0,
                        })
                    };
                    if events.send(EncoderEvent::Encoded { seq, result }).is_err()
                        || events.send(EncoderEvent::FrameReleased(frame)).is_err()
                    {
                        return;
                    }
                }
            }
        }));
        self.jobs = Some(tx);
        Ok(())
    }

    fn submit(
        &mut self,
        seq: u64,
        frame: CompositeFrame,
        pts: MediaTime,
        duration: MediaTime,
    ) -> FramefxResult<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| FramefxError::encode("encoder not started"))?;
        jobs.send(Job::Frame {
            seq,
            frame,
            pts,
            duration,
        })
        .map_err(|_| FramefxError::encode("encoder worker stopped"))
    }

    fn flush(&mut self) -> FramefxResult<()> {
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(Job::Flush);
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        drop(self.jobs.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Drain every event, then join.
pub fn collect(handle: PipelineHandle) -> (Vec<PipelineEvent>, RunReport) {
    let mut events = Vec::new();
    let report = handle.wait_with(|e| events.push(e.clone()));
    (events, report)
}

pub fn progress_values(events: &[PipelineEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Progress(p) => Some(p.progress),
            _ => None,
        })
        .collect()
}

pub fn terminal_events(events: &[PipelineEvent]) -> Vec<&PipelineEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}
