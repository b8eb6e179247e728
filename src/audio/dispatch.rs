use crossbeam_channel::{Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Downmix interleaved input to mono while applying the provided converter, so
/// the capture path sees one channel regardless of the microphone layout.
pub(crate) fn append_downmixed_samples<T, F>(
    buf: &mut Vec<f32>,
    data: &[T],
    channels: usize,
    mut convert: F,
) where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(acc / count as f32);
    }
}

/// Cuts the device callback stream into fixed-size mono frames and hands them
/// to whichever capture node is attached. Without a sink, samples are dropped.
pub(crate) struct FrameDispatcher {
    frame_samples: usize,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    sink: Option<Sender<Vec<f32>>>,
    dropped: Arc<AtomicUsize>,
}

impl FrameDispatcher {
    pub(crate) fn new(dropped: Arc<AtomicUsize>) -> Self {
        Self {
            frame_samples: 1,
            pending: Vec::new(),
            scratch: Vec::new(),
            sink: None,
            dropped,
        }
    }

    pub(crate) fn attach(&mut self, frame_samples: usize, sink: Sender<Vec<f32>>) {
        self.frame_samples = frame_samples.max(1);
        self.pending = Vec::with_capacity(self.frame_samples);
        self.sink = Some(sink);
    }

    /// Returns false when nothing was attached.
    pub(crate) fn detach(&mut self) -> bool {
        self.pending.clear();
        self.sink.take().is_some()
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Forget a partially filled frame so muted and unmuted audio never share a block.
    pub(crate) fn discard_pending(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        self.scratch.clear();
        append_downmixed_samples(&mut self.scratch, data, channels, convert);
        self.pending.extend_from_slice(&self.scratch);

        let mut disconnected = false;
        while self.pending.len() >= self.frame_samples {
            let frame: Vec<f32> = self.pending.drain(..self.frame_samples).collect();
            match sink.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            self.detach();
        }
    }
}
