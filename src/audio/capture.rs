//! Outbound audio path: device frames in, fixed-size PCM chunks out.
//!
//! The microphone track pushes device-rate mono frames into a bounded channel;
//! the session loop drains that channel through the [`CaptureNode`], which
//! streams every frame through one resampler onto the input clock and encodes
//! each full block as 16-bit PCM. Chunks are back-to-back slices of one
//! continuous signal; a device frame normally yields exactly one of them.

use super::meter::LiveMeter;
use super::pcm::encode_pcm16;
use super::resample::StreamResampler;
use crate::channel::MediaChunk;
use crate::error::ResourceReleaseError;
use crate::media::AudioTrack;
use crate::log_debug;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::time::Instant;

/// The fixed-rate input clock outbound audio is normalised to.
#[derive(Debug)]
pub struct InputContext {
    sample_rate: u32,
    block_samples: usize,
    closed: bool,
}

impl InputContext {
    pub fn new(sample_rate: u32, block_samples: usize) -> Self {
        Self {
            sample_rate,
            block_samples: block_samples.max(1),
            closed: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_samples(&self) -> usize {
        self.block_samples
    }

    /// How many device-rate samples cover one block on the input clock.
    pub fn device_block_samples(&self, device_rate: u32) -> usize {
        let scaled = self.block_samples as u64 * u64::from(device_rate);
        scaled.div_ceil(u64::from(self.sample_rate.max(1))).max(1) as usize
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) -> Result<(), ResourceReleaseError> {
        if self.closed {
            return Err(ResourceReleaseError::AlreadyReleased("input context"));
        }
        self.closed = true;
        Ok(())
    }
}

/// Connection between a live audio track and the outbound chunk stream.
pub struct CaptureNode {
    receiver: Receiver<Vec<f32>>,
    resampler: StreamResampler,
    attached: bool,
    meter: LiveMeter,
    blocks: u64,
}

impl CaptureNode {
    pub fn attach(
        track: &mut dyn AudioTrack,
        context: &InputContext,
        capacity: usize,
        meter: LiveMeter,
    ) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        let device_rate = track.sample_rate();
        track.connect(context.device_block_samples(device_rate), sender);
        let resampler = StreamResampler::new(device_rate, context.sample_rate());
        if device_rate != context.sample_rate() {
            log_debug(&format!(
                "capture resampling {device_rate}Hz -> {}Hz (high quality: {})",
                context.sample_rate(),
                resampler.is_high_quality()
            ));
        }
        Self {
            receiver,
            resampler,
            attached: true,
            meter,
            blocks: 0,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Convert and encode every frame captured since the last call, in capture order.
    /// A closed input context yields nothing.
    pub fn drain(&mut self, context: &InputContext) -> Vec<MediaChunk> {
        let mut chunks = Vec::new();
        if !self.attached || context.is_closed() {
            return chunks;
        }
        let block_samples = context.block_samples();
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => {
                    self.resampler.push(&frame);
                    while let Some(block) = self.resampler.pop_block(block_samples) {
                        self.meter.update(&block);
                        self.blocks += 1;
                        chunks.push(MediaChunk::audio(
                            encode_pcm16(&block),
                            context.sample_rate(),
                            Instant::now(),
                        ));
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        chunks
    }

    pub fn disconnect(&mut self, track: &mut dyn AudioTrack) -> Result<(), ResourceReleaseError> {
        if !self.attached {
            return Err(ResourceReleaseError::AlreadyReleased("capture node"));
        }
        self.attached = false;
        track.disconnect();
        while self.receiver.try_recv().is_ok() {}
        self.meter.reset();
        Ok(())
    }
}
