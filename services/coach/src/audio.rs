use crate::config::{INPUT_CHUNK_SIZE, OUTPUT_CHUNK_SIZE, OUTPUT_LATENCY_MS};
use crate::device;
use coach_core::capture::MicGate;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapProd, HeapRb};
use rubato::{FastFixedIn, PolynomialDegree};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits samples into fixed-size chunks, zero-padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Encodes f32 samples as little-endian PCM16 bytes.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect()
}

/// Decodes little-endian PCM16 bytes into normalized f32 samples.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / 32768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Accumulates resampled samples and hands them out in fixed-duration
/// frames, so the transcription stream sees a steady chunk cadence instead
/// of one tiny send per device callback.
pub struct FrameBatcher {
    buf: Vec<f32>,
    frame_size: usize,
}

impl FrameBatcher {
    pub fn new(frame_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(frame_size * 2),
            frame_size,
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.buf.extend_from_slice(samples);
    }

    /// The next full frame, if one has accumulated.
    pub fn next_frame(&mut self) -> Option<Vec<f32>> {
        if self.buf.len() < self.frame_size {
            return None;
        }
        Some(self.buf.drain(..self.frame_size).collect())
    }

    /// Whatever is left, unpadded. Used once at stream shutdown.
    pub fn drain_remainder(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.buf)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no usable capture device: {0}")]
    DeviceUnavailable(String),
    #[error("capture device has no name: {0}")]
    Name(#[from] cpal::DeviceNameError),
    #[error("device has no usable configuration: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build capture stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start capture stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// A live microphone capture. The device stays open until `release`, and
/// capture stops when the handle is dropped either way.
pub struct CaptureHandle {
    stream: Option<cpal::Stream>,
    pub sample_rate: f64,
}

impl CaptureHandle {
    /// Stop capturing and close the device. Safe to call more than once.
    pub fn release(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("capture device released");
        }
    }
}

/// Open the capture device and start streaming gated mono audio.
///
/// The device stays open for the whole session. The gate scales every chunk
/// inside the callback, so a muted microphone still produces (zeroed)
/// chunks and unmuting takes effect on the very next buffer.
pub fn open_input(
    device_name: Option<String>,
    mic: Arc<MicGate>,
) -> Result<(CaptureHandle, tokio::sync::mpsc::Receiver<Vec<f32>>), CaptureError> {
    let input = device::get_or_default_input(device_name)
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
    let name = input.name()?;

    let default_config = input.default_input_config()?;
    let input_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let channel_count = input_config.channels as usize;
    let sample_rate = input_config.sample_rate.0 as f64;
    tracing::info!("input: device={:?}, config={:?}", name, &input_config);

    let (tx, rx) = tokio::sync::mpsc::channel::<Vec<f32>>(1024);

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        // Downmix to mono, then apply the gate gain in place.
        let mut audio = if channel_count > 1 {
            data.chunks(channel_count)
                .map(|c| c.iter().sum::<f32>() / channel_count as f32)
                .collect::<Vec<f32>>()
        } else {
            data.to_vec()
        };
        mic.apply(&mut audio);
        if let Err(e) = tx.try_send(audio) {
            tracing::warn!("input feed full, dropping chunk: {:?}", e);
        }
    };

    let stream = input.build_input_stream(
        &input_config,
        input_data_fn,
        move |err| tracing::error!("an error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;

    Ok((
        CaptureHandle {
            stream: Some(stream),
            sample_rate,
        },
        rx,
    ))
}

/// Producer side of the playback ring buffer, handed to the synthesizer.
pub struct OutputSink {
    pub producer: HeapProd<f32>,
    pub sample_rate: f64,
    /// When set, the output callback discards buffered samples instead of
    /// playing them. This is how a cancelled utterance stops quickly even
    /// with a large playback buffer.
    pub flush: Arc<AtomicBool>,
}

/// Open the playback device and start draining the ring buffer into it.
pub fn open_output(device_name: Option<String>) -> anyhow::Result<(cpal::Stream, OutputSink)> {
    let output = device::get_or_default_output(device_name)?;
    let name = output.name()?;

    let default_config = output.default_output_config()?;
    let output_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let channel_count = output_config.channels as usize;
    let sample_rate = output_config.sample_rate.0 as f64;
    tracing::info!("output: device={:?}, config={:?}", name, &output_config);

    let buffer = HeapRb::<f32>::new(sample_rate as usize * OUTPUT_LATENCY_MS / 1000);
    let (producer, mut consumer) = buffer.split();

    let flush = Arc::new(AtomicBool::new(false));
    let flush_flag = flush.clone();

    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        if flush_flag.load(Ordering::Relaxed) {
            while consumer.try_pop().is_some() {}
        }
        let mut sample_index = 0;
        while sample_index < data.len() {
            let sample = consumer.try_pop().unwrap_or(0.0);

            // L channel (ch:0)
            data[sample_index] = sample;
            sample_index += 1;
            // R channel (ch:1)
            if channel_count > 1 && sample_index < data.len() {
                data[sample_index] = sample;
                sample_index += 1;
            }
            // ignore other channels
            sample_index += channel_count.saturating_sub(2);
        }
    };

    let stream = output.build_output_stream(
        &output_config,
        output_data_fn,
        move |err| tracing::error!("an error occurred on output stream: {}", err),
        None,
    )?;
    stream.play()?;

    Ok((
        stream,
        OutputSink {
            producer,
            sample_rate,
            flush,
        },
    ))
}
