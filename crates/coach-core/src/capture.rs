use std::sync::atomic::{AtomicU32, Ordering};

/// Software gain gate between the capture device and the encoder feeding
/// the transcription stream.
///
/// The device stays open for the whole session; muting just zeroes the gain
/// applied to each chunk in the input callback, so unmute has near-zero
/// latency. Only the speech output gate flips this flag: muted for the whole
/// playback window plus a grace interval, unmuted otherwise.
#[derive(Debug)]
pub struct MicGate {
    gain_bits: AtomicU32,
}

impl MicGate {
    pub fn new() -> Self {
        Self {
            gain_bits: AtomicU32::new(1.0_f32.to_bits()),
        }
    }

    pub fn mute(&self) {
        self.gain_bits.store(0.0_f32.to_bits(), Ordering::Relaxed);
    }

    pub fn unmute(&self) {
        self.gain_bits.store(1.0_f32.to_bits(), Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.gain() == 0.0
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    /// Scale a chunk of samples in place. Called from the audio input
    /// callback, so it must stay allocation-free.
    pub fn apply(&self, samples: &mut [f32]) {
        let gain = self.gain();
        if gain == 1.0 {
            return;
        }
        for sample in samples {
            *sample *= gain;
        }
    }
}

impl Default for MicGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unmuted() {
        let gate = MicGate::new();
        assert!(!gate.is_muted());
        assert_eq!(gate.gain(), 1.0);
    }

    #[test]
    fn mute_silences_samples_without_reallocating() {
        let gate = MicGate::new();
        gate.mute();
        assert!(gate.is_muted());

        let mut chunk = vec![0.5_f32, -0.25, 1.0];
        gate.apply(&mut chunk);
        assert_eq!(chunk, vec![0.0, 0.0, 0.0]);

        gate.unmute();
        let mut chunk = vec![0.5_f32, -0.25];
        gate.apply(&mut chunk);
        assert_eq!(chunk, vec![0.5, -0.25]);
    }
}
