/// One credit per character of assistant output.
pub fn debit_clamped(balance: u64, used: u64) -> u64 {
    balance.saturating_sub(used)
}

/// Per-session usage counter: total character count of all assistant
/// replies, greeting included. Written only by the dialogue controller,
/// read once by session teardown.
#[derive(Debug, Default)]
pub struct UsageMeter {
    chars: u64,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, reply: &str) {
        self.chars += reply.chars().count() as u64;
    }

    pub fn total(&self) -> u64 {
        self.chars
    }

    pub fn reset(&mut self) {
        self.chars = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_accumulates_reply_lengths() {
        let mut meter = UsageMeter::new();
        meter.record(&"a".repeat(12));
        meter.record(&"b".repeat(340));
        meter.record(&"c".repeat(58));
        assert_eq!(meter.total(), 410);

        meter.reset();
        assert_eq!(meter.total(), 0);
    }

    #[test]
    fn debit_is_exact_when_covered() {
        assert_eq!(debit_clamped(50_000, 410), 49_590);
    }

    #[test]
    fn debit_clamps_at_zero() {
        assert_eq!(debit_clamped(5, 100), 0);
        assert_eq!(debit_clamped(0, 1), 0);
    }
}
