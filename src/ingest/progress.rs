use tracing::info;

/// Run-wide counters with periodic log lines.
///
/// Both counters only grow. Every time one of them reaches a multiple of
/// `interval` a single line is logged; an interval of 0 disables output.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    label: String,
    noun: &'static str,
    interval: u64,
    imported: u64,
    retried: u64,
    emitted: u64,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, noun: &'static str, interval: u64) -> Self {
        Self {
            label: label.into(),
            noun,
            interval,
            imported: 0,
            retried: 0,
            emitted: 0,
        }
    }

    /// Counts without logging anything.
    pub fn silent() -> Self {
        Self::new("", "records", 0)
    }

    pub fn record_imported(&mut self) {
        self.imported += 1;
        if self.crossed(self.imported) {
            self.emitted += 1;
            info!(
                target = "progress",
                file = %self.label,
                imported = self.imported,
                "{}: imported {} {}...",
                self.label,
                self.imported,
                self.noun
            );
        }
    }

    pub fn record_retried(&mut self) {
        self.retried += 1;
        if self.crossed(self.retried) {
            self.emitted += 1;
            info!(
                target = "progress",
                file = %self.label,
                retried = self.retried,
                "{}: retried {} {}...",
                self.label,
                self.retried,
                self.noun
            );
        }
    }

    fn crossed(&self, counter: u64) -> bool {
        self.interval > 0 && counter % self.interval == 0
    }

    pub fn imported(&self) -> u64 {
        self.imported
    }

    pub fn retried(&self) -> u64 {
        self.retried
    }

    /// Number of progress lines written so far.
    pub fn lines_emitted(&self) -> u64 {
        self.emitted
    }
}
