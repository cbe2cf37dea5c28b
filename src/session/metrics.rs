use std::time::Duration;

use crate::scan::Observation;

/// Counters collected by one run of the frame pump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpMetrics {
    pub frames_analyzed: u64,
    pub frames_with_hands: u64,
    pub analysis_failures: u64,
    /// Analyses dropped mid-flight because the session was stopped.
    pub analyses_abandoned: u64,
    /// Results that completed after cancellation and were not applied.
    pub late_results_discarded: u64,
    pub total_analysis_duration_us: u64,
    pub max_analysis_duration_us: u64,
}

impl PumpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_analysis(&mut self, duration: Duration, observation: Observation) {
        let duration_us = duration.as_micros() as u64;
        self.frames_analyzed += 1;
        self.total_analysis_duration_us += duration_us;
        self.max_analysis_duration_us = self.max_analysis_duration_us.max(duration_us);
        match observation {
            Observation::AnalysisFailed => self.analysis_failures += 1,
            other if other.has_hand() => self.frames_with_hands += 1,
            _ => {}
        }
    }

    pub fn average_analysis_us(&self) -> u64 {
        self.total_analysis_duration_us
            .checked_div(self.frames_analyzed)
            .unwrap_or(0)
    }
}
