use std::collections::HashMap;

/// Summary of one completed round.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub round: u32,
    pub searches_issued: u32,
    pub datapoints_created: u32,
    pub results_evaluated: u32,
    pub results_rejected: u32,
    /// Mean effectiveness across this round's attempts. An all-failed
    /// round scores 0.0, never "no data".
    pub effectiveness: f32,
}

/// Cumulative round history for one session. The satisfaction policy reads
/// this; the strategy generator reads the endpoint usage counts.
#[derive(Debug, Default)]
pub struct RoundLedger {
    rounds: Vec<RoundRecord>,
    endpoint_usage: HashMap<String, u32>,
    total_searches: u32,
    total_datapoints: u32,
    consecutive_zero_rounds: u32,
}

impl RoundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one issued search against an endpoint. Called per executed
    /// search, not per proposal — dropped proposals don't consume usage.
    pub fn note_search(&mut self, endpoint: &str) {
        *self.endpoint_usage.entry(endpoint.to_string()).or_insert(0) += 1;
        self.total_searches += 1;
    }

    pub fn record_round(&mut self, record: RoundRecord) {
        if record.datapoints_created == 0 {
            self.consecutive_zero_rounds += 1;
        } else {
            self.consecutive_zero_rounds = 0;
        }
        self.total_datapoints += record.datapoints_created;
        self.rounds.push(record);
    }

    pub fn usage(&self, endpoint: &str) -> u32 {
        self.endpoint_usage.get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_searches(&self) -> u32 {
        self.total_searches
    }

    pub fn total_datapoints(&self) -> u32 {
        self.total_datapoints
    }

    pub fn consecutive_zero_rounds(&self) -> u32 {
        self.consecutive_zero_rounds
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    pub fn last_round(&self) -> Option<&RoundRecord> {
        self.rounds.last()
    }
}
