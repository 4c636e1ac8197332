use std::{collections::BTreeMap, fs, io, path::Path};

use machine_learning::evaluation::Metrics;
use serde::{Deserialize, Serialize};

/// What happened during a committed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// The clients whose updates got aggregated, in index order.
    pub clients: Vec<usize>,
    pub excluded: usize,
    /// The mean over the aggregated clients of their mean local batch loss.
    pub train_loss: Option<f32>,
    #[serde(flatten)]
    pub metrics: Option<Metrics>,
    pub payload_bits: usize,
}

/// The records of a run keyed by round index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    rounds: BTreeMap<usize, RoundRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, round: usize, record: RoundRecord) {
        self.rounds.insert(round, record);
    }

    pub fn get(&self, round: usize) -> Option<&RoundRecord> {
        self.rounds.get(&round)
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &RoundRecord)> {
        self.rounds.iter().map(|(&round, record)| (round, record))
    }

    /// Writes the history as a JSON object ordered by round.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_ordered_by_round() {
        let mut history = History::new();
        for round in [2, 0, 1] {
            history.record(
                round,
                RoundRecord {
                    clients: vec![0, 1],
                    excluded: 0,
                    train_loss: Some(0.5),
                    metrics: Some(Metrics {
                        loss: 0.25,
                        accuracy: Some(0.75),
                    }),
                    payload_bits: 64,
                },
            );
        }

        let json = serde_json::to_value(&history).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["0", "1", "2"]);
        assert_eq!(json["1"]["accuracy"], 0.75);
        assert_eq!(json["1"]["loss"], 0.25);

        let back: History = serde_json::from_value(json).unwrap();
        assert_eq!(back, history);
    }
}
