use compression::EncodedWeightSet;
use machine_learning::WeightSet;

/// The weights a client sends back, as they travel over the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    Raw(WeightSet),
    Encoded(EncodedWeightSet),
}

impl UpdatePayload {
    /// Returns the size of the payload in bits.
    pub fn payload_bits(&self) -> usize {
        match self {
            UpdatePayload::Raw(weights) => weights.num_params() * 8 * size_of::<f32>(),
            UpdatePayload::Encoded(encoded) => encoded.payload_bits(),
        }
    }
}

/// The outcome of a client's round, owned by the server once returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientUpdate {
    pub client: usize,
    pub round: usize,
    pub samples: usize,
    pub payload: UpdatePayload,
    pub losses: Vec<f32>,
}

impl ClientUpdate {
    /// The mean of the batch losses, `None` if no batch ran.
    pub fn mean_loss(&self) -> Option<f32> {
        if self.losses.is_empty() {
            return None;
        }

        Some(self.losses.iter().sum::<f32>() / self.losses.len() as f32)
    }
}
