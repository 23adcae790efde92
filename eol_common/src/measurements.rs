//! Ordered temperature × position force matrix.
//!
//! Keys are raw floats compared by exact bit pattern; iteration order is the
//! insertion order, which the orchestrator drives from the configuration
//! lists. The matrix is tiny (single-digit keys per level), so entries live
//! in Vecs and lookups are linear scans.

use serde::{Deserialize, Serialize};

/// Float key compared and hashed by exact bit pattern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedF64(f64);

impl OrderedF64 {
    /// Wrap a raw float.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// The wrapped value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for OrderedF64 {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedF64 {}

impl std::hash::Hash for OrderedF64 {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f64> for OrderedF64 {
    #[inline]
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// One stroke position with its force samples.
///
/// During collection with `repeat_count > 1` the sample vector grows one
/// entry per sweep; [`TestMeasurements::aggregate_mean`] collapses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PositionEntry {
    position: OrderedF64,
    samples: Vec<f64>,
}

/// One measurement temperature with its position entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TemperatureEntry {
    temperature: OrderedF64,
    positions: Vec<PositionEntry>,
}

/// Collection of force measurements keyed by temperature then position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestMeasurements {
    entries: Vec<TemperatureEntry>,
}

impl TestMeasurements {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a force sample at `(temperature, position)`.
    ///
    /// New keys are appended in call order; an existing slot accumulates an
    /// additional sample (repeat sweeps).
    pub fn record(&mut self, temperature: f64, position: f64, force: f64) {
        let temperature = OrderedF64::new(temperature);
        let position = OrderedF64::new(position);

        let temp_entry = match self
            .entries
            .iter_mut()
            .position(|e| e.temperature == temperature)
        {
            Some(idx) => &mut self.entries[idx],
            None => {
                self.entries.push(TemperatureEntry {
                    temperature,
                    positions: Vec::new(),
                });
                self.entries.last_mut().expect("just pushed")
            }
        };

        match temp_entry
            .positions
            .iter_mut()
            .find(|p| p.position == position)
        {
            Some(entry) => entry.samples.push(force),
            None => temp_entry.positions.push(PositionEntry {
                position,
                samples: vec![force],
            }),
        }
    }

    /// Temperatures in insertion order.
    pub fn temperatures(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.temperature.value()).collect()
    }

    /// Positions recorded under `temperature`, in insertion order.
    pub fn positions_at(&self, temperature: f64) -> Option<Vec<f64>> {
        let key = OrderedF64::new(temperature);
        self.entries
            .iter()
            .find(|e| e.temperature == key)
            .map(|e| e.positions.iter().map(|p| p.position.value()).collect())
    }

    /// Raw samples stored at `(temperature, position)`.
    pub fn samples_at(&self, temperature: f64, position: f64) -> Option<&[f64]> {
        let temp_key = OrderedF64::new(temperature);
        let pos_key = OrderedF64::new(position);
        self.entries
            .iter()
            .find(|e| e.temperature == temp_key)?
            .positions
            .iter()
            .find(|p| p.position == pos_key)
            .map(|p| p.samples.as_slice())
    }

    /// Arithmetic mean of the samples at `(temperature, position)`.
    pub fn force_at(&self, temperature: f64, position: f64) -> Option<f64> {
        let samples = self.samples_at(temperature, position)?;
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Number of `(temperature, position)` slots recorded.
    pub fn slot_count(&self) -> usize {
        self.entries.iter().map(|e| e.positions.len()).sum()
    }

    /// True when no slot has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collapse every sample vector to its arithmetic mean.
    ///
    /// Key order is untouched. A no-op for slots that already hold a single
    /// sample.
    pub fn aggregate_mean(&mut self) {
        for temp_entry in &mut self.entries {
            for pos_entry in &mut temp_entry.positions {
                if pos_entry.samples.len() > 1 {
                    let mean =
                        pos_entry.samples.iter().sum::<f64>() / pos_entry.samples.len() as f64;
                    pos_entry.samples = vec![mean];
                }
            }
        }
    }

    /// Visit every slot as `(temperature, position, samples)` in canonical
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, &[f64])> {
        self.entries.iter().flat_map(|e| {
            e.positions.iter().map(move |p| {
                (
                    e.temperature.value(),
                    p.position.value(),
                    p.samples.as_slice(),
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_preserved() {
        let mut m = TestMeasurements::new();
        m.record(66.0, 200.0, 1.0);
        m.record(38.0, 100.0, 2.0);
        m.record(38.0, 200.0, 3.0);
        m.record(52.0, 100.0, 4.0);

        assert_eq!(m.temperatures(), vec![66.0, 38.0, 52.0]);
        assert_eq!(m.positions_at(38.0), Some(vec![100.0, 200.0]));
        assert_eq!(m.slot_count(), 4);
    }

    #[test]
    fn bit_pattern_keys_distinguish_signed_zero() {
        let mut m = TestMeasurements::new();
        m.record(0.0, 1.0, 5.0);
        m.record(-0.0, 1.0, 7.0);

        assert_eq!(m.temperatures().len(), 2);
        assert_eq!(m.force_at(0.0, 1.0), Some(5.0));
        assert_eq!(m.force_at(-0.0, 1.0), Some(7.0));
    }

    #[test]
    fn repeat_samples_accumulate_and_average() {
        let mut m = TestMeasurements::new();
        m.record(52.0, 170_000.0, 10.0);
        m.record(52.0, 170_000.0, 11.0);

        assert_eq!(m.samples_at(52.0, 170_000.0), Some(&[10.0, 11.0][..]));
        assert_eq!(m.force_at(52.0, 170_000.0), Some(10.5));
        assert_eq!(m.slot_count(), 1);

        m.aggregate_mean();
        assert_eq!(m.samples_at(52.0, 170_000.0), Some(&[10.5][..]));
        assert_eq!(m.force_at(52.0, 170_000.0), Some(10.5));
    }

    #[test]
    fn aggregate_is_noop_for_single_samples() {
        let mut m = TestMeasurements::new();
        m.record(38.0, 100.0, 1.5);
        m.aggregate_mean();
        assert_eq!(m.samples_at(38.0, 100.0), Some(&[1.5][..]));
    }

    #[test]
    fn missing_slot_is_none() {
        let m = TestMeasurements::new();
        assert!(m.is_empty());
        assert_eq!(m.force_at(38.0, 100.0), None);
        assert_eq!(m.positions_at(38.0), None);
    }

    #[test]
    fn iter_walks_canonical_order() {
        let mut m = TestMeasurements::new();
        m.record(38.0, 100.0, 1.0);
        m.record(38.0, 200.0, 2.0);
        m.record(52.0, 100.0, 3.0);

        let flat: Vec<(f64, f64)> = m.iter().map(|(t, p, _)| (t, p)).collect();
        assert_eq!(flat, vec![(38.0, 100.0), (38.0, 200.0), (52.0, 100.0)]);
    }
}
