//! Symbol-frequency tables.
//!
//! The histogram is the only statistic the strategy selector consults for
//! order-0 decisions. Symbols are kept sorted so the alphabet order, and with it
//! every symbol index written to a frame, is deterministic.

use hashbrown::HashMap;

use crate::kernels::leb128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    /// `(symbol, count)` pairs sorted by symbol. Counts are never zero.
    entries: Vec<(u64, u64)>,
    total: u64,
    largest_count: u64,
}

impl Histogram {
    pub fn build(values: &[u64]) -> Self {
        let mut entries: Vec<(u64, u64)> = if values.iter().all(|&v| v < 256) {
            let mut counts = [0u64; 256];
            for &v in values {
                counts[v as usize] += 1;
            }
            counts
                .iter()
                .enumerate()
                .filter(|(_, &c)| c > 0)
                .map(|(s, &c)| (s as u64, c))
                .collect()
        } else {
            let mut counts: HashMap<u64, u64> = HashMap::new();
            for &v in values {
                *counts.entry(v).or_insert(0) += 1;
            }
            counts.into_iter().collect()
        };
        entries.sort_unstable_by_key(|&(s, _)| s);
        let largest_count = entries.iter().map(|&(_, c)| c).max().unwrap_or(0);
        Self {
            entries,
            total: values.len() as u64,
            largest_count,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn cardinality(&self) -> usize {
        self.entries.len()
    }

    pub fn min_symbol(&self) -> Option<u64> {
        self.entries.first().map(|&(s, _)| s)
    }

    pub fn max_symbol(&self) -> Option<u64> {
        self.entries.last().map(|&(s, _)| s)
    }

    pub fn largest_count(&self) -> u64 {
        self.largest_count
    }

    pub fn entries(&self) -> &[(u64, u64)] {
        &self.entries
    }

    pub fn symbols(&self) -> Vec<u64> {
        self.entries.iter().map(|&(s, _)| s).collect()
    }

    pub fn counts(&self) -> Vec<u64> {
        self.entries.iter().map(|&(_, c)| c).collect()
    }

    /// Maps every value to its index in the sorted alphabet.
    ///
    /// Every value must have been counted by this histogram.
    pub fn symbol_indices(&self, values: &[u64]) -> Vec<u32> {
        let lookup: HashMap<u64, u32> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, &(s, _))| (s, i as u32))
            .collect();
        values
            .iter()
            .map(|v| lookup.get(v).copied().unwrap_or(0))
            .collect()
    }

    /// Empirical order-0 entropy of the whole stream, in bits.
    pub fn entropy_bits(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let total = self.total as f64;
        self.entries
            .iter()
            .map(|&(_, c)| {
                let c = c as f64;
                c * (total / c).log2()
            })
            .sum()
    }

    /// Exact serialized size of this histogram's alphabet (see `write_alphabet`).
    pub fn alphabet_cost(&self) -> usize {
        let mut cost = leb128::encoded_len(self.entries.len() as u64);
        let mut prev: Option<u64> = None;
        for &(s, _) in &self.entries {
            cost += leb128::encoded_len(match prev {
                None => s,
                Some(p) => s - p - 1,
            });
            prev = Some(s);
        }
        cost
    }
}
