use std::fmt;

#[allow(unused_imports)]
use crate::Avl;

const MAX_DEPTH: usize = 256;

/// Depth calculates minimum, maximum, average and percentile of leaf
/// depths in the [`Avl`] tree. A leaf depth is sampled at every absent
/// child, so a tree with `n` entries yields `n + 1` samples.
#[derive(Clone, Debug)]
pub struct Depth {
    samples: usize,
    min: usize,
    max: usize,
    total: usize,
    depths: [u64; MAX_DEPTH],
}

impl Depth {
    pub(crate) fn new() -> Depth {
        Default::default()
    }

    pub(crate) fn sample(&mut self, depth: usize) {
        self.samples += 1;
        self.total += depth;
        if self.samples == 1 || depth < self.min {
            self.min = depth
        }
        if depth > self.max {
            self.max = depth
        }
        self.depths[depth.min(MAX_DEPTH - 1)] += 1;
    }

    /// Return number of leaf depths sampled in [`Avl`] instance.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Return minimum depth of leaf in [`Avl`] instance.
    pub fn min(&self) -> usize {
        self.min
    }

    /// Return maximum depth of leaf in [`Avl`] instance.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Return the average depth of leaves in [`Avl`] instance.
    pub fn mean(&self) -> usize {
        if self.samples == 0 {
            0
        } else {
            self.total / self.samples
        }
    }

    /// Return depth as tuple of percentiles, each tuple provides
    /// (percentile, depth). Returned percentiles from 90, 91 .. 99
    pub fn percentiles(&self) -> Vec<(u8, usize)> {
        let mut percentiles: Vec<(u8, usize)> = vec![];
        let (mut acc, mut prev_perc) = (0_u64, 90_u8);
        let iter = self.depths.iter().enumerate().filter(|(_, &item)| item > 0);
        for (depth, samples) in iter {
            acc += *samples;
            let perc = ((acc as f64 / self.samples as f64) * 100_f64) as u8;
            if perc >= prev_perc {
                percentiles.push((perc, depth));
                prev_perc = perc;
            }
        }
        percentiles
    }

    /// Convert depth statistics to JSON format, useful for plotting.
    pub fn json(&self) -> String {
        let ps: Vec<String> = self
            .percentiles()
            .into_iter()
            .map(|(p, d)| format!("{}: {}", p, d))
            .collect();
        let strs = [
            format!("min: {}", self.min),
            format!("mean: {}", self.mean()),
            format!("max: {}", self.max),
            format!("percentiles: {{ {} }}", ps.join(", ")),
        ];
        "{ ".to_string() + strs.join(", ").as_str() + " }"
    }
}

/// Human readable depth statistics, useful in logs.
impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (min, mean, max) = (self.min, self.mean(), self.max);
        writeln!(f, "depth (min, avg, max): {:?}", (min, mean, max))?;
        for (perc, depth) in self.percentiles().into_iter() {
            writeln!(f, "  {} percentile = {}", perc, depth)?;
        }
        Ok(())
    }
}

impl Default for Depth {
    fn default() -> Self {
        Depth {
            samples: 0,
            min: 0,
            max: 0,
            total: 0,
            depths: [0; MAX_DEPTH],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_depth_sample() {
        let mut depth = Depth::new();
        assert_eq!(depth.samples(), 0);
        assert_eq!(depth.mean(), 0);

        for d in [2, 3, 3, 4].iter() {
            depth.sample(*d);
        }
        assert_eq!(depth.samples(), 4);
        assert_eq!(depth.min(), 2);
        assert_eq!(depth.max(), 4);
        assert_eq!(depth.mean(), 3);
        assert_eq!(depth.percentiles(), vec![(100, 4)]);
        assert_eq!(
            depth.json(),
            "{ min: 2, mean: 3, max: 4, percentiles: { 100: 4 } }".to_string()
        );
    }
}
