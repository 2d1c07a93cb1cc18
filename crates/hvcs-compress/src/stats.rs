/// Sizes before and after compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompressionStats {
    pub original: u64,
    pub compressed: u64,
}

impl CompressionStats {
    pub fn new(original: u64, compressed: u64) -> Self {
        Self { original, compressed }
    }

    /// `original / compressed`, or `0.0` when nothing was written.
    pub fn ratio(&self) -> f64 {
        if self.compressed == 0 {
            return 0.0;
        }
        self.original as f64 / self.compressed as f64
    }

    /// Bytes saved and the percentage of the original they represent.
    ///
    /// Negative when compression expanded the payload.
    pub fn savings(&self) -> (i64, f64) {
        let saved = self.original as i64 - self.compressed as i64;
        let pct = if self.original > 0 {
            saved as f64 / self.original as f64 * 100.0
        } else {
            0.0
        };
        (saved, pct)
    }

    /// Accumulate another measurement.
    pub fn add(&mut self, other: CompressionStats) {
        self.original += other.original;
        self.compressed += other.compressed;
    }
}
