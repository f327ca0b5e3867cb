/// Prefix sums of a per-interval count sequence
pub fn cumulative(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |total, count| {
            *total += count;
            Some(*total)
        })
        .collect()
}
