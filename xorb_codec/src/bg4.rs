//! BG4 byte grouping: a 4-way byte deinterleave applied before LZ4 to improve
//! compression of structured data.
//!
//! For `n` bytes with `split = n / 4` and `rem = n % 4`, the grouped form has
//! four segments of sizes `split + (rem >= 1)`, `split + (rem >= 2)`,
//! `split + (rem == 3)`, `split`. Ungrouped position `i` maps to segment
//! `i % 4` at index `i / 4`.

/// The byte offsets of the four segments within a grouped buffer of length `n`,
/// plus the total length as a final sentinel.
fn segment_starts(n: usize) -> [usize; 5] {
    let split = n / 4;
    let rem = n % 4;

    let len0 = split + usize::from(rem >= 1);
    let len1 = split + usize::from(rem >= 2);
    let len2 = split + usize::from(rem == 3);

    let s1 = len0;
    let s2 = s1 + len1;
    let s3 = s2 + len2;
    [0, s1, s2, s3, n]
}

/// Forward transform: deinterleave `data` into four planes.
pub fn split(data: &[u8]) -> Vec<u8> {
    let starts = segment_starts(data.len());
    let mut out = vec![0u8; data.len()];

    for (i, &b) in data.iter().enumerate() {
        out[starts[i % 4] + i / 4] = b;
    }
    out
}

/// Inverse transform: regroup four planes back into the original byte order.
pub fn regroup(grouped: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; grouped.len()];
    regroup_into(grouped, &mut out);
    out
}

/// Regroup into a caller-provided buffer of the same length.
pub fn regroup_into(grouped: &[u8], out: &mut [u8]) {
    debug_assert_eq!(grouped.len(), out.len());
    let starts = segment_starts(grouped.len());

    for (i, slot) in out.iter_mut().enumerate() {
        *slot = grouped[starts[i % 4] + i / 4];
    }
}
