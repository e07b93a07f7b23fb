//! Multi-threaded host implementations.
//!
//! Both routines split the input into fixed-size chunks rather than letting
//! rayon pick split points, so the floating-point evaluation order (and
//! therefore the result) depends only on the input.

use rayon::prelude::*;

/// Elements handled by one rayon task.
pub const CHUNK: usize = 1 << 16;

pub fn reduce(values: &[f32]) -> f32 {
    let partials: Vec<f32> = values
        .par_chunks(CHUNK)
        .map(|chunk| chunk.iter().sum::<f32>())
        .collect();
    partials.iter().sum()
}

/// In-place inclusive prefix sum.
pub fn scan_inclusive(values: &mut [f32]) {
    let chunk_sums: Vec<f32> = values
        .par_chunks(CHUNK)
        .map(|chunk| chunk.iter().sum::<f32>())
        .collect();

    let mut offsets = Vec::with_capacity(chunk_sums.len());
    let mut carry = 0.0f32;
    for sum in chunk_sums {
        offsets.push(carry);
        carry += sum;
    }

    values
        .par_chunks_mut(CHUNK)
        .zip(offsets.par_iter())
        .for_each(|(chunk, &offset)| {
            let mut local = 0.0f32;
            for v in chunk.iter_mut() {
                local += *v;
                *v = offset + local;
            }
        });
}
