// Voxelwise reductions over the gradient (last) axis of 4-D volume stacks

use ndarray::{Array3, ArrayView1, ArrayView4, Axis, Zip};

/// sequential sum divided by the number of entries. The summation order is the lane order so
/// results are reproducible bit-for-bit.
#[inline(always)]
pub fn mean(values: ArrayView1<f32>) -> f32 {
    values.iter().fold(0f32, |acc, &x| acc + x) / values.len() as f32
}

/// median of a set of values. For an even count, the two middle values are averaged.
pub fn median(values: impl IntoIterator<Item = f32>) -> f32 {
    let mut sorted = values.into_iter().collect::<Vec<f32>>();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        return f32::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.
    }
}

/// q-th percentile (0 <= q <= 100) with linear interpolation between the closest ranks
pub fn percentile(values: &[f32], q: f32) -> f32 {
    assert!((0. ..=100.).contains(&q), "percentile must lie in [0, 100]");
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        return f32::NAN;
    }
    let pos = q / 100. * (n - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// collapses the last axis of a 4-D stack with the supplied reduction. Voxels are processed
/// in parallel.
pub fn reduce_last_axis<F>(data: ArrayView4<f32>, reduce: F) -> Array3<f32>
where
    F: Fn(ArrayView1<f32>) -> f32 + Send + Sync,
{
    let (nx, ny, nz, _) = data.dim();
    let mut out = Array3::<f32>::zeros((nx, ny, nz));
    Zip::from(&mut out)
        .and(data.lanes(Axis(3)))
        .par_for_each(|o, lane| *o = reduce(lane));
    out
}

pub fn mean_last_axis(data: ArrayView4<f32>) -> Array3<f32> {
    reduce_last_axis(data, mean)
}

pub fn median_last_axis(data: ArrayView4<f32>) -> Array3<f32> {
    reduce_last_axis(data, |lane| median(lane.iter().copied()))
}
