
/// Euclidean norm computed in `f64` to keep rounding stable for long vectors
#[inline]
pub fn l2_norm(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|&value| f64::from(value) * f64::from(value))
        .sum::<f64>()
        .sqrt()
}

/// Scale to unit length in place. A zero vector is left unchanged.
#[inline]
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm == 0.0 {
        return;
    }

    for value in vector.iter_mut() {
        *value = (f64::from(*value) / norm) as f32;
    }
}

/// Owned variant of [`l2_normalize`]
#[inline]
pub fn l2_normalized(mut vector: Vec<f32>) -> Vec<f32> {
    l2_normalize(&mut vector);
    vector
}

/// Normalize every `dimension`-wide row of a row-major matrix. Rows with a
/// zero norm are divided by 1 instead.
#[inline]
pub fn normalize_rows(matrix: &mut [f32], dimension: usize) {
    if dimension == 0 {
        return;
    }

    for row in matrix.chunks_exact_mut(dimension) {
        let norm = l2_norm(row);
        let divisor = if norm == 0.0 { 1.0 } else { norm };
        for value in row.iter_mut() {
            *value = (f64::from(*value) / divisor) as f32;
        }
    }
}
