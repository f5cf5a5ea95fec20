use ndarray::Array2;

/// Compute the cosine similarity matrix between two feature matrices.
///
/// Columns of both matrices are L2-normalized (with an epsilon guard against
/// silent frames) and multiplied, `Aᵀ·B`. Values lie in [-1, 1]; for
/// non-negative magnitude spectrograms they lie in [0, 1].
///
/// # Arguments
/// * `data_a` - First feature matrix (n_features x n_frames_a)
/// * `data_b` - Second feature matrix (n_features x n_frames_b)
///
/// # Returns
/// Similarity matrix (n_frames_a x n_frames_b)
///
/// # Example
/// ```
/// use repet::similarity::similarity;
/// use ndarray::Array2;
///
/// let a = Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
/// let sim = similarity(&a, &a);
/// assert!((sim[(0, 0)] - 1.0).abs() < 1e-12);
/// assert!(sim[(0, 1)].abs() < 1e-12);
/// ```
pub fn similarity(data_a: &Array2<f64>, data_b: &Array2<f64>) -> Array2<f64> {
    let number_features = data_a.nrows();
    let frames_a = data_a.ncols();
    let frames_b = data_b.ncols();
    if data_b.nrows() != number_features {
        return Array2::zeros((frames_a, frames_b));
    }

    let normalized_a = normalize_columns(data_a);
    let normalized_b = if std::ptr::eq(data_a, data_b) {
        normalized_a.clone()
    } else {
        normalize_columns(data_b)
    };

    normalized_a.t().dot(&normalized_b)
}

/// Compute the cosine self-similarity matrix of a feature matrix.
///
/// The result is symmetric with a unit diagonal.
pub fn self_similarity(data: &Array2<f64>) -> Array2<f64> {
    similarity(data, data)
}

fn normalize_columns(data: &Array2<f64>) -> Array2<f64> {
    let mut normalized = data.clone();
    for mut column in normalized.columns_mut() {
        let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
        let divisor = norm + f64::EPSILON;
        column.iter_mut().for_each(|v| *v /= divisor);
    }
    normalized
}

/// Find constrained local maxima in a vector.
///
/// An index qualifies when its value reaches `minimum_value` and is strictly
/// greater than every neighbor within `minimum_distance` on both sides
/// (plateaus disqualify). The qualifying maxima are then ranked by value and
/// at most `maximum_count` are kept.
///
/// # Arguments
/// * `values` - Input vector
/// * `minimum_value` - Threshold a maximum must reach
/// * `minimum_distance` - Exclusion radius, in samples
/// * `maximum_count` - Cap on the number of maxima returned
///
/// # Returns
/// Tuple of (values, indices) sorted by value descending. The indices follow
/// that ranking, not time order.
pub fn local_maxima(
    values: &[f64],
    minimum_value: f64,
    minimum_distance: usize,
    maximum_count: usize,
) -> (Vec<f64>, Vec<usize>) {
    let number_values = values.len();
    let mut candidates: Vec<usize> = Vec::new();
    for i in 0..number_values {
        if values[i] < minimum_value {
            continue;
        }
        let start = i.saturating_sub(minimum_distance);
        let stop = (i + minimum_distance + 1).min(number_values);
        let is_peak = (start..stop).all(|j| j == i || values[i] > values[j]);
        if is_peak {
            candidates.push(i);
        }
    }

    candidates.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(maximum_count);

    let maxima = candidates.iter().map(|&i| values[i]).collect();
    (maxima, candidates)
}

/// Collect, for every frame, the most similar repeating frames.
///
/// Applies [`local_maxima`] to each column of a self-similarity matrix. The
/// strict peak rule naturally suppresses the near-diagonal neighborhood of
/// each frame, so the lists hold genuine repetitions rather than temporal
/// continuations.
///
/// # Arguments
/// * `similarity_matrix` - Self-similarity matrix (n_frames x n_frames)
/// * `threshold` - Minimum similarity a repetition must reach
/// * `distance` - Exclusion radius around a maximum, in frames
/// * `count` - Cap on the number of repetitions per frame
///
/// # Returns
/// One variable-length index list per frame
pub fn similarity_indices(
    similarity_matrix: &Array2<f64>,
    threshold: f64,
    distance: usize,
    count: usize,
) -> Vec<Vec<usize>> {
    let number_times = similarity_matrix.ncols();
    let mut indices = Vec::with_capacity(number_times);
    let mut column = vec![0.0f64; similarity_matrix.nrows()];
    for t in 0..number_times {
        for (i, value) in column.iter_mut().enumerate() {
            *value = similarity_matrix[(i, t)];
        }
        let (_, frame_indices) = local_maxima(&column, threshold, distance, count);
        indices.push(frame_indices);
    }
    indices
}
