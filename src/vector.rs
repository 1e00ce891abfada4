//! Vector arithmetic over embedding values.
//!
//! Every binary operation returns `None` instead of failing when the inputs
//! are empty or have different dimensionality.

use serde::Serialize;

/// Summary statistics over one embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingStatistics {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    /// Population standard deviation.
    pub std_deviation: f64,
    pub min: f64,
    pub max: f64,
    pub magnitude: f64,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    pub span: f64,
}

fn same_shape(a: &[f64], b: &[f64]) -> bool {
    !a.is_empty() && a.len() == b.len()
}

pub fn dot_product(a: &[f64], b: &[f64]) -> Option<f64> {
    if !same_shape(a, b) {
        return None;
    }
    Some(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// L2 norm; `None` for an empty vector.
pub fn magnitude(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|x| x * x).sum::<f64>().sqrt())
}

/// `dot / (|a| * |b|)`.
///
/// Returns `None` when shapes differ, either magnitude is zero, or the result
/// is not finite.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    // Dot product and both norms are computed in one pass.
    if !same_shape(a, b) {
        return None;
    }

    let (dot, norm_a_sq, norm_b_sq) = a
        .iter()
        .zip(b)
        .fold((0.0f64, 0.0f64, 0.0f64), |(dot, na_sq, nb_sq), (x, y)| {
            (dot + (x * y), na_sq + (x * x), nb_sq + (y * y))
        });

    if norm_a_sq == 0.0 || norm_b_sq == 0.0 {
        return None;
    }

    let similarity = dot / (norm_a_sq.sqrt() * norm_b_sq.sqrt());
    similarity.is_finite().then_some(similarity)
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Option<f64> {
    if !same_shape(a, b) {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt(),
    )
}

/// Scale to unit length; `None` for empty or zero-magnitude vectors.
pub fn normalize(values: &[f64]) -> Option<Vec<f64>> {
    let magnitude = magnitude(values)?;
    if magnitude == 0.0 {
        return None;
    }
    Some(values.iter().map(|x| x / magnitude).collect())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn range(values: &[f64]) -> Option<ValueRange> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    Some(ValueRange {
        min,
        max,
        span: max - min,
    })
}

pub fn statistics(values: &[f64]) -> Option<EmbeddingStatistics> {
    let count = values.len();
    let mean = mean(values)?;
    let sum: f64 = values.iter().sum();
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
    let range = range(values)?;

    Some(EmbeddingStatistics {
        count,
        mean,
        variance,
        std_deviation: variance.sqrt(),
        min: range.min,
        max: range.max,
        magnitude: magnitude(values)?,
        sum,
    })
}
