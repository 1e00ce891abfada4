use super::types::{ContentEmbedding, EmbedContentResponse};
use crate::http::HttpResponse;
use crate::vector::{self, EmbeddingStatistics, ValueRange};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingSummary {
    pub has_embedding: bool,
    pub dimensions: Option<usize>,
    pub magnitude: Option<f64>,
    pub is_valid: bool,
    pub status_code: u16,
    pub statistics: Option<EmbeddingStatistics>,
    pub response_successful: bool,
}

/// `embedContent` result with its transport metadata.
///
/// Vector operations between two responses return `None` when either side
/// has no values or the dimensions differ.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiEmbeddingsResponse {
    pub embedding: Option<ContentEmbedding>,
    pub status_code: u16,
    pub headers: HashMap<String, Vec<String>>,
}

impl GeminiEmbeddingsResponse {
    pub fn new(embedding: Option<ContentEmbedding>) -> Self {
        Self {
            embedding,
            status_code: 200,
            headers: HashMap::new(),
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self::new(Some(ContentEmbedding { values }))
    }

    pub fn from_json(body: Value) -> Result<Self> {
        let parsed: EmbedContentResponse = serde_json::from_value(body)?;
        Ok(Self::new(parsed.embedding))
    }

    pub fn from_http(response: HttpResponse) -> Result<Self> {
        let body = response.json.ok_or_else(|| {
            Error::api(response.status, "embedContent response had no JSON body")
        })?;
        let parsed: EmbedContentResponse = serde_json::from_value(body)?;

        Ok(Self {
            embedding: parsed.embedding,
            status_code: response.status,
            headers: response.headers,
        })
    }

    /// Embedding values; `None` when the response carried no vector.
    pub fn values(&self) -> Option<&[f64]> {
        self.embedding
            .as_ref()
            .map(|embedding| embedding.values.as_slice())
            .filter(|values| !values.is_empty())
    }

    pub fn has_embedding(&self) -> bool {
        self.values().is_some()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.values().map(<[f64]>::len)
    }

    pub fn magnitude(&self) -> Option<f64> {
        vector::magnitude(self.values()?)
    }

    pub fn normalized(&self) -> Option<Vec<f64>> {
        vector::normalize(self.values()?)
    }

    pub fn statistics(&self) -> Option<EmbeddingStatistics> {
        vector::statistics(self.values()?)
    }

    pub fn mean(&self) -> Option<f64> {
        vector::mean(self.values()?)
    }

    pub fn standard_deviation(&self) -> Option<f64> {
        self.statistics().map(|stats| stats.std_deviation)
    }

    pub fn range(&self) -> Option<ValueRange> {
        vector::range(self.values()?)
    }

    pub fn dot_product(&self, other: &Self) -> Option<f64> {
        vector::dot_product(self.values()?, other.values()?)
    }

    pub fn cosine_similarity(&self, other: &Self) -> Option<f64> {
        vector::cosine_similarity(self.values()?, other.values()?)
    }

    pub fn euclidean_distance(&self, other: &Self) -> Option<f64> {
        vector::euclidean_distance(self.values()?, other.values()?)
    }

    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// First value of a header, trying the exact name before its lower-case
    /// form.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.headers.get(&name.to_ascii_lowercase()))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn has_nan_values(&self) -> bool {
        self.values()
            .is_some_and(|values| values.iter().any(|x| x.is_nan()))
    }

    pub fn has_infinite_values(&self) -> bool {
        self.values()
            .is_some_and(|values| values.iter().any(|x| x.is_infinite()))
    }

    pub fn is_valid_embedding(&self) -> bool {
        self.has_embedding()
            && !self.has_nan_values()
            && !self.has_infinite_values()
            && self.magnitude().is_some_and(|m| m > 0.0)
    }

    pub fn first_n_values(&self, n: usize) -> Option<&[f64]> {
        let values = self.values()?;
        Some(&values[..n.min(values.len())])
    }

    pub fn last_n_values(&self, n: usize) -> Option<&[f64]> {
        let values = self.values()?;
        Some(&values[values.len().saturating_sub(n)..])
    }

    pub fn to_summary(&self) -> EmbeddingSummary {
        EmbeddingSummary {
            has_embedding: self.has_embedding(),
            dimensions: self.dimensions(),
            magnitude: self.magnitude(),
            is_valid: self.is_valid_embedding(),
            status_code: self.status_code,
            statistics: self.statistics(),
            response_successful: self.is_successful(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_unit_vector() {
        let response = GeminiEmbeddingsResponse::from_values(vec![1.0, 0.0, 0.0]);

        assert_eq!(response.dimensions(), Some(3));
        assert!((response.magnitude().unwrap() - 1.0).abs() < EPS);
        assert!((response.cosine_similarity(&response).unwrap() - 1.0).abs() < EPS);
        assert_eq!(response.euclidean_distance(&response), Some(0.0));
        assert!(response.is_valid_embedding());
    }

    #[test]
    fn test_dimension_mismatch_is_none() {
        let a = GeminiEmbeddingsResponse::from_values(vec![1.0, 2.0, 3.0]);
        let b = GeminiEmbeddingsResponse::from_values(vec![1.0, 2.0, 3.0, 4.0]);

        assert_eq!(a.dot_product(&b), None);
        assert_eq!(a.cosine_similarity(&b), None);
        assert_eq!(a.euclidean_distance(&b), None);
    }

    #[test]
    fn test_missing_embedding() {
        let response = GeminiEmbeddingsResponse::from_json(json!({})).unwrap();
        let other = GeminiEmbeddingsResponse::from_values(vec![1.0]);

        assert!(!response.has_embedding());
        assert_eq!(response.dimensions(), None);
        assert_eq!(response.statistics(), None);
        assert_eq!(response.dot_product(&other), None);
        assert!(!response.is_valid_embedding());
        assert!(!response.has_nan_values());
        assert_eq!(response.first_n_values(5), None);
    }

    #[test]
    fn test_zero_vector_is_not_valid() {
        let zero = GeminiEmbeddingsResponse::from_values(vec![0.0, 0.0]);
        let other = GeminiEmbeddingsResponse::from_values(vec![1.0, 0.0]);

        assert!(!zero.is_valid_embedding());
        assert_eq!(zero.cosine_similarity(&other), None);
        assert_eq!(zero.normalized(), None);
    }

    #[test]
    fn test_non_finite_values_are_flagged() {
        let nan = GeminiEmbeddingsResponse::from_values(vec![f64::NAN, 1.0]);
        let inf = GeminiEmbeddingsResponse::from_values(vec![f64::INFINITY, 1.0]);

        assert!(nan.has_nan_values());
        assert!(!nan.is_valid_embedding());
        assert!(inf.has_infinite_values());
        assert!(!inf.is_valid_embedding());
    }

    #[test]
    fn test_first_and_last_values() {
        let response = GeminiEmbeddingsResponse::from_values(vec![1.0, 2.0, 3.0, 4.0]);

        assert_eq!(response.first_n_values(2), Some(&[1.0, 2.0][..]));
        assert_eq!(response.last_n_values(2), Some(&[3.0, 4.0][..]));
        assert_eq!(response.last_n_values(10).map(<[f64]>::len), Some(4));
    }

    #[test]
    fn test_header_lookup_falls_back_to_lowercase() {
        let mut http = HttpResponse::from_json(200, json!({"embedding": {"values": [0.5]}}));
        http.headers
            .insert("content-type".to_string(), vec!["application/json".to_string()]);

        let response = GeminiEmbeddingsResponse::from_http(http).unwrap();

        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
        assert!(response.is_successful());
    }

    #[test]
    fn test_summary() {
        let response = GeminiEmbeddingsResponse::from_values(vec![3.0, 4.0]);
        let summary = response.to_summary();

        assert_eq!(summary.dimensions, Some(2));
        assert_eq!(summary.magnitude, Some(5.0));
        assert!(summary.is_valid);
        assert_eq!(summary.statistics.map(|s| s.sum), Some(7.0));
        assert_eq!(response.standard_deviation(), Some(0.5));
        assert_eq!(response.range().map(|r| r.span), Some(1.0));
    }
}
