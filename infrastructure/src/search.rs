use domain::models::SimilarityMetric;

pub struct SearchEngine;

impl SearchEngine {
    /// Zero-length vectors score 0.0 instead of NaN.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product = Self::inner_product(a, b);
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot_product / (norm_a * norm_b)
    }

    pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    pub fn score(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> f32 {
        match metric {
            SimilarityMetric::Cosine => Self::cosine_similarity(a, b),
            SimilarityMetric::InnerProduct => Self::inner_product(a, b),
        }
    }

    /// Returns `(position, score)` of the best `top_k` candidates, highest score first.
    /// Equal scores keep candidate order.
    pub fn rank<'a, I>(
        metric: SimilarityMetric,
        query: &[f32],
        candidates: I,
        top_k: usize,
    ) -> Vec<(usize, f32)>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut similarities: Vec<(usize, f32)> = candidates
            .into_iter()
            .enumerate()
            .map(|(pos, vector)| (pos, Self::score(metric, query, vector)))
            .collect();

        similarities.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        similarities.truncate(top_k);
        similarities
    }
}
