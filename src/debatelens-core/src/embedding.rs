//! Local bag-of-words hash embeddings and cosine similarity.
//!
//! Embeddings are computed in-process with no model or network access, so
//! retrieval keeps working when every external service is down.

/// Dimension of every embedding vector.
pub const EMBEDDING_DIM: usize = 384;

/// Embed `text` into a fixed-size, L2-normalized bag-of-words vector.
///
/// Empty or whitespace-only text yields the zero vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];

    for token in text.to_lowercase().split_whitespace() {
        let bucket = string_hash(token).unsigned_abs() as usize % EMBEDDING_DIM;
        vector[bucket] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }

    vector
}

/// Stable 32-bit string hash (`h = h * 31 + c`, wrapping).
fn string_hash(token: &str) -> i32 {
    token.chars().fold(0i32, |h, c| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32)
    })
}

/// Cosine similarity of two vectors in `[-1, 1]`.
///
/// Returns 0 when either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_is_deterministic() {
        let text = "Peer-reviewed studies show a clear effect";
        assert_eq!(embed(text), embed(text));
        assert_eq!(embed(text).len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let v = embed("the minimum wage should be raised");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = embed("taxes fund public schools");
        let b = embed("public schools need more funding from taxes");
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        assert!(cosine_similarity(&a, &b) > 0.0);
    }

    #[test]
    fn test_empty_text_gives_zero_vector() {
        let zero = embed("   ");
        assert!(zero.iter().all(|v| *v == 0.0));
        let other = embed("anything at all");
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
        assert_eq!(cosine_similarity(&other, &zero), 0.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(embed("Climate Change"), embed("climate change"));
    }

    #[test]
    fn test_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }
}
