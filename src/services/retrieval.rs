use crate::models::ClosetItem;

/// Cosine similarity of two equal-length vectors. An all-zero side yields 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    dot / denom
}

/// Top-k items nearest to `query`, best first.
///
/// Items without a vector, or with a different dimensionality than the query,
/// are left out rather than scored. An empty result tells the caller to use
/// the full inventory.
pub fn find_similar(items: &[ClosetItem], query: &[f32], top_k: usize) -> Vec<ClosetItem> {
    if query.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &ClosetItem)> = items
        .iter()
        .filter_map(|item| {
            let vector = item.image_vector.as_deref()?;
            if vector.len() != query.len() {
                return None;
            }
            Some((cosine_similarity(query, vector), item))
        })
        .collect();

    // Stable: equal similarity keeps inventory order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    tracing::debug!(
        usable = scored.len(),
        total = items.len(),
        top_k,
        "Vector retrieval ranked candidates"
    );

    scored
        .into_iter()
        .take(top_k)
        .map(|(_, item)| item.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ItemAttributes};
    use chrono::Utc;

    fn item(id: &str, vector: Option<Vec<f32>>) -> ClosetItem {
        ClosetItem {
            id: id.to_string(),
            image_url: String::new(),
            attributes: ItemAttributes::new(Category::Top),
            name: None,
            tags: vec![],
            season: vec![],
            image_vector: vector,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_cosine_similarity_basic() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_ranks_by_similarity_descending() {
        let items = vec![
            item("far", Some(vec![0.0, 1.0])),
            item("near", Some(vec![1.0, 0.1])),
            item("mid", Some(vec![1.0, 1.0])),
        ];
        let ids: Vec<String> = find_similar(&items, &[1.0, 0.0], 10)
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_excludes_missing_and_mismatched_vectors() {
        let items = vec![
            item("none", None),
            item("short", Some(vec![1.0])),
            item("ok", Some(vec![0.5, 0.5])),
        ];
        let result = find_similar(&items, &[1.0, 1.0], 10);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "ok");
    }

    #[test]
    fn test_no_usable_vectors_returns_empty() {
        let items = vec![item("a", None), item("b", Some(vec![1.0, 2.0, 3.0]))];
        assert!(find_similar(&items, &[1.0, 1.0], 5).is_empty());
    }

    #[test]
    fn test_all_zero_query_does_not_panic() {
        let items = vec![item("a", Some(vec![1.0, 0.0])), item("b", Some(vec![0.0, 1.0]))];
        let result = find_similar(&items, &[0.0, 0.0], 5);
        let ids: Vec<String> = result.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let items = vec![
            item("a", Some(vec![1.0, 0.0])),
            item("b", Some(vec![0.9, 0.1])),
            item("c", Some(vec![0.0, 1.0])),
        ];
        assert_eq!(find_similar(&items, &[1.0, 0.0], 2).len(), 2);
    }
}
