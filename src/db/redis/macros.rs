/// Read-through caching in one expression.
///
/// Returns the cached value for `$key` when present. Otherwise awaits `$future`,
/// queues the result for a background write with `$ttl` seconds, and returns it.
/// Must be used inside a function returning `AppResult`.
///
/// ```rust,ignore
/// let vector: Vec<f32> = cached!(cache, CacheKey::TextVector(text.clone()), 3600, embedder.encode_text(&text))?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $future:expr) => {{
        match $cache.get_from_cache(&$key).await? {
            Some(hit) => Ok(hit),
            None => {
                let fresh = $future.await?;
                $cache.set_in_background(&$key, &fresh, $ttl);
                Ok(fresh)
            }
        }
    }};
}
