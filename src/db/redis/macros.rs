/// Returns the cached value for `$key`, or computes it with `$block` and
/// queues the result for caching.
///
/// `$cache` is an `Option<Cache>`; with no cache configured the block always
/// runs. `$block` must evaluate to an `AppResult`, and only successful values
/// are cached.
///
/// # Example
/// ```rust,ignore
/// let page = cached!(state.cache, key, state.cache_ttl, {
///     state.engine.recommend(&query)
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = &$key;
        match $cache.as_ref() {
            Some(cache) => match cache.lookup(key).await {
                Some(hit) => {
                    tracing::debug!(key = %key, "Cache hit");
                    Ok(hit)
                }
                None => $block.map(|value| {
                    cache.set_in_background(key, &value, $ttl);
                    value
                }),
            },
            None => $block,
        }
    }};
}
