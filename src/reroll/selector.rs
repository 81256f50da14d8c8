use rand::{seq::SliceRandom, Rng};
use tracing::warn;

use crate::store::{RecordStore, StoreError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

/// Picks an existing spot id uniformly from `[min, max]`.
///
/// Draws random candidates until one exists. After `max_attempts` misses the
/// existing ids in range are listed and one of them is chosen, so a sparse id
/// space still terminates. Returns `None` only when the range holds no spot.
pub async fn pick<R>(
    store: &dyn RecordStore,
    rng: &mut R,
    min: i64,
    max: i64,
    max_attempts: u32,
) -> Result<Option<i64>, StoreError>
where
    R: Rng + Send,
{
    if min > max {
        return Ok(None);
    }

    for _ in 0..max_attempts {
        let candidate = rng.gen_range(min..=max);
        if store.spot_exists(candidate).await? {
            return Ok(Some(candidate));
        }
    }

    warn!(min, max, max_attempts, "random draws exhausted, scanning existing spot ids");
    let ids = store.spot_ids_between(min, max).await?;
    Ok(ids.choose(rng).copied())
}
