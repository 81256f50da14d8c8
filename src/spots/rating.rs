use crate::store::{RecordStore, StoreError};

const SCAN_PAGE_SIZE: i64 = 100;

/// Mean rating over every stored review of `spot_id`, or `prior` when the
/// spot has none.
pub async fn recompute(
    store: &dyn RecordStore,
    spot_id: i64,
    prior: f64,
) -> Result<f64, StoreError> {
    mean_rating(store, spot_id, prior, SCAN_PAGE_SIZE).await
}

async fn mean_rating(
    store: &dyn RecordStore,
    spot_id: i64,
    prior: f64,
    page_size: i64,
) -> Result<f64, StoreError> {
    let mut sum = 0.0;
    let mut count: u64 = 0;
    let mut page = 0;
    loop {
        let batch = store.reviews_by_spot(spot_id, page, page_size).await?;
        count += batch.len() as u64;
        sum += batch.iter().map(|r| r.rating).sum::<f64>();
        if (batch.len() as i64) < page_size {
            break;
        }
        page += 1;
    }

    if count == 0 {
        return Ok(prior);
    }
    Ok(sum / count as f64)
}
