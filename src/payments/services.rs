use tracing::{error, info, warn};

use crate::error::AppError;
use crate::models::{NewPayment, Payment};
use crate::state::AppState;
use crate::store::StoreError;

/// Opens a new unlock for `user_id`.
///
/// Ad unlocks are recorded locally. Paid unlocks create a gateway invoice
/// first; the local record is written only once the invoice exists, so a
/// gateway failure leaves nothing behind.
pub async fn initiate_payment(
    st: &AppState,
    user_id: i64,
    amount_sats: i64,
    is_ad: bool,
) -> Result<i64, AppError> {
    if st.store.get_user(user_id).await?.is_none() {
        return Err(AppError::UserNotFound(user_id));
    }
    if st.store.open_payment_for_user(user_id).await?.is_some() {
        return Err(AppError::DuplicateOpenPayment);
    }

    let new_payment = if is_ad {
        NewPayment::ad_watch(user_id)
    } else {
        if amount_sats <= 0 {
            return Err(AppError::Validation(
                "amount must be a positive number of sats".into(),
            ));
        }
        let charge = st.gateway.create_charge(amount_sats).await.map_err(|e| {
            error!(error = %e, user_id, "gateway create_charge failed");
            AppError::GatewayUnavailable(e)
        })?;
        NewPayment {
            user_id,
            external_id: Some(charge.id),
            status: charge.status,
            sats: amount_sats,
            invoice_ref: charge.payreq,
            uri: charge.uri,
            is_ad_watched: false,
        }
    };

    let payment = st
        .store
        .insert_payment(new_payment)
        .await
        .map_err(|e| match e {
            // lost a race with a concurrent initiation
            StoreError::Duplicate(_) => AppError::DuplicateOpenPayment,
            other => other.into(),
        })?;

    info!(
        user_id,
        payment_id = payment.id,
        sats = payment.sats,
        is_ad = payment.is_ad_watched,
        "payment initiated"
    );
    Ok(payment.id)
}

/// The user's most recent payment as last persisted, without asking the gateway.
pub async fn current_payment(st: &AppState, user_id: i64) -> Result<Option<Payment>, AppError> {
    Ok(st.store.latest_payment_for_user(user_id).await?)
}

/// The user's current payment with its status refreshed from the gateway.
/// A gateway failure degrades to the last persisted status.
pub async fn get_payment(st: &AppState, user_id: i64) -> Result<Payment, AppError> {
    let mut payment = current_payment(st, user_id)
        .await?
        .ok_or(AppError::InvalidPaymentId(user_id))?;

    let Some(external_id) = payment.external_id.clone() else {
        return Ok(payment);
    };

    match st.gateway.charge_status(&external_id).await {
        Ok(status) if status != payment.status => {
            st.store.update_payment_status(payment.id, &status).await?;
            info!(
                user_id,
                payment_id = payment.id,
                from = %payment.status,
                to = %status,
                "payment status changed"
            );
            payment.status = status;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(
                error = %e,
                user_id,
                payment_id = payment.id,
                "gateway status refresh failed, serving last known status"
            );
        }
    }
    Ok(payment)
}
