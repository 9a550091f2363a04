use super::Error;
use crate::modules::order::repository::{self, OrderPayload, PlacedOrder};
use crate::utils::api::Executor;

pub const PLACEMENT_FAILED: &str = "Failed to place order";

pub async fn submit(e: &dyn Executor, payload: &OrderPayload) -> Result<PlacedOrder, Error> {
    repository::place(e, payload).await.map_err(|err| {
        tracing::error!("Failed to place order for cart {}: {}", payload.cart_id, err);
        Error::OrderPlacementFailure(
            err.server_message()
                .unwrap_or(PLACEMENT_FAILED)
                .to_string(),
        )
    })
}
