use super::repository::{self, Cart};
use crate::modules::cache::{QueryCache, QueryKey};
use crate::utils::api::{self, Executor};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Item is no longer in the cart")]
    LineNotFound,
    #[error("Could not load your cart")]
    FailedToFetchCart,
    #[error("{0}")]
    FailedToUpdateQuantity(String),
}

/// Always reads the cart from the server and refreshes the cached copy with it.
pub async fn find_active(e: &dyn Executor, cache: &QueryCache) -> Result<Option<Cart>, Error> {
    let cart = repository::find_active(e).await.map_err(|err| {
        tracing::error!("Failed to fetch active cart: {}", err);
        Error::FailedToFetchCart
    })?;

    cache.set(QueryKey::Cart, &cart).await;

    Ok(cart)
}

/// Local half of a quantity change. A quantity of 0 removes the line.
pub fn apply_quantity(cart: &mut Cart, line_id: &str, quantity: u32) -> Result<(), Error> {
    let index = cart
        .items
        .iter()
        .position(|line| line.id == line_id)
        .ok_or(Error::LineNotFound)?;

    match quantity {
        0 => {
            cart.items.remove(index);
        }
        quantity => {
            if let Some(line) = cart.items.get_mut(index) {
                line.quantity = quantity;
            }
        }
    }

    Ok(())
}

/// Remote half of a quantity change. Returns the cart as the server now sees it.
pub async fn update_quantity(
    e: &dyn Executor,
    cache: &QueryCache,
    line_id: &str,
    quantity: u32,
) -> Result<Option<Cart>, Error> {
    let cart = repository::update_line_quantity(e, line_id, quantity)
        .await
        .map_err(|err: api::Error| {
            tracing::error!("Failed to set quantity of line {}: {}", line_id, err);
            Error::FailedToUpdateQuantity(
                err.server_message()
                    .unwrap_or("Failed to update quantity")
                    .to_string(),
            )
        })?;

    cache.invalidate(&QueryKey::CART_CHANGED).await;

    Ok(cart)
}
