use bigdecimal::BigDecimal;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::utils::{
    api::{self, Executor, Request},
    money::{deserialize_amount, deserialize_optional_amount, serialize_amount},
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default)]
    pub offer_name: String,
    /// An offer without a required quantity never applies.
    #[serde(default)]
    pub required_quantity: Option<u32>,
    /// Percentage between 0 and 100.
    #[serde(default, deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub discount_amount: BigDecimal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub price: BigDecimal,
    #[serde(default)]
    pub offers: Option<Offer>,
    #[serde(default)]
    pub restaurant_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CustomizationOption {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub price: BigDecimal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    pub field_name: String,
    pub options: CustomizationOption,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub item: CatalogItem,
    pub quantity: u32,
    /// Unit price captured when the line was added.
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub item_price: Option<BigDecimal>,
    #[serde(default)]
    pub selected_customizations: Vec<Customization>,
}

impl CartLineItem {
    /// Captured unit price, or the catalog price for lines added before prices were captured.
    pub fn unit_price(&self) -> BigDecimal {
        self.item_price
            .clone()
            .unwrap_or_else(|| self.item.price.clone())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    pub id: String,
    pub restaurant_id: String,
    #[serde(default)]
    pub items: Vec<CartLineItem>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidCart {
    #[error("Line {0} has a quantity below 1")]
    ZeroQuantity(String),
    #[error("A cart can only hold items from one restaurant")]
    MixedRestaurants,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    pub fn find_line(&self, line_id: &str) -> Option<&CartLineItem> {
        self.items.iter().find(|line| line.id == line_id)
    }

    pub fn validate(&self) -> Result<(), InvalidCart> {
        if let Some(line) = self.items.iter().find(|line| line.quantity < 1) {
            return Err(InvalidCart::ZeroQuantity(line.id.clone()));
        }

        let same_restaurant = std::iter::once(self.restaurant_id.as_str())
            .chain(
                self.items
                    .iter()
                    .filter_map(|line| line.item.restaurant_id.as_deref()),
            )
            .all_equal();

        match same_restaurant {
            true => Ok(()),
            false => Err(InvalidCart::MixedRestaurants),
        }
    }
}

#[derive(Deserialize)]
struct CartEnvelope {
    cart: Option<Cart>,
}

pub async fn find_active(e: &dyn Executor) -> Result<Option<Cart>, api::Error> {
    api::send::<CartEnvelope>(e, Request::get("cart"))
        .await
        .map(|envelope| envelope.cart)
}

pub async fn update_line_quantity(
    e: &dyn Executor,
    line_id: &str,
    quantity: u32,
) -> Result<Option<Cart>, api::Error> {
    api::send::<CartEnvelope>(
        e,
        Request::patch(format!("cart/items/{}", line_id), json!({ "quantity": quantity })),
    )
    .await
    .map(|envelope| envelope.cart)
}
