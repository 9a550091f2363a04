use serde::{Deserialize, Serialize};

use crate::utils::api::{self, Executor, Request};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Address {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
}

/// Contact details and last known position of the signed in user.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone_number: String,
    /// Address resolved from the device location.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Deserialize)]
struct AddressesResponse {
    #[serde(default)]
    addresses: Vec<Address>,
}

#[derive(Deserialize)]
struct ProfileResponse {
    user: Profile,
}

pub async fn find_all(e: &dyn Executor) -> Result<Vec<Address>, api::Error> {
    api::send::<AddressesResponse>(e, Request::get("addresses"))
        .await
        .map(|res| res.addresses)
}

pub async fn find_profile(e: &dyn Executor) -> Result<Profile, api::Error> {
    api::send::<ProfileResponse>(e, Request::get("profile"))
        .await
        .map(|res| res.user)
}
