use super::repository::Address;

/// Where the order goes. Either the saved address that was picked or the
/// address resolved from the device location, never both.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddressBook {
    saved: Vec<Address>,
    selected_address: Option<String>,
    current_location_address: String,
    is_using_current_location: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Current location is not available")]
    LocationUnavailable,
    #[error("Address not found")]
    AddressNotFound,
}

impl AddressBook {
    /// Starts on the current location when one is known, otherwise on the
    /// first saved address.
    pub fn new(saved: Vec<Address>, current_location_address: String) -> Self {
        let mut book = Self {
            saved,
            selected_address: None,
            current_location_address,
            is_using_current_location: false,
        };

        if book.use_current_location().is_err() {
            if let Some(first) = book.saved.first().map(|address| address.id.clone()) {
                book.selected_address = Some(first);
            }
        }

        book
    }

    pub fn saved(&self) -> &[Address] {
        &self.saved
    }

    pub fn selected_address(&self) -> Option<&Address> {
        match self.is_using_current_location {
            true => None,
            false => self
                .selected_address
                .as_deref()
                .and_then(|id| self.saved.iter().find(|address| address.id == id)),
        }
    }

    pub fn is_using_current_location(&self) -> bool {
        self.is_using_current_location
    }

    pub fn use_current_location(&mut self) -> Result<(), Error> {
        if self.current_location_address.trim().is_empty() {
            return Err(Error::LocationUnavailable);
        }

        self.is_using_current_location = true;
        self.selected_address = None;
        Ok(())
    }

    pub fn select_saved(&mut self, address_id: &str) -> Result<&Address, Error> {
        let address = self
            .saved
            .iter()
            .find(|address| address.id == address_id)
            .ok_or(Error::AddressNotFound)?;

        self.selected_address = Some(address.id.clone());
        self.is_using_current_location = false;
        Ok(address)
    }

    /// Text of the active address. Empty when nothing is selected.
    pub fn delivery_address(&self) -> String {
        match self.is_using_current_location {
            true => self.current_location_address.clone(),
            false => self
                .selected_address()
                .map(|address| address.address.clone())
                .unwrap_or_default(),
        }
    }
}
