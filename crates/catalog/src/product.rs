use serde::{Deserialize, Serialize};

use orderdesk_core::{DomainError, DomainResult, ProductId};

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Food,
    Beverage,
    Household,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Food => "FOOD",
            Category::Beverage => "BEVERAGE",
            Category::Household => "HOUSEHOLD",
            Category::Other => "OTHER",
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FOOD" => Ok(Category::Food),
            "BEVERAGE" => Ok(Category::Beverage),
            "HOUSEHOLD" => Ok(Category::Household),
            "OTHER" => Ok(Category::Other),
            _ => Err(DomainError::invalid_request(
                "category must be one of: FOOD, BEVERAGE, HOUSEHOLD, OTHER",
            )),
        }
    }
}

/// Create/update payload for a catalog product, as received from a caller.
///
/// Numeric fields are signed so that negative input can be represented and
/// rejected instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub unit_price: i64,
    pub stock_quantity: i64,
    pub category: Category,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub name: String,
    /// Price in smallest currency unit.
    pub unit_price: u64,
    pub stock_quantity: u64,
    pub category: Category,
}

impl ProductDraft {
    pub fn validate(&self) -> DomainResult<ValidDraft> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::invalid_request("name cannot be empty"));
        }
        let unit_price = u64::try_from(self.unit_price)
            .map_err(|_| DomainError::invalid_request("unit_price cannot be negative"))?;
        let stock_quantity = u64::try_from(self.stock_quantity)
            .map_err(|_| DomainError::invalid_request("stock_quantity cannot be negative"))?;

        Ok(ValidDraft {
            name: name.to_string(),
            unit_price,
            stock_quantity,
            category: self.category,
        })
    }
}

/// Stock record of the catalog.
///
/// `stock_quantity` is only changed through [`Product::take_stock`],
/// [`Product::restock`] and [`Product::set_stock`], which the stock ledger
/// calls while holding the row's exclusive lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    unit_price: u64,
    stock_quantity: u64,
    category: Category,
}

impl Product {
    pub fn create(id: ProductId, draft: &ValidDraft) -> Self {
        Self {
            id,
            name: draft.name.clone(),
            unit_price: draft.unit_price,
            stock_quantity: draft.stock_quantity,
            category: draft.category,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Price in smallest currency unit.
    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn stock_quantity(&self) -> u64 {
        self.stock_quantity
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn has_stock_for(&self, quantity: u64) -> bool {
        self.stock_quantity >= quantity
    }

    /// Update descriptive fields (name, price, category). Stock is untouched.
    pub fn update_details(&mut self, draft: &ValidDraft) {
        self.name = draft.name.clone();
        self.unit_price = draft.unit_price;
        self.category = draft.category;
    }

    /// Consume `quantity` units; fails without change if stock is short.
    pub fn take_stock(&mut self, quantity: u64) -> DomainResult<()> {
        self.stock_quantity = self.stock_quantity.checked_sub(quantity).ok_or_else(|| {
            DomainError::out_of_stock(format!(
                "product {} has {} in stock, {} requested",
                self.id, self.stock_quantity, quantity
            ))
        })?;
        Ok(())
    }

    /// Return `quantity` units to stock.
    pub fn restock(&mut self, quantity: u64) -> DomainResult<()> {
        self.stock_quantity = self.stock_quantity.checked_add(quantity).ok_or_else(|| {
            DomainError::internal(format!("stock overflow on product {}", self.id))
        })?;
        Ok(())
    }

    pub fn set_stock(&mut self, quantity: u64) {
        self.stock_quantity = quantity;
    }
}
