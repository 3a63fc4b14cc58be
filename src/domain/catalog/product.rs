use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::domain::order::OrderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Entree,
    Plat,
    Dessert,
    Boisson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Current unit price. Orders snapshot it, they never point back at it.
    pub price: Decimal,
    pub quantity: i32,
    pub available: bool,
    pub category: Category,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
        quantity: i32,
        category: Category,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            price,
            quantity,
            available: quantity > 0,
            category,
        }
    }

    /// Take `requested` units out of stock.
    ///
    /// Returns the unit price as it was before the reservation so the caller
    /// can snapshot it into the order line. When stock reaches zero the
    /// product is flagged unavailable.
    pub fn reserve(&mut self, requested: i32) -> Result<Decimal, OrderError> {
        if self.quantity < requested {
            return Err(OrderError::InsufficientStock {
                product_name: self.name.clone(),
                available: self.quantity,
                requested,
            });
        }

        let price = self.price;
        self.quantity -= requested;
        if self.quantity == 0 {
            self.available = false;
        }

        Ok(price)
    }
}
