//! Orders placed at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cart::{Cart, CartItem};
use super::email::Email;
use super::id::{OrderNumber, UserId};
use super::price::{Price, ShippingPolicy};
use super::status::OrderStatus;

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingDetails {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
    /// Contact email; guests may leave it out.
    pub email: Option<Email>,
}

impl ShippingDetails {
    /// City pre-filled on the shipping form.
    pub const DEFAULT_CITY: &'static str = "Bitola";
    /// Country pre-filled on the shipping form.
    pub const DEFAULT_COUNTRY: &'static str = "North Macedonia";
}

/// Money lines of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
}

impl OrderTotals {
    /// Totals for a cart under a shipping policy.
    #[must_use]
    pub fn compute(cart: &Cart, policy: &ShippingPolicy) -> Self {
        let subtotal = cart.subtotal();
        let shipping = policy.fee_for(subtotal);
        Self {
            subtotal,
            shipping,
            total: subtotal + shipping,
        }
    }
}

/// An order row as stored in the `orders` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_number: OrderNumber,
    /// Owning user; `None` for guest orders.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub customer_name: String,
    #[serde(default)]
    pub email: Option<Email>,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub subtotal: Price,
    pub shipping_fee: Price,
    pub total_amount: Price,
    /// Snapshot of the cart at the time of purchase.
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order from the current cart.
    #[must_use]
    pub fn place(
        order_number: OrderNumber,
        user_id: Option<UserId>,
        shipping: ShippingDetails,
        cart: &Cart,
        policy: &ShippingPolicy,
        created_at: DateTime<Utc>,
    ) -> Self {
        let totals = OrderTotals::compute(cart, policy);
        Self {
            order_number,
            user_id,
            customer_name: shipping.full_name,
            email: shipping.email,
            phone: shipping.phone,
            address: shipping.address,
            city: shipping.city,
            country: shipping.country,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping,
            total_amount: totals.total,
            items: cart.items().to_vec(),
            status: OrderStatus::Pending,
            created_at,
        }
    }

    /// Whether the order was placed without an account.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    /// Total units in the order.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::id::ProductId;
    use crate::types::product::{Category, Product};

    fn product(id: i64, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Record {id}"),
            price: price.parse().unwrap(),
            category: Category::Vinyl,
            images: vec![format!("https://img/{id}.jpg")],
            description: None,
            sku: None,
        }
    }

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            full_name: "Ana Petrovska".to_owned(),
            phone: "+38970000000".to_owned(),
            address: "Shirok Sokak 1".to_owned(),
            city: ShippingDetails::DEFAULT_CITY.to_owned(),
            country: ShippingDetails::DEFAULT_COUNTRY.to_owned(),
            email: None,
        }
    }

    #[test]
    fn test_totals_free_shipping_above_threshold() {
        let mut cart = Cart::new();
        cart.add(product(1, "20.00"), 2).unwrap();
        cart.add(product(2, "15.00"), 1).unwrap();

        let totals = OrderTotals::compute(&cart, &ShippingPolicy::default());
        assert_eq!(totals.subtotal, "55.00".parse().unwrap());
        assert_eq!(totals.shipping, Price::ZERO);
        assert_eq!(totals.total, "55.00".parse().unwrap());
    }

    #[test]
    fn test_totals_flat_fee_below_threshold() {
        let mut cart = Cart::new();
        cart.add(product(1, "30.00"), 1).unwrap();

        let totals = OrderTotals::compute(&cart, &ShippingPolicy::default());
        assert_eq!(totals.shipping, "5.00".parse().unwrap());
        assert_eq!(totals.total, "35.00".parse().unwrap());
    }

    #[test]
    fn test_place_snapshots_cart_as_pending_guest_order() {
        let mut cart = Cart::new();
        cart.add(product(1, "30.00"), 1).unwrap();

        let order = Order::place(
            OrderNumber::from_value(123_456),
            None,
            shipping(),
            &cart,
            &ShippingPolicy::default(),
            Utc::now(),
        );

        assert!(order.is_guest());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items, cart.items());
        assert_eq!(order.customer_name, "Ana Petrovska");
        assert_eq!(order.total_amount, "35.00".parse().unwrap());
    }

    #[test]
    fn test_order_row_serializes_backend_columns() {
        let mut cart = Cart::new();
        cart.add(product(1, "20.00"), 1).unwrap();
        let user = UserId::generate();

        let order = Order::place(
            OrderNumber::from_value(654_321),
            Some(user),
            shipping(),
            &cart,
            &ShippingPolicy::default(),
            Utc::now(),
        );
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["order_number"], "654321");
        assert_eq!(json["user_id"], user.to_string());
        assert_eq!(json["shipping_fee"], "5");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["items"][0]["quantity"], 1);
    }
}
