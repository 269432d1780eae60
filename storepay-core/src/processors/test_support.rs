//! Record builders shared by processor tests.

use crate::entities::payment_records::{CartLine, PaymentRecord};
use crate::entities::{GatewayName, PaymentStatus};
use crate::framework::memory::MemoryProcessor;
use rust_decimal::Decimal;
use sqlx::types::Json;
use time::macros::datetime;
use uuid::Uuid;

pub const USER: Uuid = Uuid::from_u128(0x0191_0000_0000_7000_8000_0000_0000_0001);

pub fn cart_line(product_id: &str, quantity: u32, unit_price: i64) -> CartLine {
    CartLine {
        product_id: product_id.to_string(),
        variant_id: None,
        quantity,
        unit_price: Decimal::from(unit_price),
        name: None,
    }
}

pub fn initialized_record(reference: &str, amount_minor: i64, cart: Vec<CartLine>) -> PaymentRecord {
    PaymentRecord {
        id: 0,
        reference: reference.to_string(),
        user_id: USER,
        email: "buyer@example.com".to_string(),
        gateway: GatewayName::Paystack,
        amount_minor,
        currency: "NGN".to_string(),
        status: PaymentStatus::Initialized,
        cart: Json(cart),
        meta: None,
        provider_reference: None,
        gateway_response: None,
        paid_at: None,
        repair_attempts: 0,
        repair_error: None,
        repair_blocked_at: None,
        created_at: datetime!(2025-01-01 00:00:00),
        updated_at: datetime!(2025-01-01 00:00:00),
    }
}

pub fn paid_record(reference: &str, amount_minor: i64, cart: Vec<CartLine>) -> PaymentRecord {
    PaymentRecord {
        status: PaymentStatus::Paid,
        paid_at: Some(datetime!(2025-01-01 00:05:00)),
        ..initialized_record(reference, amount_minor, cart)
    }
}

/// Put a record straight into the ledger, bypassing checkout.
pub fn seed(ledger: &MemoryProcessor, record: PaymentRecord) {
    let mut state = ledger.state();
    state.next_id += 1;
    let record = PaymentRecord {
        id: state.next_id,
        ..record
    };
    state.payments.insert(record.reference.clone(), record);
}
