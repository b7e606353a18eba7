//! # Validation Module
//!
//! Field-level input validation for the back office.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (axum)                                          │
//! │  ├── Type validation (JSON / query deserialization)                    │
//! │  └── THIS MODULE: field rules (lengths, ranges, formats)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: payment_validation                                           │
//! │  └── Business preconditions (open register, balances, debt)            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints (one open register, lab name, document)        │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use optica_core::validation::{validate_quantity, validate_document_number};
//!
//! validate_quantity(2).unwrap();
//! assert!(validate_document_number("30.111.222").is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::{
    LaboratoryInput, LegacyClientUpdate, NewCheck, NewLegacyClient, NewOrder, NewOrderItem,
    PageRequest,
};
use crate::{
    MAX_AMOUNT_CENTS, MAX_INSTALLMENTS, MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS, MAX_PER_PAGE,
    MAX_PRICE_CENTS, MAX_RATE_BPS,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `max` characters
pub fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an optional free-text field: only the length is checked.
pub fn validate_optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.trim().chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates a person or company name (1-120 characters).
///
/// ```rust
/// use optica_core::validation::validate_name;
///
/// assert!(validate_name("client_name", "María González").is_ok());
/// assert!(validate_name("client_name", "  ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    validate_required_text(field, name, 120)
}

/// Validates an email address.
///
/// Only the shape is checked: one `@`, a non-empty local part and a
/// domain containing a dot.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must be a valid email address".to_string(),
    };

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Digits plus `+`, `-`, spaces and parentheses
/// - 6 to 20 digits
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, '+', '-' and parentheses".to_string(),
        });
    }

    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !(6..=20).contains(&digits) {
        return Err(ValidationError::OutOfRange {
            field: "phone digits".to_string(),
            min: 6,
            max: 20,
        });
    }

    Ok(())
}

/// Validates a national document number (DNI/CUIT style).
///
/// Dots and hyphens are accepted as separators; 6 to 11 digits.
///
/// ```rust
/// use optica_core::validation::validate_document_number;
///
/// assert!(validate_document_number("20-30111222-3").is_ok());
/// assert!(validate_document_number("ABC").is_err());
/// ```
pub fn validate_document_number(document: &str) -> ValidationResult<()> {
    let document = document.trim();

    if document.is_empty() {
        return Err(ValidationError::Required {
            field: "document_number".to_string(),
        });
    }

    if !document
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "document_number".to_string(),
            reason: "must contain only digits, dots and hyphens".to_string(),
        });
    }

    let digits = document.chars().filter(char::is_ascii_digit).count();
    if digits < 6 {
        return Err(ValidationError::TooShort {
            field: "document_number".to_string(),
            min: 6,
        });
    }
    if digits > 11 {
        return Err(ValidationError::TooLong {
            field: "document_number".to_string(),
            max: 11,
        });
    }

    Ok(())
}

/// Strips separators so `30.111.222` and `30111222` compare equal.
pub fn normalize_document_number(document: &str) -> String {
    document.chars().filter(char::is_ascii_digit).collect()
}

/// Validates a search query and returns it trimmed.
///
/// Empty queries are allowed (no filtering). Maximum 100 characters.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a balance or debt in cents. Zero is allowed, up to
/// MAX_AMOUNT_CENTS.
///
/// ```rust
/// use optica_core::validation::validate_non_negative_cents;
///
/// assert!(validate_non_negative_cents("initial_debt", 0).is_ok());
/// assert!(validate_non_negative_cents("initial_debt", -100).is_err());
/// ```
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    validate_cents_range(field, cents, 0, MAX_AMOUNT_CENTS)
}

/// Validates an order line unit price: 0 to MAX_PRICE_CENTS.
pub fn validate_unit_price(cents: i64) -> ValidationResult<()> {
    validate_cents_range("items.unit_price", cents, 0, MAX_PRICE_CENTS)
}

/// Validates a payment amount in cents. Must be > 0 and at most
/// MAX_AMOUNT_CENTS.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    validate_cents_range("amount", cents, 1, MAX_AMOUNT_CENTS)
}

fn validate_cents_range(field: &str, cents: i64, min: i64, max: i64) -> ValidationResult<()> {
    if cents < min || cents > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        });
    }

    Ok(())
}

/// Validates an order discount against its subtotal.
pub fn validate_discount(discount_cents: i64, subtotal_cents: i64) -> ValidationResult<()> {
    if discount_cents < 0 || discount_cents > subtotal_cents {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: subtotal_cents.max(0),
        });
    }

    Ok(())
}

/// Validates a credit card installment request.
///
/// ## Rules
/// - 1 to MAX_INSTALLMENTS (24) installments
/// - Interest between 0 and 10000 bps
pub fn validate_installments(count: u32, interest_bps: u32) -> ValidationResult<()> {
    if count == 0 || count > MAX_INSTALLMENTS {
        return Err(ValidationError::OutOfRange {
            field: "installments.count".to_string(),
            min: 1,
            max: MAX_INSTALLMENTS as i64,
        });
    }

    if interest_bps > MAX_RATE_BPS {
        return Err(ValidationError::OutOfRange {
            field: "installments.interest_bps".to_string(),
            min: 0,
            max: MAX_RATE_BPS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates the bank check attached to a check payment.
pub fn validate_check(check: &NewCheck) -> ValidationResult<()> {
    validate_required_text("check.bank", &check.bank, 80)?;
    validate_required_text("check.check_number", &check.check_number, 30)?;

    if !check.check_number.trim().chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "check.check_number".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    validate_optional_text("check.issuer", check.issuer.as_deref(), 120)
}

fn validate_order_item(item: &NewOrderItem) -> ValidationResult<()> {
    validate_required_text("items.product_name", &item.product_name, 200)?;
    validate_optional_text("items.description", item.description.as_deref(), 500)?;
    validate_quantity(item.quantity)?;
    validate_unit_price(item.unit_price_cents)?;
    item.line_total().map(|_| ())
}

/// Validates a new order: client, items and discount.
pub fn validate_new_order(order: &NewOrder) -> ValidationResult<()> {
    validate_name("client_name", &order.client_name)?;
    validate_required_text("employee_id", &order.employee_id, 64)?;
    if let Some(phone) = order.client_phone.as_deref() {
        validate_phone(phone)?;
    }
    if let Some(document) = order.client_document.as_deref() {
        validate_document_number(document)?;
    }
    if let Some(lab) = order.laboratory_id.as_deref() {
        validate_uuid(lab)?;
    }
    validate_optional_text("notes", order.notes.as_deref(), 1000)?;

    if order.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if order.items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }
    for item in &order.items {
        validate_order_item(item)?;
    }

    let subtotal = order.subtotal()?;
    validate_non_negative_cents("subtotal", subtotal.cents())?;
    validate_discount(order.discount_cents, subtotal.cents())
}

/// Validates laboratory data for create and update.
pub fn validate_laboratory(input: &LaboratoryInput) -> ValidationResult<()> {
    validate_name("name", &input.name)?;
    validate_optional_text("contact_name", input.contact_name.as_deref(), 120)?;
    if let Some(email) = input.email.as_deref() {
        validate_email(email)?;
    }
    if let Some(phone) = input.phone.as_deref() {
        validate_phone(phone)?;
    }
    validate_optional_text("street", input.street.as_deref(), 200)?;
    validate_optional_text("city", input.city.as_deref(), 100)?;
    validate_optional_text("province", input.province.as_deref(), 100)?;
    validate_optional_text("postal_code", input.postal_code.as_deref(), 10)?;
    validate_optional_text("notes", input.notes.as_deref(), 1000)
}

/// Validates an imported legacy client.
pub fn validate_new_legacy_client(input: &NewLegacyClient) -> ValidationResult<()> {
    validate_name("first_name", &input.first_name)?;
    validate_name("last_name", &input.last_name)?;
    validate_document_number(&input.document_number)?;
    if let Some(email) = input.email.as_deref() {
        validate_email(email)?;
    }
    if let Some(phone) = input.phone.as_deref() {
        validate_phone(phone)?;
    }
    validate_non_negative_cents("initial_debt", input.initial_debt_cents)?;
    validate_optional_text("notes", input.notes.as_deref(), 1000)
}

pub fn validate_legacy_client_update(input: &LegacyClientUpdate) -> ValidationResult<()> {
    validate_name("first_name", &input.first_name)?;
    validate_name("last_name", &input.last_name)?;
    if let Some(email) = input.email.as_deref() {
        validate_email(email)?;
    }
    if let Some(phone) = input.phone.as_deref() {
        validate_phone(phone)?;
    }
    validate_optional_text("notes", input.notes.as_deref(), 1000)
}

// =============================================================================
// Pagination
// =============================================================================

/// Validates a page request (`page >= 1`, `per_page` 1..=100).
pub fn validate_page(request: &PageRequest) -> ValidationResult<()> {
    if request.page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if request.per_page == 0 || request.per_page > MAX_PER_PAGE {
        return Err(ValidationError::OutOfRange {
            field: "per_page".to_string(),
            min: 1,
            max: MAX_PER_PAGE as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ```rust
/// use optica_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn item(qty: i64, price: i64) -> NewOrderItem {
        NewOrderItem {
            product_name: "Progressive lens".to_string(),
            description: Some("OD +1.25 OI +1.50".to_string()),
            quantity: qty,
            unit_price_cents: price,
        }
    }

    fn order(items: Vec<NewOrderItem>, discount: i64) -> NewOrder {
        NewOrder {
            client_name: "María González".to_string(),
            client_phone: Some("+54 11 4567-8900".to_string()),
            client_document: None,
            employee_id: "emp-1".to_string(),
            laboratory_id: None,
            discount_cents: discount,
            notes: None,
            items,
        }
    }

    #[test]
    fn test_validate_required_text() {
        assert!(validate_required_text("bank", "Galicia", 80).is_ok());
        assert!(validate_required_text("bank", "   ", 80).is_err());
        assert!(validate_required_text("bank", &"x".repeat(81), 80).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("lab@opticas.com.ar").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@domain.com").is_err());
        assert!(validate_email("a@nodot").is_err());
        assert!(validate_email("a b@x.com").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+54 (11) 4567-8900").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("11-abc-123").is_err());
    }

    #[test]
    fn test_validate_document_number() {
        assert!(validate_document_number("30111222").is_ok());
        assert!(validate_document_number("30.111.222").is_ok());
        assert!(validate_document_number("").is_err());
        assert!(validate_document_number("123").is_err());
        assert!(validate_document_number("123456789012").is_err());
        assert_eq!(normalize_document_number("30.111.222"), "30111222");
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_installments() {
        assert!(validate_installments(1, 0).is_ok());
        assert!(validate_installments(24, 10_000).is_ok());
        assert!(validate_installments(0, 0).is_err());
        assert!(validate_installments(25, 0).is_err());
        assert!(validate_installments(3, 10_001).is_err());
    }

    #[test]
    fn test_validate_check() {
        let check = NewCheck {
            bank: "Banco Nación".to_string(),
            check_number: "00012345".to_string(),
            issuer: None,
            due_date: NaiveDate::from_ymd_opt(2026, 11, 30).unwrap(),
        };
        assert!(validate_check(&check).is_ok());

        let bad = NewCheck {
            check_number: "12-AB".to_string(),
            ..check.clone()
        };
        assert!(validate_check(&bad).is_err());

        let no_bank = NewCheck {
            bank: String::new(),
            ..check
        };
        assert!(validate_check(&no_bank).is_err());
    }

    #[test]
    fn test_validate_new_order() {
        assert!(validate_new_order(&order(vec![item(2, 15_000)], 5_000)).is_ok());
        assert!(validate_new_order(&order(vec![], 0)).is_err());
        // Discount larger than subtotal
        assert!(validate_new_order(&order(vec![item(1, 1_000)], 1_001)).is_err());
        assert!(validate_new_order(&order(vec![item(0, 1_000)], 0)).is_err());
        assert!(validate_new_order(&order(vec![item(1, -5)], 0)).is_err());
    }

    #[test]
    fn test_validate_new_order_bounds_amounts() {
        assert!(validate_new_order(&order(vec![item(1, MAX_PRICE_CENTS)], 0)).is_ok());
        assert!(validate_new_order(&order(vec![item(1, MAX_PRICE_CENTS + 1)], 0)).is_err());

        // Would overflow i64 if multiplied unchecked
        let huge = order(vec![item(2, i64::MAX / 2 + 1)], 0);
        assert!(matches!(
            validate_new_order(&huge),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(huge.subtotal().is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(MAX_AMOUNT_CENTS).is_ok());
        assert!(validate_payment_amount(0).is_err());
        assert!(validate_payment_amount(MAX_AMOUNT_CENTS + 1).is_err());
        assert!(validate_non_negative_cents("initial_debt", i64::MAX).is_err());
    }

    #[test]
    fn test_validate_page() {
        assert!(validate_page(&PageRequest::new(1, 20)).is_ok());
        assert!(validate_page(&PageRequest::new(1, 100)).is_ok());
        assert!(validate_page(&PageRequest::new(0, 20)).is_err());
        assert!(validate_page(&PageRequest::new(1, 0)).is_err());
        assert!(validate_page(&PageRequest::new(1, 101)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
