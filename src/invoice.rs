//! The canonical invoice entity and the raw structuring envelope.
//!
//! [`ExtractedInvoiceData`] mirrors the schema the structuring prompt asks the
//! LLM for. The model is not guaranteed to respect the `number|string` hints
//! of that schema, so every leaf is a [`FieldValue`] that keeps whatever JSON
//! scalar the upstream produced. Nothing here fills in defaults: a field is
//! either upstream content or `None`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single leaf value exactly as the upstream produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    /// An object or array where the schema asks for a scalar, such as an
    /// address split into parts. Kept as-is.
    Other(Value),
}

impl FieldValue {
    /// The value as text, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a number. Numeric text (`"1234.50"`) is parsed too; text
    /// with thousands separators or currency symbols is not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) | FieldValue::Other(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po_number: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_number: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_reference: Option<FieldValue>,
}

/// One row of the invoice body, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_no: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_total: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_total: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustments: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_in_words: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iban_ifsc_swift: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_instructions: Option<FieldValue>,
}

/// Structured invoice data, in either the document's language or English.
///
/// Keys the schema does not know about are kept in [`extra`](Self::extra) so
/// serialising a value never loses upstream content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInvoiceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_details: Option<InvoiceDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_details: Option<SupplierDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_details: Option<BankDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractedInvoiceData {
    pub fn line_item_count(&self) -> usize {
        self.line_items.as_ref().map_or(0, Vec::len)
    }

    pub fn invoice_number(&self) -> Option<&FieldValue> {
        self.invoice_details
            .as_ref()
            .and_then(|d| d.invoice_number.as_ref())
    }
}

/// The full, un-normalised structuring response.
///
/// Opaque to this crate except for [`without_raw`](Self::without_raw), the
/// one mutation applied before the envelope is sent for translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEnvelope(Value);

impl RawEnvelope {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Whether `data.raw` is present.
    pub fn has_raw(&self) -> bool {
        self.0
            .get("data")
            .and_then(Value::as_object)
            .is_some_and(|data| data.contains_key("raw"))
    }

    /// A copy of the envelope with `data.raw` removed. Every other key,
    /// including the siblings of `raw` under `data`, is left untouched.
    pub fn without_raw(&self) -> Value {
        let mut value = self.0.clone();
        if let Some(data) = value.get_mut("data").and_then(Value::as_object_mut) {
            data.remove("raw");
        }
        value
    }
}

impl From<Value> for RawEnvelope {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
