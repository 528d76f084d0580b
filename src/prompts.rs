//! The extraction instruction sent to the structuring service.
//!
//! Keeping the prompt here rather than inline in the stage means it can be
//! inspected in tests and overridden through
//! [`crate::config::ExtractorConfig::structuring_prompt`] without touching
//! transport code.

/// Default instruction for turning analysis markdown into invoice JSON.
///
/// `None` is the nullability marker the model is told to use. The text is
/// sent verbatim in the `prompt` form field.
pub const INVOICE_STRUCTURING_PROMPT: &str = r#"You are an invoice-structuring model. 

Input: You will receive full OCR-extracted Markdown from Azure Read (including headings, tables, blocks, bullets, repeated text, and noise). 

Goal: Parse and interpret the Markdown and convert it into a clean JSON object following the schema below. 

Guidelines:

Do NOT translate any values.

Use extracted text exactly as found, even if noisy.

If a field is missing, return None.

Detect the document's language from the Markdown and return the ISO code in source_language.

Do not guess or infer values that are not present.

Create as many line_items as present in the Markdown tables or text.

Keep all numbers unformatted (no commas).

Keep date formats exactly as found.

Output ONLY the JSON. No explanation.

{
  "document_type": "invoice",
  "source_language": "string",
  "invoice_details": {
    "invoice_number": "string|None",
    "invoice_date": "string|None",
    "due_date": "string|None",
    "po_number": "string|None",
    "contract_number": "string|None",
    "currency": "string|None",
    "payment_terms": "string|None"
  },
  "supplier_details": {
    "name": "string|None",
    "address": "string|None",
    "tax_id": "string|None",
    "email": "string|None",
    "phone": "string|None",
    "website": "string|None"
  },
  "customer_details": {
    "name": "string|None",
    "address": "string|None",
    "tax_id": "string|None",
    "customer_reference": "string|None"
  },
  "line_items": [
    {
      "line_no": "number|None",
      "description": "string|None",
      "quantity": "number|None",
      "unit": "string|None",
      "unit_price": "number|None",
      "tax_rate": "number|None",
      "tax_amount": "number|None",
      "line_total": "number|None"
    }
  ],
  "summary": {
    "subtotal": "number|None",
    "tax_total": "number|None",
    "shipping": "number|None",
    "adjustments": "number|None",
    "total_amount": "number|None",
    "amount_in_words": "string|None"
  },
  "bank_details": {
    "bank_name": "string|None",
    "account_number": "string|None",
    "iban_ifsc_swift": "string|None",
    "branch": "string|None",
    "payment_instructions": "string|None"
  }
}"#;
