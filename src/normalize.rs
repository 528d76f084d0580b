//! Response normalizer: find the invoice object inside whatever envelope the
//! upstream chose to wrap it in.
//!
//! The structuring and translation services are LLM front ends, and neither
//! returns one stable shape. Depending on the day the invoice arrives as
//! `{"data":{"Answer":{…}}}`, one level deeper under `data.data.Answer`, as a
//! JSON *string* under `response`, bare, or inside a ```` ```json ```` fence
//! surrounded by prose.
//!
//! Normalisation runs in two independent steps:
//!
//! 1. [`parse_lenient`] turns text into a JSON value: a direct parse first,
//!    then fence stripping plus first-`{`…last-`}` extraction.
//! 2. [`resolve`] walks an ordered [`ResolutionTable`] and returns the first
//!    rule that matches. The tables are plain `'static` data so the accepted
//!    shapes can be read (and tested) in one place.

use crate::error::{ExtractError, Stage};
use crate::invoice::ExtractedInvoiceData;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// One accepted envelope shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionRule {
    /// Dotted form of `path`, used in logs and errors.
    pub name: &'static str,
    /// Object keys to follow from the root.
    pub path: &'static [&'static str],
    /// When the value found is a string, parse it as JSON instead of
    /// rejecting it.
    pub reparse_string: bool,
    /// Only accept an object that carries a known invoice key; otherwise
    /// move on to the next rule. Set on the generic wrappers, which error
    /// envelopes also use.
    pub require_invoice_keys: bool,
}

/// What to do when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Treat the root itself as the invoice, provided it is an object that
    /// carries at least one known invoice key.
    WholeValue,
    /// Fail with [`ExtractError::UnexpectedResponseShape`].
    Reject,
}

/// An ordered list of rules plus the behaviour when none match.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionTable {
    pub rules: &'static [ResolutionRule],
    pub fallback: Fallback,
}

/// Shapes produced by the structuring service.
pub const STRUCTURING_TABLE: ResolutionTable = ResolutionTable {
    rules: &[
        ResolutionRule {
            name: "data.Answer",
            path: &["data", "Answer"],
            reparse_string: false,
            require_invoice_keys: false,
        },
        ResolutionRule {
            name: "data.data.Answer",
            path: &["data", "data", "Answer"],
            reparse_string: false,
            require_invoice_keys: false,
        },
        ResolutionRule {
            name: "response",
            path: &["response"],
            reparse_string: true,
            require_invoice_keys: true,
        },
        ResolutionRule {
            name: "data",
            path: &["data"],
            reparse_string: true,
            require_invoice_keys: true,
        },
        ResolutionRule {
            name: "result",
            path: &["result"],
            reparse_string: true,
            require_invoice_keys: true,
        },
    ],
    fallback: Fallback::WholeValue,
};

/// Shapes produced by the translation service. Deepest nesting first.
pub const TRANSLATION_TABLE: ResolutionTable = ResolutionTable {
    rules: &[
        ResolutionRule {
            name: "data.data.Answer",
            path: &["data", "data", "Answer"],
            reparse_string: false,
            require_invoice_keys: false,
        },
        ResolutionRule {
            name: "data.Answer",
            path: &["data", "Answer"],
            reparse_string: false,
            require_invoice_keys: false,
        },
        ResolutionRule {
            name: "Answer",
            path: &["Answer"],
            reparse_string: false,
            require_invoice_keys: false,
        },
    ],
    fallback: Fallback::Reject,
};

/// Top-level keys that mark an unwrapped object as invoice data.
const INVOICE_KEYS: &[&str] = &[
    "document_type",
    "source_language",
    "invoice_details",
    "supplier_details",
    "customer_details",
    "line_items",
    "summary",
    "bank_details",
];

/// How [`parse_lenient`] obtained its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// The whole body was valid JSON.
    Direct,
    /// JSON was cut out of fenced or prose-wrapped text.
    Extracted,
}

/// The invoice object together with the rule that located it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Rule name, or `"<root>"` when the fallback was used.
    pub rule: &'static str,
    pub value: Value,
}

static RE_LEADING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^```(?:json)?").unwrap());
static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```$").unwrap());

/// Parse an upstream body as JSON, tolerating code fences and prose.
///
/// Errors are reported against [`Stage::Structuring`]; callers in other
/// stages relabel them.
pub fn parse_lenient(raw: &str) -> Result<(Value, ParseStrategy), ExtractError> {
    let direct_err = match serde_json::from_str::<Value>(raw) {
        Ok(value) => return Ok((value, ParseStrategy::Direct)),
        Err(e) => e,
    };
    debug!("Direct JSON parse failed ({direct_err}); trying text extraction");

    let candidate = extract_json_candidate(raw);
    serde_json::from_str::<Value>(candidate)
        .map(|value| (value, ParseStrategy::Extracted))
        .map_err(|e| ExtractError::MalformedResponse {
            stage: Stage::Structuring,
            detail: format!("{e} (body starts with {:?})", preview(raw, 80)),
        })
}

/// Strip leading/trailing fences, then keep the first `{` to the last `}`.
fn extract_json_candidate(raw: &str) -> &str {
    let mut s = raw.trim();
    if s.contains("```") {
        if let Some(m) = RE_LEADING_FENCE.find(s) {
            s = &s[m.end()..];
        }
        if let Some(m) = RE_TRAILING_FENCE.find(s) {
            s = &s[..m.start()];
        }
        s = s.trim();
    }

    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => s,
    }
}

/// Locate the invoice object inside `value` using `table`.
pub fn resolve(value: &Value, table: &ResolutionTable) -> Result<Resolved, ExtractError> {
    for rule in table.rules {
        let Some(found) = lookup(value, rule.path).filter(|v| is_present(v)) else {
            continue;
        };

        let candidate = match found {
            Value::String(s) if rule.reparse_string => {
                parse_lenient(s)
                    .map_err(|e| match e {
                        ExtractError::MalformedResponse { stage, detail } => {
                            ExtractError::MalformedResponse {
                                stage,
                                detail: format!("'{}' holds a string that is not JSON: {detail}", rule.name),
                            }
                        }
                        other => other,
                    })?
                    .0
            }
            other => other.clone(),
        };

        if !candidate.is_object() {
            return Err(ExtractError::UnexpectedResponseShape {
                stage: Stage::Structuring,
                detail: format!(
                    "'{}' resolved to {}, expected an object",
                    rule.name,
                    kind(&candidate)
                ),
            });
        }

        if rule.require_invoice_keys && !looks_like_invoice(&candidate) {
            debug!("'{}' holds an object without invoice keys, skipping", rule.name);
            continue;
        }

        return Ok(Resolved {
            rule: rule.name,
            value: candidate,
        });
    }

    match table.fallback {
        Fallback::WholeValue if looks_like_invoice(value) => Ok(Resolved {
            rule: "<root>",
            value: value.clone(),
        }),
        _ => Err(ExtractError::UnexpectedResponseShape {
            stage: Stage::Structuring,
            detail: describe_shape(value, table),
        }),
    }
}

/// Normalise a structuring response body into invoice data.
pub fn normalize(raw: &str) -> Result<ExtractedInvoiceData, ExtractError> {
    let (value, _) = parse_lenient(raw)?;
    normalize_value(&value, &STRUCTURING_TABLE)
}

/// Resolve an already-parsed body with `table` and deserialise the result.
pub fn normalize_value(
    value: &Value,
    table: &ResolutionTable,
) -> Result<ExtractedInvoiceData, ExtractError> {
    let resolved = resolve(value, table)?;
    debug!("Invoice object located via '{}'", resolved.rule);
    into_invoice(resolved.value)
}

fn into_invoice(value: Value) -> Result<ExtractedInvoiceData, ExtractError> {
    serde_json::from_value(value).map_err(|e| ExtractError::UnexpectedResponseShape {
        stage: Stage::Structuring,
        detail: format!("invoice object does not match the schema: {e}"),
    })
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(key))
}

/// Upstream truthiness: `null`, `false`, `0` and `""` count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn looks_like_invoice(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| INVOICE_KEYS.iter().any(|k| obj.contains_key(*k)))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn describe_shape(value: &Value, table: &ResolutionTable) -> String {
    let tried: Vec<&str> = table.rules.iter().map(|r| r.name).collect();
    match value.as_object() {
        Some(obj) => {
            let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
            format!(
                "no invoice object under [{}]; top-level keys: [{}]",
                tried.join(", "),
                keys.join(", ")
            )
        }
        None => format!(
            "top-level value is {}; tried [{}]",
            kind(value),
            tried.join(", ")
        ),
    }
}

/// First `max` characters of `s`, on a char boundary.
pub(crate) fn preview(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::FieldValue;
    use serde_json::json;

    fn inv1() -> Value {
        json!({
            "document_type": "invoice",
            "source_language": "fr",
            "invoice_details": {"invoice_number": "INV-1"}
        })
    }

    fn norm(raw: &str) -> ExtractedInvoiceData {
        normalize(raw).unwrap_or_else(|e| panic!("normalize failed: {e}"))
    }

    #[test]
    fn data_answer_example() {
        let raw = json!({"data": {"Answer": inv1()}}).to_string();
        let data = norm(&raw);
        assert_eq!(serde_json::to_value(&data).unwrap(), inv1());
    }

    #[test]
    fn all_wrapper_shapes_yield_the_same_object() {
        let expected = norm(&inv1().to_string());
        let shapes = [
            json!({"message": "success", "data": {"Answer": inv1()}}),
            json!({"data": {"data": {"Answer": inv1()}}}),
            json!({"response": inv1()}),
            json!({"response": inv1().to_string()}),
            json!({"data": inv1()}),
            json!({"data": inv1().to_string()}),
            json!({"result": inv1()}),
            json!({"result": inv1().to_string()}),
        ];
        for shape in shapes {
            assert_eq!(norm(&shape.to_string()), expected, "shape: {shape}");
        }
    }

    #[test]
    fn fenced_example() {
        let data = norm("```json\n{\"document_type\":\"invoice\"}\n```");
        assert_eq!(data.document_type.as_deref(), Some("invoice"));
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({"document_type": "invoice"})
        );
    }

    #[test]
    fn prose_around_fence_matches_fenced_content() {
        let body = inv1().to_string();
        let fenced_only = norm(&format!("```json\n{body}\n```"));
        let with_prose = norm(&format!(
            "Here is the extracted invoice:\n```json\n{body}\n```\nLet me know if you need anything else."
        ));
        assert_eq!(with_prose, fenced_only);
    }

    #[test]
    fn uppercase_fence_and_bare_fence() {
        assert!(norm("```JSON\n{\"document_type\":\"invoice\"}\n```").document_type.is_some());
        assert!(norm("```\n{\"document_type\":\"invoice\"}\n```").document_type.is_some());
    }

    #[test]
    fn extracted_envelope_is_still_resolved() {
        let raw = format!("Sure!\n{}", json!({"data": {"Answer": inv1()}}));
        assert_eq!(serde_json::to_value(norm(&raw)).unwrap(), inv1());
    }

    #[test]
    fn parse_strategy_is_reported() {
        let (_, s) = parse_lenient("{\"a\":1}").unwrap();
        assert_eq!(s, ParseStrategy::Direct);
        let (_, s) = parse_lenient("prefix {\"a\":1} suffix").unwrap();
        assert_eq!(s, ParseStrategy::Extracted);
    }

    #[test]
    fn malformed_text_fails() {
        for raw in ["", "no json here", "{ not: json }", "} reversed {"] {
            let err = normalize(raw).unwrap_err();
            assert!(
                matches!(err, ExtractError::MalformedResponse { .. }),
                "{raw:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn double_encoded_string_that_is_not_json_is_malformed() {
        let err = normalize(&json!({"response": "I could not read the invoice"}).to_string())
            .unwrap_err();
        assert!(matches!(err, ExtractError::MalformedResponse { .. }), "{err:?}");
    }

    #[test]
    fn falsy_wrapper_fields_are_skipped() {
        // `response` is empty, so `data` wins.
        let raw = json!({"response": "", "data": inv1()}).to_string();
        assert_eq!(serde_json::to_value(norm(&raw)).unwrap(), inv1());
    }

    #[test]
    fn data_without_answer_falls_through_to_data() {
        let raw = json!({"data": {"document_type": "invoice", "Answer": null}}).to_string();
        assert_eq!(norm(&raw).document_type.as_deref(), Some("invoice"));
    }

    // Unwrapped objects are accepted only when they carry an invoice key.
    #[test]
    fn permissive_fallback_accepts_unwrapped_invoice() {
        let data = norm(&json!({"document_type": "invoice", "line_items": []}).to_string());
        assert_eq!(data.line_item_count(), 0);
        assert!(data.line_items.is_some());
    }

    #[test]
    fn permissive_fallback_rejects_unrelated_objects() {
        for raw in [json!({}), json!({"error": "rate limited"}), json!({"message": "ok"})] {
            let err = normalize(&raw.to_string()).unwrap_err();
            assert!(
                matches!(err, ExtractError::UnexpectedResponseShape { .. }),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn generic_wrappers_skip_objects_without_invoice_keys() {
        for raw in [
            json!({"message": "error", "data": {"error": "model timeout"}}),
            json!({"response": {"status": "queued"}}),
            json!({"result": json!({"error": "quota"}).to_string()}),
        ] {
            let err = normalize(&raw.to_string()).unwrap_err();
            assert!(
                matches!(err, ExtractError::UnexpectedResponseShape { .. }),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn generic_wrapper_without_invoice_keys_falls_through() {
        let raw = json!({"response": {"status": "ok"}, "data": inv1()}).to_string();
        assert_eq!(serde_json::to_value(norm(&raw)).unwrap(), inv1());
    }

    #[test]
    fn structured_leaves_are_kept_verbatim() {
        let raw = json!({"data": {"Answer": {
            "document_type": "invoice",
            "supplier_details": {
                "name": "ACME",
                "address": {"street": "1 Rue", "city": "Paris"},
                "phone": ["+33 1 23", "+33 4 56"]
            }
        }}});
        let data = norm(&raw.to_string());
        let supplier = data.supplier_details.as_ref().unwrap();
        assert_eq!(
            supplier.address,
            Some(FieldValue::Other(json!({"street": "1 Rue", "city": "Paris"})))
        );
        assert_eq!(supplier.address.as_ref().and_then(FieldValue::as_str), None);
        assert_eq!(
            supplier.phone.as_ref().map(ToString::to_string).as_deref(),
            Some(r#"["+33 1 23","+33 4 56"]"#)
        );
        assert_eq!(serde_json::to_value(&data).unwrap(), raw["data"]["Answer"]);
    }

    #[test]
    fn non_object_roots_are_rejected() {
        for raw in ["[1,2,3]", "\"text\"", "42", "null"] {
            let err = normalize(raw).unwrap_err();
            assert!(
                matches!(err, ExtractError::UnexpectedResponseShape { .. }),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn wrapper_holding_a_non_object_is_rejected() {
        let err = normalize(&json!({"data": {"Answer": [1, 2]}}).to_string()).unwrap_err();
        match err {
            ExtractError::UnexpectedResponseShape { detail, .. } => {
                assert!(detail.contains("data.Answer"), "{detail}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn schema_mismatch_is_unexpected_shape() {
        let err = normalize(&json!({"document_type": "invoice", "line_items": "none"}).to_string())
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnexpectedResponseShape { .. }));
    }

    #[test]
    fn translation_table_prefers_deepest_answer() {
        let value = json!({
            "Answer": {"document_type": "shallow"},
            "data": {
                "Answer": {"document_type": "middle"},
                "data": {"Answer": {"document_type": "deep"}}
            }
        });
        let r = resolve(&value, &TRANSLATION_TABLE).unwrap();
        assert_eq!(r.rule, "data.data.Answer");
        assert_eq!(r.value["document_type"], "deep");
    }

    #[test]
    fn translation_table_never_falls_back() {
        let err = resolve(&inv1(), &TRANSLATION_TABLE).unwrap_err();
        assert!(matches!(err, ExtractError::UnexpectedResponseShape { .. }));
    }

    #[test]
    fn structuring_table_order() {
        let names: Vec<&str> = STRUCTURING_TABLE.rules.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            ["data.Answer", "data.data.Answer", "response", "data", "result"]
        );
        assert_eq!(STRUCTURING_TABLE.fallback, Fallback::WholeValue);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("abc", 10), "abc");
    }
}
