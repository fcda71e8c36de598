//! Property-based tests for the shared OAuth wire documents.

use proptest::prelude::*;

use mcp_split_oauth::metadata::{Audience, IntrospectionResponse};

fn arb_aud_entry() -> impl Strategy<Value = String> {
    "https?://[a-z0-9.-]{1,20}(:[0-9]{2,5})?"
}

proptest! {
    /// A single audience serializes as a bare JSON string and survives the
    /// round trip.
    #[test]
    fn single_audience_is_bare_string(entry in arb_aud_entry()) {
        let aud = Audience::Single(entry.clone());
        let value = serde_json::to_value(&aud).expect("serialize");
        prop_assert_eq!(&value, &serde_json::Value::String(entry.clone()));

        let decoded: Audience = serde_json::from_value(value).expect("deserialize");
        prop_assert_eq!(decoded.entries().collect::<Vec<_>>(), vec![entry.as_str()]);
    }

    /// Audience lists round trip with order preserved.
    #[test]
    fn audience_list_roundtrip(entries in proptest::collection::vec(arb_aud_entry(), 1..4)) {
        let aud = Audience::Many(entries.clone());
        let value = serde_json::to_value(&aud).expect("serialize");
        let decoded: Audience = serde_json::from_value(value).expect("deserialize");

        let got: Vec<&str> = decoded.entries().collect();
        let want: Vec<&str> = entries.iter().map(String::as_str).collect();
        prop_assert_eq!(got, want);
    }

    /// Introspection responses keep their claims through serialization.
    #[test]
    fn introspection_roundtrip(
        active in any::<bool>(),
        scope in proptest::option::of("[a-z ]{1,20}"),
        exp in proptest::option::of(0i64..4_000_000_000i64),
    ) {
        let response = IntrospectionResponse {
            active,
            client_id: Some("client-abc".to_string()),
            scope: scope.clone(),
            exp,
            iat: None,
            token_type: Some("Bearer".to_string()),
            aud: None,
        };
        let value = serde_json::to_value(&response).expect("serialize");
        let decoded: IntrospectionResponse = serde_json::from_value(value).expect("deserialize");

        prop_assert_eq!(decoded.active, active);
        prop_assert_eq!(decoded.scope, scope);
        prop_assert_eq!(decoded.exp, exp);
    }
}

#[test]
fn inactive_serializes_to_bare_flag() {
    let value = serde_json::to_value(IntrospectionResponse::inactive()).unwrap();
    assert_eq!(value, serde_json::json!({"active": false}));
}

#[test]
fn audience_deserializes_from_both_wire_shapes() {
    let single: Audience =
        serde_json::from_value(serde_json::json!("http://localhost:8080")).unwrap();
    assert_eq!(single.entries().collect::<Vec<_>>(), vec!["http://localhost:8080"]);

    let many: Audience = serde_json::from_value(serde_json::json!(["a", "b"])).unwrap();
    assert_eq!(many.entries().count(), 2);
}
