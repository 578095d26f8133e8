//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random CDF data that keeps the
//! record invariants (values always match their declared types).

use crate::fixtures::{fixture_uuid, RecordBuilder};
use contenthub_cdf::{AttributeType, BaseType, CdfDocument, CdfRecord};
use proptest::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

/// Strategy for generating UUIDs.
pub fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Strategy for generating attribute base types.
pub fn base_type_strategy() -> impl Strategy<Value = BaseType> {
    prop_oneof![
        Just(BaseType::String),
        Just(BaseType::Integer),
        Just(BaseType::Number),
        Just(BaseType::Boolean),
        Just(BaseType::Reference),
    ]
}

/// Strategy for generating attribute types, scalar or array.
pub fn attribute_type_strategy() -> impl Strategy<Value = AttributeType> {
    (base_type_strategy(), any::<bool>()).prop_map(|(base, array)| {
        if array {
            AttributeType::Array(base)
        } else {
            AttributeType::Scalar(base)
        }
    })
}

/// Strategy for a single value of `base`.
pub fn base_value_strategy(base: BaseType) -> BoxedStrategy<Value> {
    match base {
        BaseType::String => "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from).boxed(),
        BaseType::Integer => any::<i64>().prop_map(Value::from).boxed(),
        BaseType::Number => (-1.0e6f64..1.0e6).prop_map(|n| json!(n)).boxed(),
        BaseType::Boolean => any::<bool>().prop_map(Value::from).boxed(),
        BaseType::Reference => uuid_strategy().prop_map(|u| json!(u.to_string())).boxed(),
    }
}

/// Strategy for a value conforming to `attr_type`.
pub fn attribute_value_strategy(attr_type: AttributeType) -> BoxedStrategy<Value> {
    match attr_type {
        AttributeType::Scalar(base) => base_value_strategy(base),
        AttributeType::Array(base) => prop::collection::vec(base_value_strategy(base), 0..4)
            .prop_map(Value::Array)
            .boxed(),
    }
}

/// Strategy for a typed attribute as `(type, value)`.
pub fn typed_value_strategy() -> impl Strategy<Value = (AttributeType, Value)> {
    attribute_type_strategy().prop_flat_map(|ty| attribute_value_strategy(ty).prop_map(move |v| (ty, v)))
}

/// Strategy for records with random attributes.
pub fn record_strategy() -> impl Strategy<Value = CdfRecord> {
    (
        uuid_strategy(),
        prop_oneof![Just("node"), Just("taxonomy_term"), Just("paragraph")],
        prop::collection::btree_map("field_[a-z]{1,8}", typed_value_strategy(), 0..6),
    )
        .prop_map(|(uuid, record_type, attributes)| {
            attributes
                .into_iter()
                .fold(RecordBuilder::new(uuid, record_type), |builder, (name, (ty, value))| {
                    builder.attribute(&name, ty, value)
                })
                .build()
        })
}

/// A random reference graph over `fixture_uuid(0..size)`.
///
/// Every third record is a `paragraph`, the rest are `node`s. Edges may
/// form cycles and self-references.
pub fn reference_graph_strategy(size: u128) -> impl Strategy<Value = CdfDocument> {
    let size = size.max(1);
    prop::collection::vec(prop::collection::vec(0..size, 0..4), size as usize).prop_map(
        |edges| {
            CdfDocument::from_records(
                edges
                    .iter()
                    .enumerate()
                    .map(|(i, targets)| {
                        let record_type = if i % 3 == 0 { "paragraph" } else { "node" };
                        let targets: Vec<Uuid> = targets.iter().map(|t| fixture_uuid(*t)).collect();
                        RecordBuilder::new(fixture_uuid(i as u128), record_type)
                            .references("field_refs", &targets)
                            .build()
                    })
                    .collect(),
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_values_match_their_type((ty, value) in typed_value_strategy()) {
            prop_assert!(ty.validate(&value).is_ok());
        }

        #[test]
        fn generated_records_are_valid(record in record_strategy()) {
            prop_assert!(record.validate().is_ok());
        }

        #[test]
        fn generated_graphs_have_every_node(document in reference_graph_strategy(8)) {
            prop_assert_eq!(document.len(), 8);
        }
    }
}
