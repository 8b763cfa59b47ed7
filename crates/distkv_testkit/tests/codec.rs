//! Value codec properties, directly and through a store.

use distkv_codec::{decode, decode_as, encode, ValueType};
use distkv_core::TypedValue;
use distkv_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn encode_decode_roundtrip(value in typed_value_strategy()) {
        let bytes = encode(&value).unwrap();
        prop_assert_eq!(bytes.len(), value.encoded_len());
        prop_assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn store_preserves_values(key in key_strategy(), value in typed_value_strategy()) {
        let manager = TestManager::new();
        let store = manager.store("codec");
        store.put(&key, value.clone()).unwrap();
        prop_assert_eq!(store.get(&key).unwrap(), value.clone());
        prop_assert_eq!(store.get_as(&key, value.value_type()).unwrap(), value);
    }
}

#[test]
fn float_widens_to_double_only() {
    let bytes = encode(&TypedValue::Float(2.5)).unwrap();
    assert_eq!(
        decode_as(&bytes, ValueType::Double).unwrap(),
        TypedValue::Double(2.5)
    );
    assert!(decode_as(&bytes, ValueType::Integer).is_err());
    assert!(decode_as(&bytes, ValueType::String).is_err());
}

#[test]
fn mismatched_store_read_is_an_error() {
    with_temp_store(|store| {
        store.put("flag", true).unwrap();
        let err = store.get_as("flag", ValueType::String).unwrap_err();
        assert_eq!(err.code(), distkv_core::codes::INVALID_ARGUMENT);
    });
}
