//! Fuzz target: token decoding
//!
//! Decodes arbitrary bytes as every value type and as a bare token. A
//! successful decode must report a length within the input, and values
//! must survive a second encode/decode pass unchanged.
//!
//! cargo fuzz run fuzz_token_codec

#![no_main]

use libfuzzer_sys::fuzz_target;
use rci_connector::rci::codec;
use rci_connector::rci::schema::ValueType;

const TYPES: [ValueType; 8] = [
    ValueType::String,
    ValueType::Int32,
    ValueType::Uint32,
    ValueType::Float,
    ValueType::Enum,
    ValueType::Boolean,
    ValueType::Ipv4,
    ValueType::MacAddr,
];

fuzz_target!(|data: &[u8]| {
    if let Ok((_, used)) = codec::decode_token(data) {
        assert!(used <= data.len());
    }
    for value_type in TYPES {
        let Ok((value, used)) = codec::decode_value(value_type, data) else {
            continue;
        };
        assert!(used <= data.len());
        let mut encoded = Vec::new();
        codec::encode_value(&value, &mut encoded);
        let (again, _) = codec::decode_value(value_type, &encoded).expect("re-encoded value decodes");
        let mut twice = Vec::new();
        codec::encode_value(&again, &mut twice);
        assert_eq!(twice, encoded);
    }
});
