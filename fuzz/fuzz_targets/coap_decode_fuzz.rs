#![no_main]
use libfuzzer_sys::fuzz_target;
use tsnconf::coap::{BlockDirection, ContentFormats, Message, check_response};

fuzz_target!(|data: &[u8]| {
    let Ok(msg) = Message::decode(data) else {
        return;
    };
    let _ = msg.block(BlockDirection::Request);
    let _ = msg.block(BlockDirection::Response);
    let _ = check_response(&msg, &ContentFormats::default());

    // Anything we accept must re-encode to something we accept again.
    if let Ok(bytes) = msg.encode() {
        let again = Message::decode(&bytes).expect("re-encoded message must decode");
        assert_eq!(again, msg);
    }
});
