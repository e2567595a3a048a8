use coap_lite::{MessageClass, Packet, ResponseType};
use proptest::prelude::*;
use tsnconf::coap::block::{self, Block, BlockDirection, MAX_BLOCK_NUM};
use tsnconf::coap::option::{self, CoapOption, encode_nibble};
use tsnconf::coap::{Code, ContentFormats, Message, MessageType, RequestKind, RequestProfile};

#[test]
fn fetch_request_parses_with_coap_lite() {
    let profile = RequestProfile::default();
    let payload = vec![0x19, 0x07, 0xD0, 0x82, 0x19, 0x07, 0xF1, 0x61, b'1'];
    let msg = profile.build(RequestKind::Query, 0x4242, &[0xCA, 0xFE], payload.clone());
    let bytes = msg.encode().unwrap();

    let packet = Packet::from_bytes(&bytes).unwrap();
    assert_eq!(packet.header.message_id, 0x4242);
    assert_eq!(u8::from(packet.header.code), Code::FETCH.0);
    assert_eq!(packet.get_token(), &[0xCA, 0xFE]);
    assert_eq!(packet.payload, payload);
    let uri: Vec<Vec<u8>> = packet
        .get_option(coap_lite::CoapOption::UriPath)
        .unwrap()
        .iter()
        .cloned()
        .collect();
    assert_eq!(uri, vec![b"c".to_vec()]);
    let cf = packet
        .get_option(coap_lite::CoapOption::ContentFormat)
        .unwrap()
        .front()
        .unwrap();
    assert_eq!(cf, &vec![141u8]);
    let accept = packet
        .get_option(coap_lite::CoapOption::Accept)
        .unwrap()
        .front()
        .unwrap();
    assert_eq!(accept, &vec![142u8]);
}

#[test]
fn coap_lite_response_decodes() {
    let mut packet = Packet::new();
    packet.header.set_type(coap_lite::MessageType::Acknowledgement);
    packet.header.code = MessageClass::Response(ResponseType::Content);
    packet.header.message_id = 0x1234;
    packet.set_token(vec![0xAB]);
    packet.add_option(coap_lite::CoapOption::ContentFormat, vec![142]);
    let b2 = Block::new(3, true, 2).unwrap();
    packet.add_option(coap_lite::CoapOption::Block2, option::encode_uint(b2.encode()));
    packet.payload = vec![0xA1, 0x01, 0xF5];
    let bytes = packet.to_bytes().unwrap();

    let msg = Message::decode(&bytes).unwrap();
    assert_eq!(msg.mtype, MessageType::Acknowledgement);
    assert_eq!(msg.code, Code::CONTENT);
    assert_eq!(msg.message_id, 0x1234);
    assert_eq!(msg.token, vec![0xAB]);
    assert_eq!(msg.content_format(), Some(142));
    assert_eq!(msg.block(BlockDirection::Response).unwrap(), Some(b2));
    assert_eq!(msg.payload, vec![0xA1, 0x01, 0xF5]);
    assert_eq!(
        ContentFormats::default().classify(msg.content_format()),
        tsnconf::coap::PayloadKind::Instances
    );
}

#[test]
fn option_delta_boundaries() {
    assert_eq!(encode_nibble(12).unwrap(), (12, [0, 0], 0));
    assert_eq!(encode_nibble(13).unwrap(), (13, [0, 0], 1));
    assert_eq!(encode_nibble(268).unwrap(), (13, [255, 0], 1));
    assert_eq!(encode_nibble(269).unwrap(), (14, [0, 0], 2));
    assert_eq!(encode_nibble(270).unwrap(), (14, [0, 1], 2));
    assert!(encode_nibble(65535 + 269 + 1).is_err());
}

#[test]
fn option_number_269_uses_two_byte_extension() {
    let msg = Message::new(MessageType::NonConfirmable, Code::GET, 1)
        .with_option(CoapOption::new(269, vec![7]));
    let bytes = msg.encode().unwrap();
    // Header (4), option byte 0xE1, extension 0x0000, value 7.
    assert_eq!(&bytes[4..], &[0xE1, 0x00, 0x00, 0x07]);
    assert_eq!(Message::decode(&bytes).unwrap(), msg);
}

#[test]
fn split_covers_payload_exactly() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let chunks = block::split_payload(&payload, 4).unwrap();
    assert_eq!(chunks.len(), 4);
    let joined: Vec<u8> = chunks.iter().flat_map(|(_, c)| c.iter().copied()).collect();
    assert_eq!(joined, payload);
    assert!(chunks[..3].iter().all(|(b, _)| b.more));
    assert!(!chunks[3].0.more);
    assert_eq!(chunks[2].0.offset(), 512);
}

proptest! {
    #[test]
    fn prop_block_value_roundtrip(
        num in 0u32..=MAX_BLOCK_NUM,
        more in any::<bool>(),
        szx in 0u8..=6
    ) {
        let b = Block::new(num, more, szx).unwrap();
        prop_assert_eq!(Block::decode(b.encode()).unwrap(), b);
        let opt = b.to_option(BlockDirection::Request);
        prop_assert!(opt.value.len() <= 3);
        prop_assert_eq!(Block::from_option(&opt).unwrap(), b);
    }

    #[test]
    fn prop_option_lists_roundtrip(
        mut numbers in proptest::collection::vec(1u16..2000, 0..12),
        len in 0usize..300
    ) {
        numbers.sort_unstable();
        let mut msg = Message::new(MessageType::Confirmable, Code::IPATCH, 99)
            .with_token(vec![1, 2, 3, 4]);
        for (i, n) in numbers.iter().enumerate() {
            msg.add_option(CoapOption::new(*n, vec![i as u8; len % (i + 7)]));
        }
        let msg = msg.with_payload(vec![0x5A; len]);
        let bytes = msg.encode().unwrap();
        prop_assert_eq!(Message::decode(&bytes).unwrap(), msg);

        // An independent parser agrees on the basics.
        let packet = Packet::from_bytes(&bytes).unwrap();
        prop_assert_eq!(packet.header.message_id, 99);
        prop_assert_eq!(packet.payload.len(), len);
    }

    #[test]
    fn prop_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = Message::decode(&data);
    }
}
