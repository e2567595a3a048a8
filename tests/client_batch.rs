use std::net::{SocketAddr, UdpSocket};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::json;
use tsnconf::coap::{Code, Message, MessageType};
use tsnconf::schema::{Namespace, SchemaIndex, SidFile, SidItem};
use tsnconf::{
    ClientOptions, Client, Converter, ConverterOptions, Endpoint, Error, InstancePath, ItemStatus,
    UdpTransport,
};

fn converter() -> Converter {
    let items = [
        (2000, "/ietf-interfaces:interfaces"),
        (2033, "/ietf-interfaces:interfaces/interface"),
        (2034, "/ietf-interfaces:interfaces/interface/name"),
        (2035, "/ietf-interfaces:interfaces/interface/enabled"),
    ]
    .into_iter()
    .map(|(sid, id)| SidItem {
        namespace: Namespace::Data,
        identifier: id.into(),
        sid,
    })
    .collect();
    let index = SchemaIndex::builder()
        .sid_file(SidFile {
            module_name: "ietf-interfaces".into(),
            module_revision: None,
            items,
        })
        .build();
    Converter::new(index, ConverterOptions::default())
}

/// A device on a loopback socket. Pings are answered with RST; the n-th
/// request (1-based) is answered with `codes[n - 1]`. Exits after the last
/// code is used.
fn device(codes: Vec<Code>) -> (SocketAddr, JoinHandle<Vec<Message>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = socket.local_addr().unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let handle = std::thread::spawn(move || {
        let mut seen = Vec::new();
        let mut buf = [0u8; 1500];
        let mut codes = codes.into_iter();
        while let Ok((n, from)) = socket.recv_from(&mut buf) {
            let req = Message::decode(&buf[..n]).unwrap();
            if req.code == Code::EMPTY {
                let rst = Message::new(MessageType::Reset, Code::EMPTY, req.message_id);
                socket.send_to(&rst.encode().unwrap(), from).unwrap();
                continue;
            }
            let Some(code) = codes.next() else { break };
            let mut reply = Message::new(MessageType::Acknowledgement, code, req.message_id)
                .with_token(req.token.clone());
            if !code.is_success() {
                reply = reply
                    .with_option(tsnconf::coap::CoapOption::uint(
                        tsnconf::coap::option::CONTENT_FORMAT,
                        0,
                    ))
                    .with_payload(b"no such interface".to_vec());
            }
            socket.send_to(&reply.encode().unwrap(), from).unwrap();
            seen.push(req);
            if codes.len() == 0 {
                break;
            }
        }
        seen
    });
    (addr, handle)
}

fn items() -> Vec<(InstancePath, serde_json::Value)> {
    ["eth0", "eth1", "eth2"]
        .iter()
        .map(|name| {
            (
                InstancePath::parse(&format!(
                    "/ietf-interfaces:interfaces/interface[name='{name}']/enabled"
                ))
                .unwrap(),
                json!(true),
            )
        })
        .collect()
}

fn options() -> ClientOptions {
    ClientOptions {
        ready_timeout: Duration::from_secs(3),
        request_timeout: Duration::from_secs(3),
        ..ClientOptions::default()
    }
}

#[test]
fn partial_failure_is_reported_not_raised() {
    let (addr, dev) = device(vec![Code::CHANGED, Code::NOT_FOUND, Code::CHANGED]);
    let conv = converter();
    let mut client = Client::new(UdpTransport::new(), &conv, options());
    client.connect(&Endpoint::Udp(addr)).unwrap();

    let report = client.patch(&items()).unwrap();
    assert_eq!((report.total, report.succeeded, report.failed), (3, 2, 1));
    match &report.outcomes[1].status {
        ItemStatus::Rejected(e) => {
            assert_eq!(e.code, Code::NOT_FOUND);
            assert_eq!(e.diagnostic.as_deref(), Some("no such interface"));
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert!(report.outcomes[1].path.contains("eth1"));
    client.disconnect();

    let seen = dev.join().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|m| m.code == Code::IPATCH));
}

#[test]
fn all_failed_raises_aggregate_error() {
    let (addr, dev) = device(vec![Code::BAD_REQUEST; 3]);
    let conv = converter();
    let mut client = Client::new(UdpTransport::new(), &conv, options());
    client.connect(&Endpoint::Udp(addr)).unwrap();

    match client.patch(&items()) {
        Err(Error::BatchFailed(report)) => {
            assert_eq!((report.total, report.succeeded, report.failed), (3, 0, 3));
        }
        other => panic!("expected BatchFailed, got {other:?}"),
    }
    dev.join().unwrap();
}

#[test]
fn query_over_udp() {
    let (addr, dev) = device(vec![Code::CONTENT]);
    let conv = converter();
    let mut client = Client::new(UdpTransport::new(), &conv, options());
    client.connect(&Endpoint::Udp(addr)).unwrap();

    // A 2.05 without payload or content format decodes to nothing.
    let out = client
        .fetch(&[InstancePath::parse("/ietf-interfaces:interfaces").unwrap()])
        .unwrap();
    assert!(out.is_clean());
    assert_eq!(out.value, serde_json::Value::Null);

    let seen = dev.join().unwrap();
    assert_eq!(seen[0].code, Code::FETCH);
    assert_eq!(seen[0].payload, vec![0x19, 0x07, 0xD0]);
}
