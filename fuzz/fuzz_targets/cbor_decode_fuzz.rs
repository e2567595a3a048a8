#![no_main]
use libfuzzer_sys::fuzz_target;
use tsnconf::cbor::{self, ContainerMode};
use tsnconf::config::ConverterOptions;
use tsnconf::converter::Converter;
use tsnconf::schema::{Namespace, SchemaIndex, SidFile, SidItem};

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

fuzz_target!(|data: &[u8]| {
    // Malformed payloads must come back as errors or warnings, never panics.
    if let Ok(items) = cbor::decode_sequence(data) {
        for item in &items {
            let _ = cbor::encode(item, ContainerMode::Canonical);
        }
    }

    let conv = converter();
    let _ = conv.decode_instances(data);
    let _ = conv.decode_tree(data);
    let _ = conv.decode_query(data);
});
