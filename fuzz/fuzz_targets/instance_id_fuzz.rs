#![no_main]
use libfuzzer_sys::fuzz_target;
use tsnconf::instance_id::InstancePath;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(path) = InstancePath::parse(text) else {
        return;
    };
    // Formatting a parsed path yields a path that parses to the same value.
    let printed = path.to_string();
    let reparsed = InstancePath::parse(&printed).expect("formatted path must parse");
    assert_eq!(reparsed, path);
});
