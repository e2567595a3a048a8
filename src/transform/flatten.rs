// Flatten nested decoded output into `"/a/b/c" -> leaf` pairs.
//
// List entries are addressed by position: `/interfaces/interface[0]/name`.
// Top-level keys that already are instance paths are used as prefixes.

use serde_json::{Map, Value as Json};

pub fn flatten(value: &Json) -> Map<String, Json> {
    let mut out = Map::new();
    walk(value, "", &mut out);
    out
}

fn walk(value: &Json, prefix: &str, out: &mut Map<String, Json>) {
    match value {
        Json::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                let next = if k.starts_with('/') {
                    format!("{prefix}{k}")
                } else {
                    format!("{prefix}/{k}")
                };
                walk(v, &next, out);
            }
        }
        Json::Array(items) if items.iter().any(|i| i.is_object() || i.is_array()) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{prefix}[{i}]"), out);
            }
        }
        leaf => {
            let key = if prefix.is_empty() { "/" } else { prefix };
            out.insert(key.to_string(), leaf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_containers_and_lists() {
        let v = json!({
            "interfaces": {
                "interface": [
                    {"name": "eth0", "enabled": true},
                    {"name": "eth1"}
                ]
            },
            "clock": {"state": "Locked", "ports": [1, 2]}
        });
        let flat = flatten(&v);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "/interfaces/interface[0]/name",
                "/interfaces/interface[0]/enabled",
                "/interfaces/interface[1]/name",
                "/clock/state",
                "/clock/ports",
            ]
        );
        assert_eq!(flat["/clock/ports"], json!([1, 2]));
    }

    #[test]
    fn instance_path_keys_are_prefixes() {
        let v = json!({"/if:interfaces/interface[name='eth0']": {"enabled": false}});
        let flat = flatten(&v);
        assert_eq!(
            flat.get("/if:interfaces/interface[name='eth0']/enabled"),
            Some(&json!(false))
        );
    }

    #[test]
    fn scalar_and_empty_containers() {
        assert_eq!(flatten(&json!(5)).get("/"), Some(&json!(5)));
        let flat = flatten(&json!({"a": {}}));
        assert_eq!(flat.get("/a"), Some(&json!({})));
    }
}
