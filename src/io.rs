// File-level loading helpers: SID files, the type catalog and YAML/JSON
// query files.
//
// With the `file-io` feature a SHA-256 fingerprint is computed over the SID
// file bytes as they are read, so two loaded schemas can be told apart.

use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use log::{debug, info};
use serde_json::Value as Json;

use crate::error::{Error, Result, SchemaError};
use crate::schema::{Catalog, SchemaIndex, SidFile};
use crate::transform::QueryInput;

/// A schema index plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedSchema {
    pub index: SchemaIndex,
    /// Number of SID files merged into the index.
    pub files: usize,
    /// SHA-256 over the SID file bytes in load order (if `file-io` is enabled).
    pub fingerprint: Option<[u8; 32]>,
}

impl LoadedSchema {
    pub fn fingerprint_hex(&self) -> Option<String> {
        self.fingerprint.map(hex::encode)
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })
}

fn in_file(path: &Path, err: SchemaError) -> SchemaError {
    match err {
        SchemaError::InvalidSidFile(msg) => {
            SchemaError::InvalidSidFile(format!("{}: {msg}", path.display()))
        }
        SchemaError::InvalidCatalog(msg) => {
            SchemaError::InvalidCatalog(format!("{}: {msg}", path.display()))
        }
        other => other,
    }
}

pub fn load_sid_file(path: &Path) -> Result<SidFile> {
    let text = read_text(path)?;
    let file = SidFile::from_json(&text).map_err(|e| in_file(path, e))?;
    debug!(
        "{}: module {} with {} items",
        path.display(),
        file.module_name,
        file.items.len()
    );
    Ok(file)
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let text = read_text(path)?;
    Ok(Catalog::from_json(&text).map_err(|e| in_file(path, e))?)
}

/// Load and merge SID files (any order) with an optional catalog.
pub fn load_schema<P: AsRef<Path>>(sid_files: &[P], catalog: Option<&Path>) -> Result<LoadedSchema> {
    let mut builder = SchemaIndex::builder();

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    for path in sid_files {
        let path = path.as_ref();
        let text = read_text(path)?;
        #[cfg(feature = "file-io")]
        hasher.update(text.as_bytes());
        let file = SidFile::from_json(&text).map_err(|e| in_file(path, e))?;
        builder.add_sid_file(file);
    }
    if let Some(path) = catalog {
        builder.set_catalog(load_catalog(path)?);
    }

    #[cfg(feature = "file-io")]
    let fingerprint = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let fingerprint: Option<[u8; 32]> = None;

    let index = builder.build();
    info!("schema loaded: {} SIDs from {} files", index.len(), sid_files.len());
    Ok(LoadedSchema {
        index,
        files: sid_files.len(),
        fingerprint,
    })
}

/// Read a YAML or JSON document. JSON is valid YAML, so one parser covers both.
pub fn read_document(path: &Path) -> Result<Json> {
    let text = read_text(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

/// Read a query file: a path, a list of paths, or `{path: value}` items.
pub fn read_query_file(path: &Path) -> Result<QueryInput> {
    let doc = read_document(path)?;
    Ok(QueryInput::detect(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    const SID_FILE: &str = r#"{
        "ietf-sid-file:sid-file": {
            "module-name": "ietf-interfaces",
            "item": [
                {"namespace": "module", "identifier": "ietf-interfaces", "sid": "1500"},
                {"namespace": "data", "identifier": "/ietf-interfaces:interfaces", "sid": "2000"},
                {"namespace": "data", "identifier": "/ietf-interfaces:interfaces/interface", "sid": "2033"},
                {"namespace": "data", "identifier": "/ietf-interfaces:interfaces/interface/name", "sid": "2034"}
            ]
        }
    }"#;

    #[test]
    fn loads_schema_with_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let sid = write(&dir, "if.sid", SID_FILE);
        let cat = write(
            &dir,
            "catalog.json",
            r#"{"keys": {"/ietf-interfaces:interfaces/interface": ["name"]}}"#,
        );
        let loaded = load_schema(&[&sid], Some(&cat)).unwrap();
        assert_eq!(loaded.files, 1);
        assert_eq!(loaded.index.sid_of("/ietf-interfaces:interfaces/interface"), Some(2033));
        assert_eq!(
            loaded.index.declared_keys(2033),
            Some(&["name".to_string()][..])
        );
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn fingerprint_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.sid", SID_FILE);
        let b = write(&dir, "b.sid", &SID_FILE.replace("2034", "2040"));
        let fa = load_schema(&[&a], None).unwrap();
        let fa2 = load_schema(&[&a], None).unwrap();
        let fb = load_schema(&[&b], None).unwrap();
        assert_eq!(fa.fingerprint, fa2.fingerprint);
        assert_ne!(fa.fingerprint, fb.fingerprint);
        assert_eq!(fa.fingerprint_hex().unwrap().len(), 64);
        assert_eq!(fa.fingerprint_hex(), fa.fingerprint.map(hex::encode));
    }

    #[test]
    fn bad_sid_file_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(&dir, "broken.sid", "{ not json");
        let err = load_sid_file(&bad).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(err.to_string().contains("broken.sid"));
        assert!(matches!(
            load_sid_file(&dir.path().join("missing.sid")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn query_files_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(
            &dir,
            "q.yaml",
            "- /ietf-interfaces:interfaces\n- \"/ietf-interfaces:interfaces/interface[name='1']\"\n",
        );
        assert!(matches!(read_query_file(&yaml).unwrap(), QueryInput::Paths(p) if p.len() == 2));

        let json = write(
            &dir,
            "p.json",
            r#"[{"/ietf-interfaces:interfaces/interface[name='1']/enabled": true}]"#,
        );
        assert!(matches!(read_query_file(&json).unwrap(), QueryInput::Patches(p) if p.len() == 1));

        let tree = write(&dir, "t.yaml", "interfaces:\n  interface: []\n");
        assert!(matches!(read_query_file(&tree), Err(Error::Format(_))));
    }
}
