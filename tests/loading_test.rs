use apiscope::SynthesisOptions;
use apiscope::synth::{load_observations_file, synthesize};
use std::io::Write;

#[test]
fn test_har_file_synthesizes_document() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "log": {{
                "version": "1.2",
                "entries": [
                    {{
                        "startedDateTime": "2024-03-01T10:00:00Z",
                        "request": {{
                            "method": "GET",
                            "url": "https://shop.x.com/api/v1/carts/11",
                            "headers": [{{"name": "X-Auth-Token", "value": "t"}}],
                            "queryString": []
                        }},
                        "response": {{
                            "status": 200,
                            "content": {{"size": 40, "mimeType": "application/json"}}
                        }}
                    }}
                ]
            }}
        }}"#
    )
    .unwrap();

    let observations = load_observations_file(file.path()).unwrap();
    assert_eq!(observations.len(), 1);

    let doc = synthesize(&observations, &SynthesisOptions::default());
    let op = &doc.paths["/api/v1/carts/{id}"]["get"];
    assert_eq!(op.operation_id, "getCarts");
    assert_eq!(op.tags, vec!["carts"]);
    assert!(!op.security.is_empty());
    assert!(doc.components.security_schemes.contains_key("bearerAuth"));
    assert!(doc.components.schemas.contains_key("Cart"));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_observations_file(&dir.path().join("missing.json"));
    assert!(matches!(result, Err(apiscope::ApiscopeError::Io(_))));
}
