use std::path::Path;

fn generate() -> String {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    let bindings = cbindgen::Builder::new()
        .with_src(manifest.join("src/lib.rs"))
        .with_language(cbindgen::Language::C)
        .with_include_guard("HASHRING_H")
        .with_documentation(true)
        .generate()
        .expect("generate C header");

    let out = Path::new(env!("CARGO_TARGET_TMPDIR")).join("hashring.h");
    bindings.write_to_file(&out);

    let mut header = Vec::new();
    bindings.write(&mut header);
    String::from_utf8(header).expect("header is utf-8")
}

#[test]
fn header_declares_the_c_api() {
    let header = generate();
    assert!(header.contains("#ifndef HASHRING_H"));
    for symbol in [
        "hashring_hash_value",
        "hashring_hash_value_unmasked",
        "hashring_hash_value_f64",
        "hashring_create",
        "hashring_get",
        "hashring_key_value",
        "hashring_range",
        "hashring_swap",
        "hashring_free",
        "hashring_error_message",
        "hashring_error_free",
        "hashring_string_array_free",
        "hashring_log_init",
        "hashring_version",
    ] {
        assert!(header.contains(&format!("{symbol}(")), "missing `{symbol}`");
    }
    for ty in ["hashring_server_t", "hashring_config_t", "hashring_log_record_t"] {
        assert!(header.contains(ty), "missing `{ty}`");
    }
    assert!(header.contains("HASHRING_COMPATIBILITY_HASH_RING"));
}
