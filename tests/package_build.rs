// tests/package_build.rs

//! Integration tests for building SPK packages.

mod common;

use spkit::compression::{create_decoder, CompressionFormat};
use spkit::spk::inspector::read_entry;
use spkit::{hash, BuildContext, CodeSignConfig, Error, InspectedPackage, PackageBuilder};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

#[test]
fn test_unsigned_package() {
    let temp_dir = TempDir::new().unwrap();
    let spec = common::acme_spec(temp_dir.path());

    let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();
    assert_eq!(
        output.package_path,
        temp_dir.path().join("dist/acme-1.0.0-1-noarch.spk")
    );

    let inspected = InspectedPackage::from_file(&output.package_path).unwrap();
    let mut paths: Vec<&str> = inspected.entries.iter().map(|e| e.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["INFO", "package.tgz", "scripts/start-stop-status"]);

    let info = inspected.info.unwrap();
    assert_eq!(info.get("package"), Some("acme"));
    assert_eq!(info.get("version"), Some("1.0.0-1"));
    assert_eq!(info.get("arch"), Some("noarch"));

    let payload = read_entry(&output.package_path, "package.tgz").unwrap().unwrap();
    assert_eq!(info.get("checksum"), Some(hash::md5(&payload).as_str()));

    // The payload is a gzip tar holding the app tree
    assert_eq!(CompressionFormat::from_magic_bytes(&payload), CompressionFormat::Gzip);
    let mut archive = tar::Archive::new(create_decoder(&payload[..], CompressionFormat::Gzip));
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| {
            e.unwrap()
                .path()
                .unwrap()
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string()
        })
        .collect();
    assert_eq!(names, vec!["bin", "bin/acme"]);

    // Staging is gone
    assert!(!temp_dir.path().join("dist/acme-1.0.0-1-noarch").exists());
}

#[test]
fn test_published_package_modes() {
    let temp_dir = TempDir::new().unwrap();
    let spec = common::acme_spec(temp_dir.path());

    let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();
    let mode = fs::metadata(&output.package_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);

    let inspected = InspectedPackage::from_file(&output.package_path).unwrap();
    let payload = inspected
        .entries
        .iter()
        .find(|e| e.path == "package.tgz")
        .unwrap();
    assert_eq!(payload.mode & 0o777, 0o644);
}

#[test]
fn test_signed_package() {
    let temp_dir = TempDir::new().unwrap();
    let secring = temp_dir.path().join("secring.pgp");
    let (_, key_id) = common::generate_keyring(&secring, Some("passphrase"));

    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/timestamp.php")
        .match_body(mockito::Matcher::Regex("BEGIN PGP SIGNATURE".to_string()))
        .with_status(200)
        .with_body("TOKEN123")
        .expect(1)
        .create();

    let mut spec = common::acme_spec(temp_dir.path());
    spec.codesign = Some(
        CodeSignConfig::new(&key_id, &secring)
            .with_password("passphrase")
            .with_timestamp_url(&format!("{}/timestamp.php", server.url())),
    );

    let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();
    assert!(output.signed);
    mock.assert();

    let token = read_entry(&output.package_path, "syno_signature.asc")
        .unwrap()
        .unwrap();
    assert_eq!(token, b"TOKEN123");

    let inspected = InspectedPackage::from_file(&output.package_path).unwrap();
    assert!(inspected.contains("package.tgz"));
    assert!(inspected.contains("INFO"));
    assert!(inspected.contains("scripts/start-stop-status"));
}

#[test]
fn test_submitted_signature_verifies_against_package() {
    let temp_dir = TempDir::new().unwrap();
    let secring = temp_dir.path().join("secring.pgp");
    let (cert, key_id) = common::generate_keyring(&secring, None);

    // Echo the upload back so the submitted signature lands in the package
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/ts")
        .with_status(200)
        .with_body_from_request(|request| request.body().cloned().unwrap_or_default())
        .create();

    let mut spec = common::acme_spec(temp_dir.path());
    spec.info.push(("displayname".to_string(), "ACME".to_string()));
    spec.codesign = Some(
        CodeSignConfig::new(&key_id, &secring)
            .with_timestamp_url(&format!("{}/ts", server.url())),
    );

    let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();

    let upload = read_entry(&output.package_path, "syno_signature.asc")
        .unwrap()
        .unwrap();
    let signature = common::extract_armored_signature(&upload).unwrap();
    let content = common::signed_content(&output.package_path);

    assert!(common::verify_detached(&cert, &signature, &content));

    let mut tampered = content.clone();
    tampered.push(b'x');
    assert!(!common::verify_detached(&cert, &signature, &tampered));
}

#[test]
fn test_timestamp_failure_aborts_without_output() {
    let temp_dir = TempDir::new().unwrap();
    let secring = temp_dir.path().join("secring.pgp");
    let (_, key_id) = common::generate_keyring(&secring, None);

    let mut server = mockito::Server::new();
    let mock = server.mock("POST", "/ts").with_status(503).expect(1).create();

    let mut spec = common::acme_spec(temp_dir.path());
    spec.codesign = Some(
        CodeSignConfig::new(&key_id, &secring).with_timestamp_url(&format!("{}/ts", server.url())),
    );
    let package_path = spec.package_path();

    let result = PackageBuilder::new(spec).build(&BuildContext::new());
    assert!(matches!(result, Err(Error::SignatureRetrieval(_))));
    mock.assert();

    assert!(!package_path.exists());
    assert!(!temp_dir.path().join("dist/acme-1.0.0-1-noarch").exists());
}

#[test]
fn test_bad_passphrase_is_cryptographic_error() {
    let temp_dir = TempDir::new().unwrap();
    let secring = temp_dir.path().join("secring.pgp");
    let (_, key_id) = common::generate_keyring(&secring, Some("right"));

    let mut spec = common::acme_spec(temp_dir.path());
    spec.codesign = Some(CodeSignConfig::new(&key_id, &secring).with_password("wrong"));

    let err = PackageBuilder::new(spec)
        .build(&BuildContext::new())
        .unwrap_err();
    assert_eq!(err.category(), "cryptographic");
}

#[test]
fn test_build_from_description() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    common::acme_spec(root);
    fs::write(root.join("LICENSE.txt"), "MIT\n").unwrap();

    let description = r#"
[package]
name = "acme"
version = "2.0"
arch = "x86_64"
destdir = "out"
compression = "xz"
license = "LICENSE.txt"

[[package.info]]
name = "displayname"
value = "ACME Tools"

[[package.payload]]
dir = "app"

[[package.scripts]]
file = "start-stop-status"
"#;
    let description_path = root.join("spk.toml");
    fs::write(&description_path, description).unwrap();

    let spec = spkit::BuildDescription::from_file(&description_path)
        .unwrap()
        .package_spec()
        .unwrap();
    let output = PackageBuilder::new(spec).build(&BuildContext::new()).unwrap();

    assert_eq!(output.package_path, root.join("out/acme-2.0-x86_64.spk"));
    assert_eq!(output.info.get("displayname"), Some("ACME Tools"));

    let license = read_entry(&output.package_path, "LICENSE").unwrap().unwrap();
    assert_eq!(license, b"MIT\n");
    let payload = read_entry(&output.package_path, "package.tgz").unwrap().unwrap();
    assert_eq!(CompressionFormat::from_magic_bytes(&payload), CompressionFormat::Xz);
}
