// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use sequoia_openpgp as openpgp;
use openpgp::cert::prelude::*;
use openpgp::crypto::Password;
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::Serialize;
use openpgp::{Packet, PacketPile};
use spkit::spk::inspector::{read_entry, InspectedPackage};
use spkit::spk::SIGNATURE_FILE;
use spkit::{FileSet, PackageSpec};
use std::fs;
use std::path::Path;

/// Write a secret keyring with one signing subkey.
///
/// Returns the certificate and the signing subkey's key id.
pub fn generate_keyring(path: &Path, password: Option<&str>) -> (Cert, String) {
    let (cert, _) = CertBuilder::new()
        .add_userid("Package Signer <signer@example.com>")
        .add_signing_subkey()
        .set_password(password.map(Password::from))
        .generate()
        .unwrap();

    let mut data = Vec::new();
    cert.as_tsk().serialize(&mut data).unwrap();
    fs::write(path, data).unwrap();

    let policy = StandardPolicy::new();
    let key_id = cert
        .keys()
        .with_policy(&policy, None)
        .for_signing()
        .next()
        .unwrap()
        .key()
        .keyid()
        .to_hex();

    (cert, key_id)
}

/// Check a detached signature (armored or binary) over `content`.
pub fn verify_detached(cert: &Cert, signature: &[u8], content: &[u8]) -> bool {
    let policy = StandardPolicy::new();
    let pile = match PacketPile::from_bytes(signature) {
        Ok(pile) => pile,
        Err(_) => return false,
    };

    for packet in pile.descendants() {
        if let Packet::Signature(sig) = packet {
            for key in cert.keys().with_policy(&policy, None).for_signing() {
                #[allow(unused_mut)]
                let mut sig = sig.clone();
                if sig.verify_message(key.key(), content).is_ok() {
                    return true;
                }
            }
        }
    }
    false
}

/// Cut the first armored signature block out of arbitrary bytes.
pub fn extract_armored_signature(data: &[u8]) -> Option<Vec<u8>> {
    const BEGIN: &str = "-----BEGIN PGP SIGNATURE-----";
    const END: &str = "-----END PGP SIGNATURE-----";

    let text = String::from_utf8_lossy(data);
    let start = text.find(BEGIN)?;
    let end = text[start..].find(END)? + start + END.len();
    Some(format!("{}\n", &text[start..end]).into_bytes())
}

/// Rebuild the signed byte stream from a finished package: every file
/// except the signature token, in byte-wise path order.
pub fn signed_content(spk: &Path) -> Vec<u8> {
    let inspected = InspectedPackage::from_file(spk).unwrap();
    let mut paths: Vec<&str> = inspected
        .entries
        .iter()
        .filter(|e| !e.is_directory && e.path != SIGNATURE_FILE)
        .map(|e| e.path.as_str())
        .collect();
    paths.sort();

    let mut content = Vec::new();
    for path in paths {
        content.extend(read_entry(spk, path).unwrap().unwrap());
    }
    content
}

/// Payload directory, one script, and a spec building `acme` into `root/dist`.
pub fn acme_spec(root: &Path) -> PackageSpec {
    let app = root.join("app");
    fs::create_dir_all(app.join("bin")).unwrap();
    fs::write(app.join("bin/acme"), "#!/bin/sh\necho acme\n").unwrap();

    let script = root.join("start-stop-status");
    fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();

    let mut spec = PackageSpec::new(root.join("dist"), "acme", "1.0.0-1", "noarch");
    spec.payload.push(FileSet::dir(&app));
    spec.scripts.push(FileSet::file(&script));
    spec
}
