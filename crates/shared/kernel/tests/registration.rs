use mxd_domain::registration::{ALIAS_NAMESPACE, SENDER_LOCALPART, USER_NAMESPACE};
use mxd_kernel::registration::{RegistrationError, generate_registration, load_registration};

const URL: &str = "https://bridge.example:9000";

#[test]
fn generated_file_has_fixed_shape() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("reg.yaml");

    let reg = generate_registration(URL, &path).expect("generate");
    assert_eq!(reg.id, "discord-bridge");
    assert_eq!(reg.url.as_deref(), Some(URL));
    assert_eq!(reg.sender_localpart, SENDER_LOCALPART);
    assert!(!reg.rate_limited);
    assert_eq!(reg.protocols, vec!["discord".to_owned()]);
    assert_eq!(reg.namespaces.users[0].regex, USER_NAMESPACE);
    assert!(reg.namespaces.users[0].exclusive);
    assert_eq!(reg.namespaces.aliases[0].regex, ALIAS_NAMESPACE);
    assert!(reg.namespaces.aliases[0].exclusive);
    assert!(reg.namespaces.rooms.is_empty());
    assert_ne!(reg.as_token, reg.hs_token);

    let text = std::fs::read_to_string(&path).expect("read back");
    assert!(text.contains("sender_localpart: _discord_bot"));
    assert_eq!(load_registration(&path).expect("load"), reg);
}

#[test]
fn two_generations_yield_distinct_tokens() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = generate_registration(URL, dir.path().join("a.yaml")).expect("first");
    let second = generate_registration(URL, dir.path().join("b.yaml")).expect("second");

    assert_ne!(first.as_token, second.as_token);
    assert_ne!(first.hs_token, second.hs_token);
}

#[test]
fn existing_file_is_left_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("reg.yaml");
    std::fs::write(&path, "keep me").expect("seed");

    let err = generate_registration(URL, &path).unwrap_err();
    assert!(matches!(err, RegistrationError::AlreadyExists { .. }));
    assert_eq!(std::fs::read_to_string(&path).expect("read"), "keep me");
}

#[test]
fn loading_garbage_reports_yaml_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("reg.yaml");
    std::fs::write(&path, "id: [").expect("seed");

    let err = load_registration(&path).unwrap_err();
    assert!(matches!(err, RegistrationError::Serialize { .. }));
}
