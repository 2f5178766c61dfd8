//! Integration tests for loading SSH alias files from disk

use std::io::Write;

use dtop_core::{AliasTable, ConfigError, ConnectionTarget};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_and_resolve_from_file() {
    let file = write_config(
        "Host h\n\
         \tHostName 10.0.0.1\n\
         \n\
         Host db-*\n\
         \tUser postgres\n\
         \tPort 5022\n\
         \tIdentityFile /keys/db\n",
    );

    let aliases = AliasTable::load(file.path()).unwrap();
    assert_eq!(aliases.len(), 2);
    assert_eq!(aliases.source(), Some(file.path()));

    let target = ConnectionTarget::resolve(&aliases, "h", "u");
    assert_eq!(target.hostname, "10.0.0.1");
    assert_eq!(target.username, "u");
    assert_eq!(target.port, 22);

    let target = ConnectionTarget::resolve(&aliases, "db-main", "u");
    assert_eq!(target.hostname, "db-main");
    assert_eq!(target.username, "postgres");
    assert_eq!(target.port, 5022);
    assert_eq!(
        target.identity_file.as_deref(),
        Some(std::path::Path::new("/keys/db"))
    );
}

#[test]
fn test_missing_file_passes_caller_values_through() {
    let dir = tempfile::tempdir().unwrap();
    let aliases = AliasTable::load(dir.path().join("config")).unwrap();
    assert!(aliases.is_empty());
    assert_eq!(aliases.source(), None);

    let target = ConnectionTarget::resolve(&aliases, "gpu7", "ml");
    assert_eq!(target, ConnectionTarget::new("gpu7", "ml"));
}

#[test]
fn test_directory_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AliasTable::load(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_invalid_port_in_file_names_line() {
    let file = write_config("# fleet\nHost gpu*\n  Port twenty-two\n");
    let err = AliasTable::load(file.path()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid SSH config at line 3: invalid port \"twenty-two\""
    );
}

#[test]
fn test_match_blocks_and_unknown_options_are_ignored() {
    let file = write_config(
        "Host *\n\
         \tServerAliveInterval 30\n\
         \tForwardAgent yes\n\
         Match exec \"test -f /tmp/x\"\n\
         \tHostName elsewhere\n\
         \tPort 1\n\
         Host web\n\
         \tHostName web.internal\n",
    );

    let aliases = AliasTable::load(file.path()).unwrap();
    let target = ConnectionTarget::resolve(&aliases, "web", "u");
    assert_eq!(target.hostname, "web.internal");
    assert_eq!(target.port, 22);
}
