//! Tag-and-revert through the change-log.
//!
//! The pattern the test framework runs on: read the current revision,
//! mutate, then revert to the saved revision and find the store exactly
//! as it was.

use oxidir_core::{DirectoryService, OpReply};
use oxidir_error::DirectoryError;
use oxidir_harness::fixtures::{mnn_service, MNN_LDIF};
use oxidir_types::{Dn, Entry, Modification, Value};

#[test]
fn test_revert_restores_a_deleted_entry() {
    let (service, session) = mnn_service().unwrap();
    let dn = Dn::parse("cn=Alex Karasulu,o=MNN,c=WW,ou=system").unwrap();

    let OpReply::Entry(before) = service.lookup(&session, &dn, None).unwrap() else {
        panic!("expected entry");
    };
    let tag = service.changelog().current_revision();

    service.delete(&session, &dn, false).unwrap();
    assert!(matches!(
        service.lookup(&session, &dn, None),
        Err(DirectoryError::NoSuchObject { .. })
    ));

    service.revert(tag).unwrap();
    let OpReply::Entry(after) = service.lookup(&session, &dn, None).unwrap() else {
        panic!("expected entry");
    };
    assert_eq!(after.first("cn"), before.first("cn"));
    assert_eq!(after.first("sn"), before.first("sn"));
    assert_eq!(after.first("entryUUID"), before.first("entryUUID"));
    assert_eq!(service.changelog().current_revision(), tag);
}

#[test]
fn test_revert_undoes_an_add() {
    let (service, session) = mnn_service().unwrap();
    let tag = service.changelog().current_revision();

    let dn = Dn::parse("cn=Kate Bush,o=MNN,c=WW,ou=system").unwrap();
    let mut entry = Entry::new(dn.clone());
    entry.put("objectClass", ["top", "person"]);
    entry.put("cn", ["Kate Bush"]);
    entry.put("sn", ["Bush"]);
    service.add(&session, entry).unwrap();
    assert!(service.has_entry(&session, &dn).unwrap());

    service.revert(tag).unwrap();
    assert!(!service.has_entry(&session, &dn).unwrap());
}

#[test]
fn test_revert_undoes_a_modify() {
    let (service, session) = mnn_service().unwrap();
    let dn = Dn::parse("cn=Alex Karasulu,o=MNN,c=WW,ou=system").unwrap();
    let tag = service.changelog().current_revision();

    let mods = vec![
        Modification::Replace {
            attribute: "sn".to_string(),
            values: vec![Value::text("changed")],
        },
        Modification::Add {
            attribute: "description".to_string(),
            values: vec![Value::text("temporary")],
        },
    ];
    service.modify(&session, &dn, mods, false).unwrap();

    let OpReply::Entry(modified) = service.lookup(&session, &dn, None).unwrap() else {
        panic!("expected entry");
    };
    assert_eq!(modified.first("sn"), Some("changed"));
    assert_eq!(modified.first("description"), Some("temporary"));

    service.revert(tag).unwrap();
    let OpReply::Entry(restored) = service.lookup(&session, &dn, None).unwrap() else {
        panic!("expected entry");
    };
    assert_eq!(restored.first("sn"), Some("akarasulu"));
    assert!(restored.get("description").is_none());
}

#[test]
fn test_revert_undoes_a_rename() {
    let (service, session) = mnn_service().unwrap();
    let dn = Dn::parse("cn=Alex Karasulu,o=MNN,c=WW,ou=system").unwrap();
    let renamed = Dn::parse("cn=A K,o=MNN,c=WW,ou=system").unwrap();
    let tag = service.changelog().current_revision();

    service.rename(&session, &dn, "cn=A K", false, false).unwrap();
    assert!(service.has_entry(&session, &renamed).unwrap());
    assert!(!service.has_entry(&session, &dn).unwrap());

    service.revert(tag).unwrap();
    assert!(service.has_entry(&session, &dn).unwrap());
    assert!(!service.has_entry(&session, &renamed).unwrap());
}

#[test]
fn test_revert_to_zero_unwinds_the_whole_fixture() {
    let (service, session) = mnn_service().unwrap();
    assert!(service.changelog().current_revision() >= 5);

    service.revert(0).unwrap();

    for dn in [
        "c=WW,ou=system",
        "o=MNN,c=WW,ou=system",
        "ou=Roles,o=MNN,c=WW,ou=system",
        "ou=People,o=MNN,c=WW,ou=system",
        "cn=Alex Karasulu,o=MNN,c=WW,ou=system",
    ] {
        let dn = Dn::parse(dn).unwrap();
        assert!(!service.has_entry(&session, &dn).unwrap(), "{dn} survived");
    }
    assert_eq!(service.changelog().current_revision(), 0);

    // The fixture re-applies cleanly afterwards.
    let applied = service.apply_ldif(&session, MNN_LDIF).unwrap();
    assert_eq!(applied, 5);
}

#[test]
fn test_revert_restores_referral_set_membership() {
    let (service, session) = mnn_service().unwrap();
    let dn = Dn::parse("ou=Roles,o=MNN,c=WW,ou=system").unwrap();
    let norm = dn.normalize(service.registries());
    let tag = service.changelog().current_revision();

    service.delete(&session, &dn, true).unwrap();
    assert!(!service.referral_manager().is_referral(&norm));

    service.revert(tag).unwrap();
    assert!(service.referral_manager().is_referral(&norm));

    // And redirections below it work again.
    let below = Dn::parse("cn=X,ou=Roles,o=MNN,c=WW,ou=system").unwrap();
    let reply = service.delete(&session, &below, false).unwrap();
    assert!(reply.is_referral());
}

#[test]
fn test_revert_to_future_revision_fails() {
    let (service, _) = mnn_service().unwrap();
    let current = service.changelog().current_revision();
    assert!(matches!(
        service.revert(current + 10),
        Err(DirectoryError::Unrevertable { .. })
    ));
}

#[test]
fn test_disabled_changelog_records_nothing() {
    let service = DirectoryService::new().unwrap();
    let session = service.admin_session();
    assert!(!service.changelog().is_enabled());

    let dn = Dn::parse("cn=quiet,ou=system").unwrap();
    let mut entry = Entry::new(dn);
    entry.put("objectClass", ["top", "person"]);
    entry.put("cn", ["quiet"]);
    entry.put("sn", ["quiet"]);
    service.add(&session, entry).unwrap();

    assert_eq!(service.changelog().current_revision(), 0);
    assert!(service.changelog().events_after(0).is_empty());
}

#[test]
fn test_changelog_export_lists_events() {
    let (service, _) = mnn_service().unwrap();
    let json = service.changelog().export_json();
    assert!(json.contains("\"kind\": \"add\""));
    assert!(json.contains("ou=Roles,o=MNN,c=WW,ou=system"));
    assert!(json.contains("\"revertible\": true"));
}
