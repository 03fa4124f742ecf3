//! Shared datasets and service factories.

use std::sync::Arc;

use oxidir_core::{CoreSession, DirectoryService};
use oxidir_error::Result;
use oxidir_partition::{AvlPartition, Partition};
use oxidir_types::{Dn, Entry, Registries, Value};

/// Entry ids in the fixture format: `00000000-0000-0000-0000-0000000000NN`.
pub fn uuid(n: u32) -> String {
    format!("00000000-0000-0000-0000-{n:012}")
}

/// The example store: a small company tree with hand-assigned entry ids,
/// indexed on the attributes the search tests drive through.
///
/// ```text
/// o=Good Times Co.                          #1
/// ├── ou=Sales                              #2
/// │   └── cn=JOhnny WAlkeR                  #5
/// ├── ou=Board of Directors                 #3
/// │   ├── cn=JIM BEAN                       #6
/// │   └── ou=Apache                         #7
/// └── ou=Engineering                        #4
///     └── cn=Jack Daniels                   #8
/// ```
pub fn example_partition(registries: &Arc<Registries>) -> Arc<AvlPartition> {
    let partition = Arc::new(AvlPartition::new(
        "example",
        Dn::parse("o=Good Times Co.").expect("suffix parses"),
        registries.clone(),
    ));
    partition.add_index("objectClass");
    partition.add_index("ou");
    partition.add_index("cn");

    let add = |dn: &str, n: u32, pairs: &[(&str, &str)]| {
        let dn = Dn::parse(dn).expect("fixture DN parses").normalize(registries);
        let mut entry = Entry::from_attrs(dn, pairs.iter().copied(), registries);
        entry.add_value_with("entryUUID", Value::text(uuid(n)), registries);
        partition.add(entry).expect("fixture entry loads");
    };

    add(
        "o=Good Times Co.",
        1,
        &[
            ("objectClass", "top"),
            ("objectClass", "organization"),
            ("o", "Good Times Co."),
        ],
    );
    add(
        "ou=Sales,o=Good Times Co.",
        2,
        &[
            ("objectClass", "top"),
            ("objectClass", "organizationalUnit"),
            ("ou", "Sales"),
        ],
    );
    add(
        "ou=Board of Directors,o=Good Times Co.",
        3,
        &[
            ("objectClass", "top"),
            ("objectClass", "organizationalUnit"),
            ("ou", "Board of Directors"),
        ],
    );
    add(
        "ou=Engineering,o=Good Times Co.",
        4,
        &[
            ("objectClass", "top"),
            ("objectClass", "organizationalUnit"),
            ("ou", "Engineering"),
        ],
    );
    add(
        "cn=JOhnny WAlkeR,ou=Sales,o=Good Times Co.",
        5,
        &[
            ("objectClass", "top"),
            ("objectClass", "person"),
            ("cn", "JOhnny WAlkeR"),
            ("sn", "WAlkeR"),
        ],
    );
    add(
        "cn=JIM BEAN,ou=Board of Directors,o=Good Times Co.",
        6,
        &[
            ("objectClass", "top"),
            ("objectClass", "person"),
            ("cn", "JIM BEAN"),
            ("sn", "BEAN"),
        ],
    );
    add(
        "ou=Apache,ou=Board of Directors,o=Good Times Co.",
        7,
        &[
            ("objectClass", "top"),
            ("objectClass", "organizationalUnit"),
            ("ou", "Apache"),
        ],
    );
    add(
        "cn=Jack Daniels,ou=Engineering,o=Good Times Co.",
        8,
        &[
            ("objectClass", "top"),
            ("objectClass", "person"),
            ("cn", "Jack Daniels"),
            ("sn", "Daniels"),
        ],
    );

    partition
}

/// The referral fixture tree under the system partition: two referral
/// entries and one plain entry below `o=MNN,c=WW,ou=system`.
pub const MNN_LDIF: &str = "\
dn: c=WW,ou=system
objectClass: country
objectClass: top
c: WW

dn: o=MNN,c=WW,ou=system
objectClass: organization
objectClass: top
o: MNN

dn: ou=Roles,o=MNN,c=WW,ou=system
objectClass: extensibleObject
objectClass: referral
objectClass: top
ou: Roles
ref: ldap://hostd/ou=Roles,dc=apache,dc=org

dn: ou=People,o=MNN,c=WW,ou=system
objectClass: extensibleObject
objectClass: referral
objectClass: top
ou: People
ref: ldap://hostb/OU=People,DC=example,DC=com
ref: ldap://hostc/OU=People,O=MNN,C=WW

dn: cn=Alex Karasulu,o=MNN,c=WW,ou=system
objectClass: person
objectClass: top
cn: Alex Karasulu
sn: akarasulu
";

/// A service with the change-log enabled and the MNN referral fixture
/// applied. Tests tag the post-fixture revision and revert to it.
pub fn mnn_service() -> Result<(DirectoryService, CoreSession)> {
    crate::init_tracing();
    let service = DirectoryService::new()?;
    service.changelog().set_enabled(true);
    let session = service.admin_session();
    service.apply_ldif(&session, MNN_LDIF)?;
    Ok((service, session))
}

/// A service with the example store mounted as its own partition.
pub fn example_service() -> Result<(DirectoryService, CoreSession)> {
    crate::init_tracing();
    let service = DirectoryService::new()?;
    let partition = example_partition(service.registries());
    service.uuid_allocator().reserve_through(11);
    service.add_partition(partition)?;
    let session = service.admin_session();
    Ok((service, session))
}
