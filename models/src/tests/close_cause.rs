use crate::CloseCause;

/// **VALUE**: The bridge reports causes by name and/or status code; both
/// paths must land on the same cause or the recovery policy diverges.
#[test]
fn given_wire_names_and_codes_when_parsed_then_agree() {
    let pairs = [
        ("loggedOut", 401),
        ("connectionLost", 408),
        ("connectionClosed", 428),
        ("connectionReplaced", 440),
        ("badSession", 500),
        ("restartRequired", 515),
    ];

    for (name, code) in pairs {
        assert_eq!(
            CloseCause::from_wire(Some(name), None),
            CloseCause::from_status_code(code),
            "name {name} and code {code} should map to the same cause"
        );
    }
}

#[test]
fn given_unrecognized_code_when_parsed_then_unknown_keeps_code() {
    let cause = CloseCause::from_wire(Some("streamErrored"), Some(599));

    assert!(!cause.is_recognized());
    assert_eq!(
        cause,
        CloseCause::Unknown {
            status_code: Some(599),
            reason: String::from("streamErrored"),
        }
    );
}

#[test]
fn given_no_reason_and_no_code_when_parsed_then_unknown() {
    let cause = CloseCause::from_wire(None, None);

    assert!(matches!(cause, CloseCause::Unknown { status_code: None, .. }));
}
