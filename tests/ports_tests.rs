use port_probe_rs::error::ValidationError;
use port_probe_rs::ports::normalize;

#[test]
fn parse_comma_list() {
    let ports = normalize("22,80,443").expect("parse ok");
    assert_eq!(ports.as_slice(), &[22, 80, 443]);
}

#[test]
fn parse_range_and_single() {
    let ports = normalize("20-25,80").expect("parse ok");
    assert_eq!(ports.as_slice(), &[20, 21, 22, 23, 24, 25, 80]);
}

#[test]
fn output_is_strictly_ascending_and_unique() {
    let ports = normalize("443, 1-5, 3, 80, 2-4, 65535, 443").expect("parse ok");
    assert!(ports.as_slice().windows(2).all(|w| w[0] < w[1]));
    assert!(ports.iter().all(|p| p >= 1));
    assert_eq!(ports.len(), 8);
}

#[test]
fn out_of_range_rejected() {
    assert!(matches!(
        normalize("70000"),
        Err(ValidationError::OutOfRange { ref token, .. }) if token == "70000"
    ));
}

#[test]
fn malformed_rejected() {
    assert_eq!(
        normalize("abc"),
        Err(ValidationError::Malformed { token: "abc".into() })
    );
}
