use super::*;
use serde_json::json;

fn report(value: Value) -> RawStatsReport {
    value.as_object().cloned().expect("report must be an object")
}

#[test]
fn test_legacy_active_pair() {
    let report = report(json!({
        "Conn-audio-1-0": {
            "id": "Conn-audio-1-0",
            "type": "googCandidatePair",
            "googActiveConnection": "true",
            "localCandidateId": "Cand-abc",
            "remoteCandidateId": "Cand-def"
        },
        "Conn-audio-1-1": {
            "id": "Conn-audio-1-1",
            "type": "googCandidatePair",
            "googActiveConnection": "false",
            "localCandidateId": "Cand-xyz"
        },
        "Cand-abc": {
            "id": "Cand-abc",
            "type": "localcandidate",
            "ipAddress": "192.168.1.100",
            "priority": "2122260223"
        },
        "Cand-xyz": {"id": "Cand-xyz", "type": "localcandidate"}
    }));

    let cand = find_active_local_candidate(&report).expect("active candidate");
    assert_eq!(cand.get("id"), Some(&json!("Cand-abc")));
    assert_eq!(cand.get("ipAddress"), Some(&json!("192.168.1.100")));
}

#[test]
fn test_standard_selected_pair() {
    let report = report(json!({
        "pair_1": {
            "type": "candidate-pair",
            "selected": true,
            "localCandidateId": "local_1"
        },
        "local_1": {"type": "local-candidate", "candidateType": "host"}
    }));

    let cand = find_active_local_candidate(&report).expect("active candidate");
    assert_eq!(cand.get("candidateType"), Some(&json!("host")));
}

#[test]
fn test_standard_nominated_pair() {
    let report = report(json!({
        "pair_1": {
            "type": "candidate-pair",
            "nominated": true,
            "state": "in-progress",
            "localCandidateId": "local_1"
        },
        "pair_2": {
            "type": "candidate-pair",
            "nominated": true,
            "state": "succeeded",
            "localCandidateId": "local_2"
        },
        "local_1": {"type": "local-candidate", "candidateType": "host"},
        "local_2": {"type": "local-candidate", "candidateType": "relay"}
    }));

    let cand = find_active_local_candidate(&report).expect("active candidate");
    assert_eq!(cand.get("candidateType"), Some(&json!("relay")));
}

#[test]
fn test_no_active_pair() {
    let report = report(json!({
        "Conn-audio-1-0": {
            "type": "googCandidatePair",
            "googActiveConnection": "false",
            "localCandidateId": "Cand-abc"
        },
        "Cand-abc": {"type": "localcandidate"}
    }));
    assert!(find_active_local_candidate(&report).is_none());
}

#[test]
fn test_active_pair_with_missing_candidate() {
    let report = report(json!({
        "Conn-audio-1-0": {
            "type": "googCandidatePair",
            "googActiveConnection": "true",
            "localCandidateId": "Cand-gone"
        }
    }));
    assert!(find_active_local_candidate(&report).is_none());
}

#[test]
fn test_session_capture_subscriptions() {
    let mut subs = SessionCapture::subscriptions();
    assert_eq!(subs.len(), 2);

    assert!(subs.dispatch(&IceConnectionState::Checking).is_empty());
    assert_eq!(
        subs.dispatch(&IceConnectionState::Connected),
        vec![SessionCapture::ActiveCandidate, SessionCapture::Descriptions]
    );
    assert!(subs.dispatch(&IceConnectionState::Completed).is_empty());
    assert!(subs.is_empty());
}

#[test]
fn test_session_capture_on_failure() {
    let mut subs = SessionCapture::subscriptions();

    assert_eq!(
        subs.dispatch(&IceConnectionState::Failed),
        vec![SessionCapture::Descriptions]
    );
    assert_eq!(
        subs.dispatch(&IceConnectionState::Completed),
        vec![SessionCapture::ActiveCandidate]
    );
    assert!(subs.is_empty());
}
