use super::*;
use serde_json::json;

#[test]
fn missing_optional_preference_fields_default_to_empty() {
    let submission: PreferenceSubmission =
        serde_json::from_value(json!({ "name": "Ada", "period": "3" })).expect("json");
    assert_eq!(submission.name, "Ada");
    assert_eq!(submission.period, "3");
    assert!(submission.preferred_partner.is_empty());
    assert!(submission.preferred_location.is_empty());
}

#[test]
fn stored_preference_is_flat_with_timestamp() {
    let stored = StoredPreference {
        submission: PreferenceSubmission {
            name: "Ada".into(),
            period: "2".into(),
            preferred_partner: "Grace".into(),
            non_preferred_partner: "Linus".into(),
            preferred_location: "front".into(),
        },
        timestamp: "2024-09-01T12:00:00.000Z".into(),
    };
    let value = serde_json::to_value(&stored).expect("json");
    assert_eq!(
        value,
        json!({
            "name": "Ada",
            "period": "2",
            "preferredPartner": "Grace",
            "nonPreferredPartner": "Linus",
            "preferredLocation": "front",
            "timestamp": "2024-09-01T12:00:00.000Z",
        })
    );
}

#[test]
fn layout_actions_use_tagged_camel_case_payloads() {
    let action = LayoutAction::AssignStudent {
        row_index: 0,
        pod_index: 1,
        student_id: StudentId(42),
    };
    let value = serde_json::to_value(&action).expect("json");
    assert_eq!(
        value,
        json!({
            "type": "assign_student",
            "payload": { "rowIndex": 0, "podIndex": 1, "studentId": 42 }
        })
    );

    let parsed: LayoutAction = serde_json::from_value(json!({ "type": "add_row" })).expect("json");
    assert_eq!(parsed, LayoutAction::AddRow);
    assert_eq!(parsed.kind(), "add_row");
}

#[test]
fn rejected_outcome_carries_reason() {
    let outcome = ActionOutcome::from(Err(RejectReason::PodFull));
    assert!(!outcome.is_accepted());
    assert_eq!(
        serde_json::to_value(outcome).expect("json"),
        json!({ "status": "rejected", "reason": "pod_full" })
    );
    assert_eq!(
        serde_json::to_value(ActionOutcome::from(Ok(()))).expect("json"),
        json!({ "status": "accepted" })
    );
}
