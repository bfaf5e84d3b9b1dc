use super::*;
use crate::test_helpers::{MIB, task};
use crate::types::{Action, TaskStatus};

#[test]
fn summary_rounds_and_converts_units() {
    let mut t = task("dbid_1", 3 * MIB, TaskStatus::Downloading, 2.0);
    t.downloaded_bytes = MIB;
    t.speed_bytes_per_sec = 1536;
    let now = t.created_at + chrono::Duration::minutes(125);

    let s = TaskSummary::from_task(&t, now);
    assert_eq!(s.id, "dbid_1");
    assert_eq!(s.name, "dbid_1.bin");
    assert_eq!(s.size_mb, 3.0);
    assert_eq!(s.status, "downloading");
    assert_eq!(s.speed_kb, 1.5);
    assert_eq!(s.progress_pct, 33.3);
    assert_eq!(s.age_hours, 2.1);
}

#[test]
fn summary_covers_every_task() {
    let tasks = vec![
        task("a", 0, TaskStatus::Waiting, 4.0),
        task("b", MIB, TaskStatus::Error, 0.1),
        task("c", MIB, TaskStatus::Other("mystery".into()), 1.0),
    ];
    let summaries = summarize(&tasks, Utc::now());
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[2].status, "mystery");
}

#[test]
fn prompt_states_thresholds_and_includes_tasks() {
    let policy = PolicyConfig {
        max_active_tasks: 4,
        dead_task_age_hours: 2.5,
        ..PolicyConfig::default()
    };
    let summaries = summarize(&[task("dbid_42", 0, TaskStatus::Waiting, 5.0)], Utc::now());
    let prompt = build_prompt(&summaries, &policy).unwrap();

    assert!(prompt.contains("at most 4 tasks"), "{prompt}");
    assert!(prompt.contains("exceeds 2.5 hours"), "{prompt}");
    assert!(prompt.contains("\"id\":\"dbid_42\""), "{prompt}");
    assert!(prompt.contains("delete|pause|resume|keep"));
}

#[test]
fn strip_leaves_plain_payload_alone() {
    assert_eq!(strip_wrappers("  [1, 2]\n"), "[1, 2]");
}

#[test]
fn strip_removes_fence_with_info_string() {
    let text = "```json\n[{\"id\":\"a\",\"action\":\"keep\"}]\n```";
    assert_eq!(strip_wrappers(text), "[{\"id\":\"a\",\"action\":\"keep\"}]");
}

#[test]
fn strip_handles_single_line_and_unterminated_fences() {
    assert_eq!(strip_wrappers("```[]```"), "[]");
    assert_eq!(strip_wrappers("```JSON\n[]\n"), "[]");
}

#[test]
fn strip_ignores_prose_around_the_fence() {
    let text = "Here is my plan:\n```json\n[]\n```\nGood luck!";
    assert_eq!(strip_wrappers(text), "[]");
}

#[test]
fn fenced_and_plain_payloads_parse_identically() {
    let plain = r#"[{"id":"A","action":"delete","reason":"dead"},{"id":"C","action":"PAUSE"}]"#;
    let fenced = format!("```json\n{plain}\n```");

    let from_plain = parse_decisions(strip_wrappers(plain)).unwrap();
    let from_fenced = parse_decisions(strip_wrappers(&fenced)).unwrap();

    assert_eq!(from_plain, from_fenced);
    assert_eq!(
        from_plain,
        vec![
            Decision::new("A", Action::Delete, "dead"),
            Decision::new("C", Action::Pause, ""),
        ]
    );
}

#[test]
fn non_json_reply_is_a_decode_error() {
    let err = parse_decisions("I could not decide").unwrap_err();
    assert!(matches!(err, OracleError::Decode(_)));
}

#[test]
fn non_array_reply_is_a_decode_error() {
    let err = parse_decisions(r#"{"id":"a","action":"keep"}"#).unwrap_err();
    assert!(matches!(err, OracleError::Decode(_)));
}

#[test]
fn malformed_elements_are_dropped_individually() {
    let payload = r#"[
        {"id":"a","action":"keep"},
        {"action":"delete"},
        {"id":7,"action":"pause"},
        "resume everything",
        {"id":"b","action":"throttle"}
    ]"#;
    let decisions = parse_decisions(payload).unwrap();
    assert_eq!(decisions.len(), 2);
    assert_eq!(decisions[0].task_id.as_str(), "a");
    assert_eq!(decisions[1].action, Action::Unrecognized("throttle".into()));
}

#[test]
fn element_without_action_is_kept_as_unrecognized() {
    let decisions = parse_decisions(r#"[{"id":"a","reason":"unsure"}]"#).unwrap();
    assert_eq!(
        decisions,
        vec![Decision::new("a", Action::Unrecognized(String::new()), "unsure")]
    );
}

#[test]
fn empty_array_is_an_explicit_empty_proposal() {
    assert_eq!(parse_decisions("[]").unwrap(), vec![]);
}

#[test]
fn unknown_ids_are_dropped() {
    let tasks = vec![task("a", 0, TaskStatus::Waiting, 1.0)];
    let decisions = vec![
        Decision::new("a", Action::Keep, ""),
        Decision::new("ghost", Action::Delete, "hallucinated"),
    ];
    let (kept, dropped) = retain_known(decisions, &tasks);
    assert_eq!(dropped, 1);
    assert_eq!(kept, vec![Decision::new("a", Action::Keep, "")]);
}

#[tokio::test]
async fn noop_provider_never_advises() {
    let tasks = vec![task("a", 0, TaskStatus::Waiting, 1.0)];
    assert!(
        NoOpDecisionProvider
            .propose(&tasks, &PolicyConfig::default())
            .await
            .is_none()
    );
}
