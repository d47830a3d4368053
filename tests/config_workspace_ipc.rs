mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, spawn_sidecar_with_env, temp_dir};

#[test]
fn workspace_config_promotes_instructors() {
    let ws = temp_dir();
    std::fs::write(
        ws.path().join("bytepath.toml"),
        "[auth]\ninstructor_emails = [\"Teach@School.edu\"]\n\n[roster]\ndefault_page_size = 1\n",
    )
    .expect("write config");

    let mut sc = spawn_sidecar();
    sc.select_workspace(ws.path());

    let lead = sc.request_ok("auth.login", json!({ "email": "teach@school.edu" }));
    assert_eq!(lead["user"]["role"], "instructor");
    let student = sc.request_ok("auth.login", json!({ "email": "kid@school.edu" }));
    assert_eq!(student["user"]["role"], "student");

    sc.request_ok(
        "roster.add",
        json!({ "csv_text": "first_name,last_name,email\nAda,Lovelace,ada@example.com\nAlan,Turing,alan@example.com\n" }),
    );
    let page = sc.request_ok("roster.list", json!({ "sort_by": "last_name", "sort_order": "asc" }));
    assert_eq!(page["page_size"], 1);
    assert_eq!(page["total"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"][0]["last_name"], "Lovelace");
    assert_eq!(
        sc.request_err("roster.list", json!({ "sort_by": "shoe_size" })),
        "bad_params"
    );
}

#[test]
fn env_instructor_list_promotes_existing_student() {
    let ws = temp_dir();
    {
        let mut sc = spawn_sidecar();
        sc.select_workspace(ws.path());
        let first = sc.request_ok("auth.login", json!({ "email": "lead@school.edu" }));
        assert_eq!(first["user"]["role"], "student");
    }

    let mut sc = spawn_sidecar_with_env(&[("BYTEPATH_INSTRUCTOR_EMAILS", "lead@school.edu, other@school.edu")]);
    sc.select_workspace(ws.path());
    let again = sc.request_ok("auth.login", json!({ "email": "lead@school.edu" }));
    assert_eq!(again["created"], false);
    assert_eq!(again["user"]["role"], "instructor");
}

#[test]
fn workspace_env_opens_on_startup() {
    let ws = temp_dir();
    let path = ws.path().to_string_lossy().to_string();
    let mut sc = spawn_sidecar_with_env(&[("BYTEPATH_WORKSPACE", path.as_str())]);

    let health = sc.request_ok("health", json!({}));
    assert_eq!(health["workspace_path"], path.as_str());
    let topics = sc.request_ok("topics.list", json!({}));
    assert!(topics["topics"].as_array().expect("topics").is_empty());
}

#[test]
fn invalid_config_fails_workspace_select() {
    let ws = temp_dir();
    std::fs::write(ws.path().join("bytepath.toml"), "[auth\n").expect("write config");

    let mut sc = spawn_sidecar();
    let resp = sc.request("workspace.select", json!({ "path": ws.path().to_string_lossy() }));
    assert_eq!(resp["error"]["code"], "db_open_failed");
    assert_eq!(sc.request_err("topics.list", json!({})), "no_workspace");
}
