mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, temp_dir};

const ADA_ALAN: &str = "first_name,last_name,email\nAda,Lovelace,Ada@Example.com\nAlan,Turing,alan@example.com\n";
const ADA_ONLY: &str = "first_name,last_name,email\nAda,Lovelace,ada@example.com\n";

#[test]
fn adding_the_same_csv_twice_skips_existing_rows() {
    let ws = temp_dir();
    let mut sc = spawn_sidecar();
    sc.select_workspace(ws.path());

    let first = sc.request_ok(
        "roster.add",
        json!({ "csv_text": ADA_ALAN, "filename": "period1.csv" }),
    );
    assert_eq!(first["action"], "add");
    assert_eq!(first["summary"]["added"], 2);
    assert_eq!(first["summary"]["skipped"], 0);
    assert_eq!(first["summary"]["total_processed"], 2);
    assert!(first["summary"].get("removed").is_none());
    assert_eq!(first["upload_history"]["filename"], "period1.csv");

    let second = sc.request_ok("roster.add", json!({ "csv_text": ADA_ALAN }));
    assert_eq!(second["summary"]["added"], 0);
    assert_eq!(second["summary"]["skipped"], 2);
    let errors = second["errors"].as_array().expect("errors");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["line"], 1);
    assert_eq!(errors[0]["email"], "ada@example.com");
    assert_eq!(errors[0]["reason"], "already exists");

    let listed = sc.request_ok("roster.list", json!({}));
    assert_eq!(listed["total"], 2);

    let uploads = sc.request_ok("roster.uploads.list", json!({}));
    assert_eq!(uploads["total"], 2);
    let newest = uploads["items"][0]["id"].as_i64().expect("upload id");
    assert_eq!(newest, second["upload_id"].as_i64().expect("second id"));

    let detail = sc.request_ok("roster.uploads.get", json!({ "upload_id": newest }));
    assert_eq!(detail["changes"].as_array().map(|c| c.len()), Some(2));
    assert_eq!(detail["changes"][0]["type"], "skipped");
}

#[test]
fn drop_then_add_restores_the_same_row() {
    let ws = temp_dir();
    let mut sc = spawn_sidecar();
    sc.select_workspace(ws.path());

    let added = sc.request_ok("roster.add", json!({ "csv_text": ADA_ONLY }));
    let roster_id = added["upload_history"]["changes"][0]["roster_id"]
        .as_i64()
        .expect("roster id");

    let dropped = sc.request_ok("roster.drop", json!({ "csv_text": ADA_ALAN }));
    assert_eq!(dropped["summary"]["removed"], 1);
    assert_eq!(dropped["summary"]["not_found"], 1);
    assert!(dropped["errors"].as_array().expect("errors").is_empty());

    let active = sc.request_ok("roster.list", json!({}));
    assert_eq!(active["total"], 0);
    let everyone = sc.request_ok("roster.list", json!({ "include_deleted": true }));
    assert_eq!(everyone["total"], 1);

    let readded = sc.request_ok("roster.add", json!({ "csv_text": ADA_ONLY }));
    assert_eq!(readded["summary"]["restored"], 1);
    assert_eq!(readded["summary"]["added"], 0);

    let row = sc.request_ok("roster.get", json!({ "roster_id": roster_id }));
    assert!(row["deleted_at"].is_null());
    assert_eq!(row["last_updated_via"], "csv_add");
}

#[test]
fn sync_updates_names_and_reports_bad_rows() {
    let ws = temp_dir();
    let mut sc = spawn_sidecar();
    sc.select_workspace(ws.path());
    sc.request_ok("roster.add", json!({ "csv_text": ADA_ONLY }));

    let csv = "Email,First_Name,Last_Name\nada@example.com,Augusta,King\n,Grace,Hopper\nnobody,No,Body\nkatherine@example.com,Katherine,Johnson\n";
    let synced = sc.request_ok("roster.sync", json!({ "csv_text": csv }));
    assert_eq!(synced["summary"]["updated"], 1);
    assert_eq!(synced["summary"]["added"], 2);
    assert_eq!(synced["summary"]["skipped"], 1);
    assert_eq!(synced["summary"]["total_processed"], 4);
    let errors = synced["errors"].as_array().expect("errors");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["line"], 2);
    assert_eq!(errors[0]["reason"], "missing email");

    // only blank fields skip a row; the address itself is taken as given
    let bare_id = synced["upload_history"]["changes"][2]["roster_id"].clone();
    let bare = sc.request_ok("roster.get", json!({ "roster_id": bare_id }));
    assert_eq!(bare["email"], "nobody");
    assert!(bare["deleted_at"].is_null());

    let listed = sc.request_ok("roster.list", json!({ "search": "augusta" }));
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["last_name"], "King");
}

#[test]
fn upload_rejects_bad_input_without_history() {
    let ws = temp_dir();
    let mut sc = spawn_sidecar();
    sc.select_workspace(ws.path());

    assert_eq!(
        sc.request_err("roster.add", json!({ "csv_text": "name,email\nAda,ada@example.com\n" })),
        "bad_params"
    );
    assert_eq!(sc.request_err("roster.add", json!({ "csv_text": "" })), "bad_params");
    assert_eq!(sc.request_err("roster.sync", json!({})), "bad_params");

    let missing = ws.path().join("missing.csv");
    let resp = sc.request("roster.add", json!({ "in_path": missing.to_string_lossy() }));
    assert_eq!(resp["error"]["code"], "io_failed");
    assert!(resp["error"]["details"]["path"].is_string());

    let uploads = sc.request_ok("roster.uploads.list", json!({}));
    assert_eq!(uploads["total"], 0);
}

#[test]
fn upload_from_file_uses_its_name() {
    let ws = temp_dir();
    let csv_path = ws.path().join("period2.csv");
    std::fs::write(&csv_path, ADA_ONLY).expect("write csv");

    let mut sc = spawn_sidecar();
    sc.select_workspace(ws.path());
    let out = sc.request_ok("roster.add", json!({ "in_path": csv_path.to_string_lossy() }));
    assert_eq!(out["upload_history"]["filename"], "period2.csv");
    assert_eq!(out["summary"]["added"], 1);
}

#[test]
fn template_is_returned_and_written() {
    let ws = temp_dir();
    let out_path = ws.path().join("exports").join("template.csv");
    let mut sc = spawn_sidecar();

    let inline = sc.request_ok("roster.template", json!({}));
    assert_eq!(inline["filename"], "students_template.csv");
    let content = inline["content"].as_str().expect("content").to_string();
    assert!(content.starts_with("first_name,last_name,email\n"));
    assert!(inline.get("path").is_none());

    let written = sc.request_ok(
        "roster.template",
        json!({ "out_path": out_path.to_string_lossy() }),
    );
    assert!(written["path"].is_string());
    let on_disk = std::fs::read_to_string(&out_path).expect("read template");
    assert_eq!(on_disk, content);
}

#[test]
fn manual_edits_and_deletes() {
    let ws = temp_dir();
    let mut sc = spawn_sidecar();
    sc.select_workspace(ws.path());

    let created = sc.request_ok(
        "roster.create",
        json!({ "email": "Grace@Example.com", "first_name": "Grace", "last_name": "Hopper", "class_name": "P1" }),
    );
    let id = created["id"].as_i64().expect("id");
    assert_eq!(created["email"], "grace@example.com");
    assert_eq!(created["last_updated_via"], "manual");

    assert_eq!(
        sc.request_err(
            "roster.create",
            json!({ "email": "grace@example.com", "first_name": "G", "last_name": "H" }),
        ),
        "conflict"
    );

    let patched = sc.request_ok(
        "roster.update",
        json!({ "roster_id": id, "notes": "front row", "class_name": null }),
    );
    assert_eq!(patched["notes"], "front row");
    assert!(patched["class_name"].is_null());
    assert_eq!(patched["last_updated_via"], "inline");
    assert_eq!(
        sc.request_err("roster.update", json!({ "roster_id": id, "grade": 9 })),
        "bad_params"
    );

    let deleted = sc.request_ok("roster.delete", json!({ "roster_id": id }));
    assert_eq!(deleted["deleted"], true);
    assert_eq!(deleted["hard"], false);

    let other = sc.request_ok(
        "roster.create",
        json!({ "email": "grace@example.com", "first_name": "Grace", "last_name": "Brewster" }),
    );
    assert_eq!(sc.request_err("roster.restore", json!({ "roster_id": id })), "conflict");

    let other_id = other["id"].as_i64().expect("other id");
    let bulk = sc.request_ok(
        "roster.bulkDelete",
        json!({ "roster_ids": [id, other_id, 9999], "hard": true }),
    );
    assert_eq!(bulk["deleted"], 2);
    assert_eq!(sc.request_err("roster.get", json!({ "roster_id": id })), "not_found");
    assert_eq!(
        sc.request_err("roster.bulkDelete", json!({ "roster_ids": [] })),
        "bad_params"
    );
}
