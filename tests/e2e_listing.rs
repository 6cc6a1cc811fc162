mod common;
use common::cli::{initialized, run_qt, run_qt_ok};

fn display_ids(page: &serde_json::Value) -> Vec<String> {
    page["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|item| item["displayId"].as_str().expect("displayId").to_string())
        .collect()
}

#[test]
fn test_role_scoped_issue_listing() {
    let workspace = initialized();
    run_qt_ok(&workspace, ["--as", "admin", "create", "issue", "Crash on save", "--status", "open"], "bug1");
    run_qt_ok(&workspace, ["--as", "tess", "create", "issue", "Typo on login page"], "bug2");
    run_qt_ok(&workspace, ["--as", "admin", "create", "issue", "Untriaged report"], "bug3");

    let tester = run_qt_ok(&workspace, ["--json", "--as", "tess", "--role", "tester", "list", "issue"], "tester");
    let page = tester.json();
    assert_eq!(page["total"], 2);
    assert_eq!(display_ids(&page), vec!["BUG-2", "BUG-1"]);

    let client = run_qt_ok(&workspace, ["--json", "--as", "carl", "--role", "client", "list", "issue"], "client");
    let page = client.json();
    assert_eq!(page["total"], 1);
    assert_eq!(display_ids(&page), vec!["BUG-1"]);

    let admin = run_qt_ok(&workspace, ["--json", "--role", "admin", "list", "issue"], "admin");
    assert_eq!(admin.json()["total"], 3);
}

#[test]
fn test_text_listing_and_footer() {
    let workspace = initialized();
    for title in ["First", "Second", "Third"] {
        run_qt_ok(&workspace, ["create", "task", title], title);
    }

    let out = run_qt_ok(&workspace, ["--role", "admin", "list", "task", "-n", "2"], "page1");
    assert!(out.stdout.contains("TASK-3"), "{}", out.stdout);
    assert!(out.stdout.contains("TASK-2"));
    assert!(!out.stdout.contains("TASK-1"));
    assert!(out.stdout.contains("Showing 1-2 of 3"));

    let out = run_qt_ok(&workspace, ["--role", "admin", "list", "task", "-n", "2", "--skip", "2"], "page2");
    assert!(out.stdout.contains("TASK-1"));
    assert!(out.stdout.contains("Showing 3-3 of 3"));
}

#[test]
fn test_skip_past_end_keeps_total() {
    let workspace = initialized();
    run_qt_ok(&workspace, ["create", "requirement", "Must log in"], "req");

    let out = run_qt_ok(&workspace, ["--json", "list", "requirement", "--skip", "10"], "past-end");
    let page = out.json();
    assert_eq!(page["total"], 1);
    assert!(page["items"].as_array().expect("items").is_empty());
}

#[test]
fn test_invalid_window_is_rejected() {
    let workspace = initialized();

    let out = run_qt(&workspace, ["list", "issue", "--skip", "-1"], "negative-skip");
    assert!(!out.status.success());
    assert!(out.stderr.contains("skip"), "{}", out.stderr);

    let out = run_qt(&workspace, ["--json", "list", "issue", "-n", "0"], "zero-limit");
    assert!(!out.status.success());
    let err = out.json();
    assert_eq!(err["code"], "E_VALIDATION");
    assert_eq!(err["retryable"], false);

    let out = run_qt(&workspace, ["list", "issue", "-n", "101"], "over-max");
    assert!(!out.status.success());
    assert!(out.stderr.contains("limit"), "{}", out.stderr);
}

#[test]
fn test_search_and_filters() {
    let workspace = initialized();
    run_qt_ok(&workspace, ["create", "issue", "Login button dead", "--status", "open", "--severity", "high"], "b1");
    run_qt_ok(&workspace, ["create", "issue", "Checkout total wrong", "--status", "fixed", "--severity", "low"], "b2");
    run_qt_ok(&workspace, ["create", "issue", "Logout hangs", "--status", "open", "--severity", "low"], "b3");

    let out = run_qt_ok(&workspace, ["--json", "list", "issue", "-s", "LOG"], "search");
    assert_eq!(display_ids(&out.json()), vec!["BUG-3", "BUG-1"]);

    let out = run_qt_ok(&workspace, ["--json", "list", "issue", "-s", "BUG-2"], "search-id");
    assert_eq!(display_ids(&out.json()), vec!["BUG-2"]);

    let out = run_qt_ok(&workspace, ["--json", "list", "issue", "--status", "open", "--severity", "low"], "filters");
    assert_eq!(display_ids(&out.json()), vec!["BUG-3"]);

    let out = run_qt_ok(&workspace, ["--json", "list", "issue", "--from", "2000-01-01", "--to", "2000-12-31"], "dates");
    assert_eq!(out.json()["total"], 0);
}

#[test]
fn test_show_hides_what_role_cannot_list() {
    let workspace = initialized();
    run_qt_ok(&workspace, ["--as", "admin", "create", "issue", "Secret crash"], "bug1");

    let out = run_qt_ok(&workspace, ["--as", "admin", "show", "issue", "BUG-1"], "admin-show");
    assert!(out.stdout.contains("Secret crash"));

    let out = run_qt(&workspace, ["--json", "--as", "carl", "--role", "client", "show", "issue", "BUG-1"], "client-show");
    assert!(!out.status.success());
    assert_eq!(out.json()["code"], "E_NOT_FOUND");

    let out = run_qt(&workspace, ["--json", "show", "issue", "TASK-1"], "wrong-prefix");
    assert!(!out.status.success());
    assert_eq!(out.json()["code"], "E_FORMAT_MISMATCH");
}

#[test]
fn test_invoices_hidden_from_testers() {
    let workspace = initialized();
    run_qt_ok(&workspace, ["create", "invoice", "March hours"], "inv");

    let out = run_qt_ok(&workspace, ["--json", "--as", "tess", "--role", "tester", "list", "invoice"], "tester");
    assert_eq!(out.json()["total"], 0);

    let out = run_qt_ok(&workspace, ["--json", "--role", "client", "list", "invoice"], "client");
    assert_eq!(display_ids(&out.json()), vec!["INV-1"]);
}

#[test]
fn test_commands_fail_outside_workspace() {
    let workspace = common::cli::QtWorkspace::new();
    let out = run_qt(&workspace, ["list", "issue"], "no-init");
    assert!(!out.status.success());
    assert!(out.stderr.contains("Error"), "{}", out.stderr);
}
