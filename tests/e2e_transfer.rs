mod common;
use common::cli::{initialized, run_qt, run_qt_ok};

#[test]
fn test_export_then_import_into_another_project() {
    let workspace = initialized();
    run_qt_ok(&workspace, ["create", "requirement", "Users can log in"], "req1");
    run_qt_ok(
        &workspace,
        [
            "create",
            "test_case",
            "Login happy path",
            "--suite",
            "Auth",
            "--refs",
            "REQ-1",
            "--steps",
            "1. Open login page | Expected: Form shown\n2. Submit valid credentials | Expected: Dashboard",
            "--data",
            "1. user (text): alice",
        ],
        "tc1",
    );

    let csv_path = workspace.root.join("cases.csv");
    let csv_arg = csv_path.to_string_lossy().into_owned();
    let out = run_qt_ok(&workspace, ["--json", "export", "test_case", "-o", csv_arg.as_str()], "export");
    assert_eq!(out.json()["rows"], 1);

    let csv = workspace.read_file(&csv_path);
    let header = csv.lines().next().expect("header row");
    assert!(header.starts_with("ID,Title,Description,Suite,Priority,Status,Steps,Test Data,Requirements,Created"));
    assert!(csv.contains("TC-1"));
    assert!(csv.contains("Open login page"));
    assert!(csv.contains("REQ-1"));

    run_qt_ok(&workspace, ["--project", "beta", "create", "requirement", "Users can log in"], "beta-req");
    let out = run_qt_ok(
        &workspace,
        ["--json", "--project", "beta", "import", "test_case", csv_arg.as_str()],
        "import",
    );
    let report = out.json();
    assert_eq!(report["created"], 1);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["createdGroups"][0], "Auth");

    let out = run_qt_ok(&workspace, ["--json", "--project", "beta", "show", "test_case", "TC-1"], "show");
    let details = out.json();
    assert_eq!(details["title"], "Login happy path");
    assert_eq!(details["groupName"], "Auth");
    assert_eq!(details["steps"].as_array().map(Vec::len), Some(2));
    assert_eq!(details["steps"][1]["expected"], "Dashboard");
    assert_eq!(details["testData"][0]["value"], "alice");
    assert_eq!(details["referenceIds"][0], "REQ-1");
}

#[test]
fn test_export_respects_role_scope() {
    let workspace = initialized();
    run_qt_ok(&workspace, ["create", "issue", "Visible", "--status", "open"], "b1");
    run_qt_ok(&workspace, ["create", "issue", "Untriaged"], "b2");

    let out = run_qt_ok(&workspace, ["--role", "client", "export", "issue", "-o", "-"], "client-export");
    assert!(out.stdout.contains("Visible"));
    assert!(!out.stdout.contains("Untriaged"));
    assert_eq!(out.stdout.lines().count(), 2, "{}", out.stdout);
}

#[test]
fn test_import_reports_row_failures() {
    let workspace = initialized();
    let file = workspace.write_file(
        "issues.csv",
        "Title,Status,Severity\n\
         Login broken,OPEN,HIGH\n\
         ,OPEN,LOW\n\
         Bad severity,OPEN,catastrophic\n\
         Checkout fails,FIXED,CRITICAL\n",
    );
    let file = file.to_string_lossy().into_owned();

    let out = run_qt_ok(&workspace, ["import", "issue", file.as_str()], "import");
    assert!(out.stdout.contains("Imported 2 of 4 row(s), 2 failed"), "{}", out.stdout);
    assert!(out.stdout.contains("row 2:"));
    assert!(out.stdout.contains("row 3:"));

    let out = run_qt_ok(&workspace, ["--json", "list", "issue"], "list");
    assert_eq!(out.json()["total"], 2);
}

#[test]
fn test_import_without_title_column_fails_batch() {
    let workspace = initialized();
    let file = workspace.write_file("bad.csv", "Name of thing,Status\nx,OPEN\n");
    let file = file.to_string_lossy().into_owned();

    let out = run_qt(&workspace, ["--json", "import", "task", file.as_str()], "import");
    assert!(!out.status.success());
    assert_eq!(out.json()["code"], "E_VALIDATION");
}

#[test]
fn test_format_set_changes_rendering() {
    let workspace = initialized();
    run_qt_ok(&workspace, ["create", "requirement", "Must log in"], "req");

    let out = run_qt(&workspace, ["--role", "tester", "format", "set", "requirement", "R{customId}"], "tester-set");
    assert!(!out.status.success());
    assert!(out.stderr.contains("admin"), "{}", out.stderr);

    let out = run_qt(&workspace, ["--json", "format", "set", "requirement", "REQ"], "no-placeholder");
    assert!(!out.status.success());
    assert_eq!(out.json()["code"], "E_INVALID_PATTERN");

    run_qt_ok(&workspace, ["format", "set", "requirement", "R{customId}/A"], "admin-set");

    let out = run_qt_ok(&workspace, ["format", "show", "requirement"], "show");
    assert!(out.stdout.contains("R42/A"), "{}", out.stdout);

    let out = run_qt_ok(&workspace, ["--json", "list", "requirement"], "list");
    assert_eq!(out.json()["items"][0]["displayId"], "R1/A");

    run_qt_ok(&workspace, ["show", "requirement", "R1/A"], "show-new-pattern");
}

#[test]
fn test_init_twice_needs_force() {
    let workspace = initialized();
    let out = run_qt(&workspace, ["init"], "init-again");
    assert!(!out.status.success());
    assert!(out.stderr.contains("--force"), "{}", out.stderr);

    run_qt_ok(&workspace, ["init", "--force"], "init-force");
    assert!(workspace.workspace_dir().join("config.yaml").exists());
}

#[test]
fn test_failed_create_leaves_no_suite_behind() {
    let workspace = initialized();

    let out = run_qt(
        &workspace,
        ["create", "test_case", "Login", "--suite", "Ghost", "--severity", "high"],
        "bad-severity",
    );
    assert!(!out.status.success());
    assert!(out.stderr.contains("severity"), "{}", out.stderr);

    let out = run_qt(&workspace, ["create", "test_case", "  ", "--suite", "Ghost"], "blank-title");
    assert!(!out.status.success());

    let out = run_qt(&workspace, ["create", "test_case", "Login", "--suite", "Ghost", "--refs", "REQ-9"], "missing-ref");
    assert!(!out.status.success());

    let out = run_qt_ok(&workspace, ["--json", "list", "test_suite"], "suites");
    assert_eq!(out.json()["total"], 0);

    run_qt_ok(&workspace, ["create", "test_case", "Login", "--suite", "Ghost"], "good");
    let out = run_qt_ok(&workspace, ["--json", "list", "test_suite"], "suites-after");
    assert_eq!(out.json()["total"], 1);
}
