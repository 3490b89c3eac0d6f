use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_unit(root: &Path, id: &str, apply: &str, revert: &str) {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join(format!("{}.apply.sql", id)), apply).unwrap();
    fs::write(root.join(format!("{}.revert.sql", id)), revert).unwrap();
}

/// Project with a `users` and a `countries` application and a config file
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let users = dir.path().join("migrations/users");
    let countries = dir.path().join("migrations/countries");

    write_unit(
        &users,
        "001-create-users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY);",
        "DROP TABLE users;",
    );
    write_unit(
        &users,
        "002-add-email",
        "ALTER TABLE users ADD COLUMN email TEXT;",
        "ALTER TABLE users DROP COLUMN email;",
    );
    write_unit(
        &countries,
        "001-create-countries",
        "CREATE TABLE countries (code TEXT PRIMARY KEY);",
        "DROP TABLE countries;",
    );

    let config = format!(
        "db_uri: sqlite://{}?mode=rwc\nmigrations:\n  users: {}\n  countries: {}\n",
        dir.path().join("app.db").display(),
        users.display(),
        countries.display()
    );
    fs::write(dir.path().join("migrations.yml"), config).unwrap();
    dir
}

fn sqlmig(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sqlmig").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("DATABASE_URL")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_show_before_anything_is_applied() {
    let dir = project();
    sqlmig(&dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("users"))
        .stdout(predicate::str::contains("001-create-users"))
        .stdout(predicate::str::contains("(applied)").not());
}

#[test]
fn test_apply_all_then_reapply() {
    let dir = project();
    sqlmig(&dir)
        .args(["apply", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Migrating users..."))
        .stdout(predicate::str::contains("Applying users/001-create-users..."))
        .stdout(predicate::str::contains("Migrating countries..."))
        .stdout(predicate::str::contains("OK."));

    sqlmig(&dir)
        .args(["apply", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SKIPPED."))
        .stdout(predicate::str::contains("OK.").not());

    sqlmig(&dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("002-add-email (applied)"))
        .stdout(predicate::str::contains("001-create-countries (applied)"));
}

#[test]
fn test_verbose_prints_statements() {
    let dir = project();
    sqlmig(&dir)
        .args(["apply", "users/001-create-users", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE users"));
}

#[test]
fn test_revert_and_json_show() {
    let dir = project();
    sqlmig(&dir).args(["apply", "all"]).assert().success();
    sqlmig(&dir)
        .args(["revert", "users/002-add-email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reverting users/002-add-email..."));

    let output = sqlmig(&dir).args(["show", "--json"]).output().unwrap();
    assert!(output.status.success());
    let statuses: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(statuses[0]["app"], "users");
    assert_eq!(statuses[0]["migrations"][0]["applied"], true);
    assert_eq!(statuses[0]["migrations"][1]["migration"], "002-add-email");
    assert_eq!(statuses[0]["migrations"][1]["applied"], false);
    assert_eq!(statuses[1]["migrations"][0]["applied"], true);
}

#[test]
fn test_unknown_migration_fails() {
    let dir = project();
    sqlmig(&dir)
        .args(["apply", "users/999-nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown migration \"users/999-nope\""));

    sqlmig(&dir)
        .args(["apply", "nowhere/001"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown app \"nowhere\""));
}

#[test]
fn test_revert_all_is_rejected() {
    let dir = project();
    sqlmig(&dir)
        .args(["revert", "all"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not supported"));
}

#[test]
fn test_invalid_target() {
    let dir = project();
    sqlmig(&dir)
        .args(["apply", "users"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid target"));
}

#[test]
fn test_failing_migration_reports_failure() {
    let dir = project();
    write_unit(
        &dir.path().join("migrations/users"),
        "003-broken",
        "INSERT INTO missing_table VALUES (1);",
        "SELECT 1;",
    );

    sqlmig(&dir)
        .args(["apply", "all"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILED."))
        .stderr(predicate::str::contains("users/003-broken"));

    sqlmig(&dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("002-add-email (applied)"))
        .stdout(predicate::str::contains("003-broken (applied)").not())
        .stdout(predicate::str::contains("001-create-countries (applied)").not());
}

#[test]
fn test_single_application_flags() {
    let dir = project();
    let db = format!("sqlite://{}?mode=rwc", dir.path().join("flags.db").display());
    let migrations = dir.path().join("migrations/countries");

    Command::cargo_bin("sqlmig")
        .unwrap()
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .args(["--db-uri", db.as_str(), "--app", "countries", "--migrations"])
        .arg(&migrations)
        .args(["apply", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Applying countries/001-create-countries..."));
}

#[test]
fn test_incomplete_unit_fails_before_connecting() {
    let dir = project();
    fs::write(
        dir.path().join("migrations/users/003-orphan.apply.sql"),
        "SELECT 1;",
    )
    .unwrap();

    sqlmig(&dir)
        .arg("show")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("003-orphan"));
}

#[test]
fn test_missing_configuration() {
    let dir = TempDir::new().unwrap();
    sqlmig(&dir)
        .arg("show")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no configuration"));
}

#[test]
fn test_unknown_target_is_reported_without_a_database() {
    let dir = project();
    let unreachable = format!(
        "sqlite://{}",
        dir.path().join("no-such-dir").join("app.db").display()
    );
    let migrations = dir.path().join("migrations/users");

    for (command, target, message) in [
        ("apply", "nowhere/001", "unknown app \"nowhere\""),
        ("revert", "users/999-nope", "unknown migration \"users/999-nope\""),
        ("revert", "all", "not supported"),
    ] {
        Command::cargo_bin("sqlmig")
            .unwrap()
            .current_dir(dir.path())
            .env_remove("RUST_LOG")
            .args(["--db-uri", unreachable.as_str(), "--app", "users", "--migrations"])
            .arg(&migrations)
            .args([command, target])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(message))
            .stderr(predicate::str::contains("Unable to connect").not());
    }
}

#[test]
fn test_unreachable_database_reports_the_cause_once() {
    let dir = project();
    let unreachable = format!(
        "sqlite://{}",
        dir.path().join("no-such-dir").join("app.db").display()
    );
    let migrations = dir.path().join("migrations/users");

    let output = Command::cargo_bin("sqlmig")
        .unwrap()
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .args(["--db-uri", unreachable.as_str(), "--app", "users", "--migrations"])
        .arg(&migrations)
        .args(["apply", "all"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Unable to connect to database").count(), 1);
    assert_eq!(stderr.matches("unable to open database file").count(), 1);
}

#[test]
fn test_ledger_conflict_exits_with_code_2() {
    let dir = project();
    write_unit(
        &dir.path().join("migrations/users"),
        "003-self-recording",
        "INSERT INTO snaql_migrations (app, migration, applied) \
         VALUES ('users', '003-self-recording', CURRENT_TIMESTAMP);",
        "SELECT 1;",
    );

    sqlmig(&dir)
        .args(["apply", "users/003-self-recording"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("FAILED."))
        .stderr(predicate::str::contains("Ledger inconsistency"))
        .stderr(predicate::str::contains("users/003-self-recording"));

    sqlmig(&dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("002-add-email (applied)"))
        .stdout(predicate::str::contains("003-self-recording (applied)").not());
}
