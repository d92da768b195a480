//! Integration tests for the cadastro CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to get a cadastro command with a clean environment
fn cadastro() -> Command {
    let mut cmd = Command::cargo_bin("cadastro").unwrap();
    cmd.env_remove("CADASTRO_CCA")
        .env_remove("CADASTRO_CHUNK_SIZE")
        .env_remove("CADASTRO_LOG");
    cmd
}

/// Helper to create a test project in a temp directory
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    cadastro().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Helper to add reference values
fn add_refs(tmp: &TempDir, set: &str, names: &[&str]) {
    cadastro()
        .current_dir(tmp.path())
        .args(["ref", "add", set])
        .args(names)
        .assert()
        .success();
}

/// Project with the usual piping references
fn setup_piping_project() -> TempDir {
    let tmp = setup_test_project();
    add_refs(&tmp, "linhas", &["L-1001", "L-1002"]);
    add_refs(&tmp, "areas", &["Área 1"]);
    add_refs(&tmp, "fluidos", &["Água"]);
    add_refs(&tmp, "disciplinas", &["Elétrica", "Tubulação"]);
    tmp
}

fn write_csv(tmp: &TempDir, name: &str, content: &str) -> String {
    fs::write(tmp.path().join(name), content).unwrap();
    name.to_string()
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    cadastro()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("ref"));
}

#[test]
fn test_version_displays() {
    cadastro()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cadastro"));
}

#[test]
fn test_unknown_module_rejected() {
    let tmp = setup_test_project();
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "tubos", "--template"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown module"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();

    cadastro()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized cadastro project"));

    assert!(tmp.path().join(".cadastro").is_dir());
    assert!(tmp.path().join(".cadastro/config.yaml").is_file());
    assert!(tmp.path().join(".cadastro/cadastro.db").is_file());
}

#[test]
fn test_init_twice_reports_existing() {
    let tmp = setup_test_project();
    cadastro()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_commands_outside_project_fail() {
    let tmp = TempDir::new().unwrap();
    cadastro()
        .current_dir(tmp.path())
        .args(["list", "juntas"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a cadastro project"));
}

// ============================================================================
// Reference Tests
// ============================================================================

#[test]
fn test_ref_add_list_remove() {
    let tmp = setup_test_project();
    add_refs(&tmp, "linhas", &["L-1001", "L-1002"]);

    cadastro()
        .current_dir(tmp.path())
        .args(["ref", "add", "linhas", "l-1001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    cadastro()
        .current_dir(tmp.path())
        .args(["ref", "list", "linhas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("L-1001"))
        .stdout(predicate::str::contains("L-1002"));

    cadastro()
        .current_dir(tmp.path())
        .args(["ref", "remove", "linhas", "L-1002"])
        .assert()
        .success();

    cadastro()
        .current_dir(tmp.path())
        .args(["ref", "list", "linhas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("L-1002").not());
}

#[test]
fn test_ref_desenhos_is_import_only() {
    let tmp = setup_test_project();
    cadastro()
        .current_dir(tmp.path())
        .args(["ref", "add", "desenhos", "DE-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("import module"));
}

#[test]
fn test_ref_sets_lists_all() {
    let tmp = setup_test_project();
    cadastro()
        .current_dir(tmp.path())
        .args(["ref", "sets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disciplinas"))
        .stdout(predicate::str::contains("desenhos"));
}

// ============================================================================
// Template Tests
// ============================================================================

#[test]
fn test_template_to_stdout_uses_reference_names() {
    let tmp = setup_piping_project();
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "juntas", "--template"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("NUMERO_JUNTA,LINHA,DESENHO"))
        .stdout(predicate::str::contains("L-1001"))
        .stdout(predicate::str::contains("L-1002"));
}

#[test]
fn test_template_xlsx_imports_cleanly() {
    let tmp = setup_piping_project();
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "cabos", "--template", "-o", "cabos.xlsx"])
        .assert()
        .success();
    assert!(tmp.path().join("cabos.xlsx").is_file());

    cadastro()
        .current_dir(tmp.path())
        .args(["import", "cabos", "cabos.xlsx", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported:       2"));
}

// ============================================================================
// Import Tests
// ============================================================================

#[test]
fn test_dry_run_writes_nothing() {
    let tmp = setup_piping_project();
    let file = write_csv(
        &tmp,
        "juntas.csv",
        "NUMERO_JUNTA,LINHA,DIAMETRO\nJ-001,L-1001,4\nJ-002,L-9999,4\n",
    );

    cadastro()
        .current_dir(tmp.path())
        .args(["import", "juntas", &file, "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run complete"))
        .stdout(predicate::str::contains("Linha não encontrado(a) em LINHA: 'L-9999'"));

    cadastro()
        .current_dir(tmp.path())
        .args(["list", "juntas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No records"));
}

#[test]
fn test_import_skips_error_rows_and_reports_duplicates() {
    let tmp = setup_piping_project();
    let file = write_csv(
        &tmp,
        "juntas.csv",
        "NUMERO_JUNTA,LINHA,DIAMETRO\nJ-001,L-1001,4\nJ-002,L-1002,abc\nJ-003,l-1002,6\n",
    );

    cadastro()
        .current_dir(tmp.path())
        .args(["import", "juntas", &file, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported:       2"));

    cadastro()
        .current_dir(tmp.path())
        .args(["list", "juntas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("J-001"))
        .stdout(predicate::str::contains("J-003"))
        .stdout(predicate::str::contains("J-002").not());

    // Second run: J-001 is now a persisted duplicate
    let again = write_csv(&tmp, "again.csv", "NUMERO_JUNTA,LINHA\nJ-001,L-1001\n");
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "juntas", &again, "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Junta já existe no sistema"));
}

#[test]
fn test_error_row_does_not_block_later_row_with_same_key() {
    let tmp = setup_piping_project();
    let file = write_csv(
        &tmp,
        "juntas.csv",
        "NUMERO_JUNTA,LINHA\nJ-001,L-9999\nJ-001,L-1001\n",
    );

    cadastro()
        .current_dir(tmp.path())
        .args(["import", "juntas", &file, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported:       1"))
        .stdout(predicate::str::contains("Junta já existe no sistema").not());
}

#[test]
fn test_failed_out_writes_retry_headers() {
    let tmp = setup_piping_project();
    let file = write_csv(&tmp, "luminarias.csv", "TAG,POTÊNCIA\nLM-001,40\n");

    cadastro()
        .current_dir(tmp.path())
        .args(["import", "luminarias", &file, "--yes", "--fail-fast", "--failed-out", "retry.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 row(s) to retry"));

    let retry = fs::read_to_string(tmp.path().join("retry.csv")).unwrap();
    let header = retry.lines().next().unwrap();
    assert!(header.starts_with("TAG,"));
    assert!(header.ends_with(",MOTIVO_FALHA"));
    assert_eq!(retry.lines().count(), 1);
}

#[test]
fn test_no_warnings_excludes_soft_reference_rows() {
    let tmp = setup_piping_project();
    let file = write_csv(
        &tmp,
        "valvulas.csv",
        "TAG,LINHA,ÁREA\nXV-001,L-1001,Área 1\nXV-002,L-1001,Área 99\n",
    );

    cadastro()
        .current_dir(tmp.path())
        .args(["import", "valvulas", &file, "--yes", "--no-warnings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(excluded)"))
        .stdout(predicate::str::contains("Imported:       1"));

    // Default policy imports the warning row with an empty link
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "valvulas", &file, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported:       1"));

    cadastro()
        .current_dir(tmp.path())
        .args(["list", "valvulas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("XV-002"))
        .stdout(predicate::str::contains("2 record(s)"));
}

#[test]
fn test_cca_from_config_is_stamped() {
    let tmp = setup_piping_project();
    cadastro()
        .current_dir(tmp.path())
        .args(["config", "set", "cca", "OBRA-7"])
        .assert()
        .success();

    cadastro()
        .current_dir(tmp.path())
        .args(["config", "show", "cca"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OBRA-7"));

    let file = write_csv(&tmp, "luminarias.csv", "TAG,POTÊNCIA\nLM-001,40\n");
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "luminarias", &file, "--yes", "--chunk-size", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chunk 1/1"));
}

#[test]
fn test_import_without_terminal_requires_yes() {
    let tmp = setup_piping_project();
    let file = write_csv(&tmp, "cabos.csv", "TAG,DISCIPLINA\nCB-1,Elétrica\n");
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "cabos", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_nothing_importable_fails() {
    let tmp = setup_piping_project();
    let file = write_csv(&tmp, "cabos.csv", "TAG,DISCIPLINA\n,Elétrica\n");
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "cabos", &file, "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Campo obrigatório não preenchido: TAG"));
}

#[test]
fn test_desenhos_feed_juntas_reference() {
    let tmp = setup_piping_project();
    let desenhos = write_csv(
        &tmp,
        "desenhos.csv",
        "NUMERO,TITULO,DISCIPLINA\nDE-3010,Isométrico,Tubulação\n",
    );
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "desenhos", &desenhos, "--yes"])
        .assert()
        .success();

    let juntas = write_csv(
        &tmp,
        "juntas.csv",
        "NUMERO_JUNTA,LINHA,DESENHO\nJ-100,L-1001,de-3010\n",
    );
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "juntas", &juntas, "--yes"])
        .assert()
        .success();

    cadastro()
        .current_dir(tmp.path())
        .args(["list", "juntas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DE-3010"));
}

#[test]
fn test_unknown_columns_are_reported() {
    let tmp = setup_piping_project();
    let file = write_csv(&tmp, "cabos.csv", "TAG,DISCIPLINA,OBS\nCB-1,Elétrica,x\n");
    cadastro()
        .current_dir(tmp.path())
        .args(["import", "cabos", &file, "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ignored columns: OBS"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_rejects_unknown_key_and_bad_values() {
    let tmp = setup_test_project();
    cadastro()
        .current_dir(tmp.path())
        .args(["config", "set", "author", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown configuration key"));

    cadastro()
        .current_dir(tmp.path())
        .args(["config", "set", "chunk_size", "zero"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("positive integer"));
}

#[test]
fn test_config_set_unset_round() {
    let tmp = setup_test_project();
    cadastro()
        .current_dir(tmp.path())
        .args(["config", "set", "allow_warnings", "false"])
        .assert()
        .success();

    let content = fs::read_to_string(tmp.path().join(".cadastro/config.yaml")).unwrap();
    assert!(content.contains("allow_warnings: false"));

    cadastro()
        .current_dir(tmp.path())
        .args(["config", "unset", "allow_warnings"])
        .assert()
        .success();

    cadastro()
        .current_dir(tmp.path())
        .args(["config", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chunk_size"));
}

#[test]
fn test_completions_generate() {
    cadastro()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cadastro"));
}
