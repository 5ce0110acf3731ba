use std::path::Path;
use std::process::{Command, Output};

const STATS_HEADER: &str = "FileName,NumberOfLinesAdded,NumberOLinesDeleted,NumberOfLinesChangedTotal,\
NumberOfAuthors,NumberOfCommits,NumberOfCommitsOnlyForBugFix,\
AvgLinesAddedPerCommit,AvgLinesDeletedPerCommit,AvgLinesChangedPerCommit";

fn cochange(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cochange"))
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

fn write_inputs(dir: &Path) {
    std::fs::write(
        dir.join("commit-transactions.txt"),
        "a.rs b.rs\na.rs b.rs c.rs\na.rs b.rs\nc.rs d.rs\na.rs\n\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("file-stats.csv"),
        format!(
            "{STATS_HEADER}\n\
             a.rs,10,4,14,2,2,1,5,2,7\n\
             b.rs,20,0,20,1,2,0,10,0,10\n\
             c.rs,3,3,6,1,3,0,1,1,2\n"
        ),
    )
    .unwrap();
}

#[test]
fn mine_writes_band_tables_and_size_files() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    // 6 transactions at 0.3 support: min count 2
    let output = cochange(
        dir.path(),
        &[
            "mine",
            "--min-support",
            "0.3",
            "--low-threshold",
            "2",
            "--high-threshold",
            "3",
            "--out-dir",
            "out",
        ],
    );
    assert!(output.status.success(), "mine failed: {}", String::from_utf8_lossy(&output.stderr));

    let out = dir.path().join("out");
    let size2 = std::fs::read_to_string(out.join("sup0.3-set-2.txt")).unwrap();
    assert_eq!(size2, "a.rs b.rs\n");
    assert!(!out.join("sup0.3-set-3.txt").exists());

    // {a, b} occurs 3 times: very frequent
    let very = std::fs::read_to_string(out.join("file-stats-very-frequent.csv")).unwrap();
    let lines: Vec<&str> = very.lines().collect();
    assert_eq!(lines[0], "NumberOfLinesAdded,NumberOLinesDeleted,NumberOfLinesChangedTotal,NumberOfAuthors,NumberOfCommits,NumberOfCommitsOnlyForBugFix");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("7.5,1,8.5,1.5,2,0.5"), "row was {}", lines[1]);

    for band in ["infrequent", "frequent"] {
        let content = std::fs::read_to_string(out.join(format!("file-stats-{band}.csv"))).unwrap();
        assert_eq!(content.lines().count(), 1, "{band} should only have a header");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Very frequent changing pattern statistics"));
    assert!(stdout.contains("AvgLinesAdded 7.50"));
}

#[test]
fn mine_json_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let output = cochange(dir.path(), &["--format", "json", "mine", "--min-support", "0.3"]);
    assert!(output.status.success(), "mine failed: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["transactions"], 6);
    assert_eq!(json["minCount"], 2);
    // {a}, {b}, {c}, {a, b}
    assert_eq!(json["itemsets"], 4);
    assert_eq!(json["skippedSingletons"], 3);
    assert_eq!(json["bands"].as_array().unwrap().len(), 3);
    assert_eq!(json["sizeGroups"][0]["size"], 2);
}

#[test]
fn mine_fails_on_missing_input_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("commit-transactions.txt"), "a b\n").unwrap();

    let output = cochange(dir.path(), &["mine", "--out-dir", "out"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("file-stats.csv"), "stderr: {stderr}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn mine_rejects_inverted_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let output = cochange(
        dir.path(),
        &["mine", "--low-threshold", "40", "--high-threshold", "10"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("low_threshold"));
}

#[test]
fn evaluate_scores_rules_and_writes_curve() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.txt"), "A x y z\nB p q\nC m\n").unwrap();
    std::fs::write(dir.path().join("ground-truth.txt"), "A x y\nB p r s\n").unwrap();

    let output = cochange(dir.path(), &["evaluate", "--rules", "rules.txt", "--curve", "pr.csv"]);
    assert!(output.status.success(), "evaluate failed: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Scored 2 of 3 rules"), "stdout: {stdout}");
    assert!(stdout.contains("no ground truth for antecedent C"));

    let curve = std::fs::read_to_string(dir.path().join("pr.csv")).unwrap();
    let lines: Vec<&str> = curve.lines().collect();
    assert_eq!(lines, vec!["Recall,Precision", "0.3333333333333333,1", "1,1"]);
}

#[test]
fn evaluate_strict_fails_on_unscored_rules() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.txt"), "A x\nC m\n").unwrap();
    std::fs::write(dir.path().join("ground-truth.txt"), "A x\n").unwrap();

    let output = cochange(
        dir.path(),
        &["evaluate", "--rules", "rules.txt", "--curve", "pr.csv", "--strict"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no score: C"), "stderr: {stderr}");
    assert!(stderr.contains("run without --strict"), "stderr: {stderr}");
    assert!(!dir.path().join("pr.csv").exists());
}

#[test]
fn evaluate_names_missing_ground_truth() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.txt"), "A x\n").unwrap();

    let output = cochange(
        dir.path(),
        &["evaluate", "--rules", "rules.txt", "--ground-truth", "gt-missing.txt"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("gt-missing.txt"));
    assert!(!dir.path().join("precision-recall.csv").exists());
}

fn commit(repo: &git2::Repository, files: &[(&str, &str)], message: &str) {
    let workdir = repo.workdir().unwrap();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        std::fs::write(workdir.join(path), content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = git2::Signature::now("alice", "alice@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

#[test]
fn extract_builds_log_and_stats_from_git() {
    let dir = tempfile::tempdir().unwrap();
    let repo_dir = dir.path().join("repo");
    std::fs::create_dir(&repo_dir).unwrap();
    let repo = git2::Repository::init(&repo_dir).unwrap();
    commit(&repo, &[("a.rs", "1\n"), ("b.rs", "1\n")], "initial import");
    commit(&repo, &[("a.rs", "1\n2\n")], "Fix overflow in a");

    let output = cochange(
        dir.path(),
        &["extract", "--repo", "repo", "--transactions", "tx.txt", "--stats", "stats.csv"],
    );
    assert!(output.status.success(), "extract failed: {}", String::from_utf8_lossy(&output.stderr));

    let log = std::fs::read_to_string(dir.path().join("tx.txt")).unwrap();
    assert_eq!(log, "a.rs b.rs\na.rs\n");

    let stats = std::fs::read_to_string(dir.path().join("stats.csv")).unwrap();
    let lines: Vec<&str> = stats.lines().collect();
    assert_eq!(lines[0], STATS_HEADER);
    assert!(lines[1].starts_with("a.rs,2,0,2,1,2,1,"), "row was {}", lines[1]);
    assert!(lines[2].starts_with("b.rs,1,0,1,1,1,0,"), "row was {}", lines[2]);
}
