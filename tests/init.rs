use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_cochange"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "cochange init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".cochange.toml");
    assert!(config_path.exists(), ".cochange.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[mining]"));
    assert!(content.contains("[bands]"));

    // Commented keys leave every default in place
    let config: cochange_core::CochangeConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.mining.min_support, 0.005);
    assert_eq!(config.bands.low_threshold, 14);
    assert_eq!(config.bands.high_threshold, 35);
    config.validate().unwrap();
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".cochange.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_cochange"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".cochange.toml")).unwrap();
    assert_eq!(content, "# existing");
}
