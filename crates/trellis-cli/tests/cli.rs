/// Config loading and the demo -> dump -> inspect path, on real files
use std::fs;
use std::io::Write;
use trellis_batch::{AckMode, Encoding, UiTree};
use trellis_cli::config::{Config, OutputFormat};
use trellis_cli::demo::{DEFAULT_CLICKS, DemoOptions, run_demo};
use trellis_cli::inspect::{decode_file, render_listing};
use trellis_core::ComponentId;

#[test]
fn test_config_file_overrides_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "log_level": "debug", "ack_mode": "deferred", "output": "json" }}"#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.ack_mode, AckMode::Deferred);
    assert_eq!(config.output, OutputFormat::Json);
    assert_eq!(config.encoding, Encoding::Linear);
}

#[test]
fn test_bad_config_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(format!("{err:#}").contains("Invalid config"));

    let missing = file.path().with_extension("missing");
    assert!(Config::load(Some(&missing)).is_err());
}

#[test]
fn test_dumped_batches_replay_to_demo_html() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_demo(&DemoOptions {
        encoding: Encoding::Linear,
        ack_mode: AckMode::Immediate,
        clicks: DEFAULT_CLICKS.iter().map(|c| c.to_string()).collect(),
        dump: Some(dir.path().to_path_buf()),
    })
    .unwrap();

    let mut tree = UiTree::new();
    for stats in &report.batches {
        let path = dir.path().join(format!("batch-{}.bin", stats.batch_id));
        let snapshot = decode_file(&path).unwrap();
        assert_eq!(snapshot.edit_count(), stats.edits);
        tree.apply(&snapshot).unwrap();
    }
    assert_eq!(tree.to_html(ComponentId(0)).unwrap(), report.html);

    let first = decode_file(&dir.path().join("batch-1.bin")).unwrap();
    let listing = render_listing(&first);
    assert!(listing.starts_with("updated components: 3\n"));
    assert!(listing.contains("Element <button> subtree=3"));
    assert!(listing.contains("Attribute onclick handler=1"));
}

#[test]
fn test_inspect_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.bin");
    fs::write(&path, [1u8, 2, 3]).unwrap();
    let err = decode_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("Not a linear batch"));
}
