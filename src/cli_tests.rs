//! Tests for CLI parsing and configuration layering.

use super::*;
use rstest::rstest;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["vsix-fetch"]);
    assert!(cli.specs.is_empty());
    assert!(cli.manifest.is_none());
    assert!(cli.dest.is_none());
    assert!(!cli.no_repack);
    assert!(!cli.publish_unrepacked);
    assert!(!cli.json);
    assert!(!cli.quiet);
    assert!(!cli.no_sweep);
    assert_eq!(cli.fetch_config(None), FetchConfig::default());
}

#[test]
fn cli_parses_specs_in_order() {
    let cli = Cli::parse_from([
        "vsix-fetch",
        "ms-vscode.cpptools@1.30.0@linux-x64",
        "pub.ext@9.9.9",
    ]);
    let rendered: Vec<String> = cli.specs.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec!["ms-vscode.cpptools@1.30.0@linux-x64", "pub.ext@9.9.9"]
    );
}

#[rstest]
#[case::missing_version("pub.ext")]
#[case::no_separator("pubext@1.0.0")]
#[case::too_many_fields("pub.ext@1@linux-x64@extra")]
fn cli_rejects_invalid_specs(#[case] spec: &str) {
    assert!(Cli::try_parse_from(["vsix-fetch", spec]).is_err());
}

#[test]
fn cli_rejects_conflicting_repack_flags() {
    let result = Cli::try_parse_from(["vsix-fetch", "--no-repack", "--publish-unrepacked"]);
    assert!(result.is_err());
}

#[test]
fn flags_override_manifest_settings() {
    let manifest = BatchManifest::parse(concat!(
        "dest_dir = \"from-manifest\"\n",
        "repack = true\n",
        "jobs = 2\n",
    ))
    .expect("valid manifest");
    let cli = Cli::parse_from([
        "vsix-fetch",
        "--dest",
        "from-flag",
        "--no-repack",
        "--timeout",
        "5",
        "-q",
    ]);

    let config = cli.fetch_config(Some(&manifest));
    assert_eq!(config.dest_dir, Utf8PathBuf::from("from-flag"));
    assert!(!config.repack);
    assert_eq!(config.jobs.get(), 2);
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert!(config.quiet);
}

#[test]
fn publish_unrepacked_sets_policy() {
    let cli = Cli::parse_from(["vsix-fetch", "--publish-unrepacked"]);
    assert_eq!(
        cli.fetch_config(None).repack_failure,
        RepackFailurePolicy::PublishNormalised
    );
}

#[test]
fn manifest_specs_come_first() {
    let manifest = BatchManifest::parse("[[extension]]\nid = \"a.first\"\nversion = \"1\"\n")
        .expect("valid manifest");
    let cli = Cli::parse_from(["vsix-fetch", "b.second@2"]);

    let specs = cli.requested_specs(Some(&manifest)).expect("valid specs");
    let identifiers: Vec<&str> = specs.iter().map(PackageSpec::identifier).collect();
    assert_eq!(identifiers, vec!["a.first", "b.second"]);
}
