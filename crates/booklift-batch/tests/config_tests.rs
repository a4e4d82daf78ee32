//! Settings files and command-line parsing

use std::io::Write;
use std::path::PathBuf;

use booklift_batch::{Cli, Commands, Settings};
use clap::Parser;

#[test]
fn test_settings_file_overrides_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[batch]
chunk_size = 50

[file]
input_path = "in/books.tsv"
output_path = "out/books.tsv"
delimiter = "\t"
append_output = true

[relational]
url = "sqlite::memory:"

[document]
collection = "library"
sort_field = "shelf"
"#
    )
    .unwrap();

    let settings = Settings::from_file(file.path()).unwrap();

    assert_eq!(settings.batch.chunk_size, 50);
    assert_eq!(settings.file.input_path, PathBuf::from("in/books.tsv"));
    assert_eq!(settings.delimiter_byte(), b'\t');
    assert!(settings.file.append_output);
    assert_eq!(settings.relational.url, "sqlite::memory:");
    assert_eq!(settings.relational.max_connections, 1);
    assert_eq!(settings.document.collection, "library");
    assert_eq!(settings.document.sort_field, "shelf");
    assert!(settings.validate().is_ok());
}

#[test]
fn test_unreadable_settings_file_names_the_path() {
    let err = Settings::from_file(std::path::Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.toml"));
}

#[test]
fn test_settings_file_with_bad_types_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[batch]\nchunk_size = \"lots\"").unwrap();

    assert!(Settings::from_file(file.path()).is_err());
}

#[test]
fn test_cli_run_overrides() {
    let cli = Cli::try_parse_from([
        "booklift",
        "-v",
        "--config",
        "booklift.toml",
        "run",
        "--chunk-size",
        "10",
        "--input",
        "a.csv",
        "--output",
        "b.csv",
    ])
    .unwrap();

    assert!(cli.verbose);
    assert_eq!(cli.config, Some(PathBuf::from("booklift.toml")));
    match cli.command {
        Commands::Run {
            chunk_size,
            input,
            output,
        } => {
            assert_eq!(chunk_size, Some(10));
            assert_eq!(input, Some(PathBuf::from("a.csv")));
            assert_eq!(output, Some(PathBuf::from("b.csv")));
        },
        other => panic!("expected run, got {:?}", other),
    }
}

#[test]
fn test_cli_check_and_missing_subcommand() {
    let cli = Cli::try_parse_from(["booklift", "check"]).unwrap();
    assert!(matches!(cli.command, Commands::Check));

    assert!(Cli::try_parse_from(["booklift"]).is_err());
}

#[test]
fn test_cli_output_fixes_settings_file_clash() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[file]\ninput_path = \"same.csv\"\noutput_path = \"same.csv\""
    )
    .unwrap();

    let err = Settings::load(Some(file.path())).unwrap_err();
    assert!(format!("{:#}", err).contains("different files"));

    let cli = Cli::try_parse_from(["booklift", "run", "--output", "other.csv"]).unwrap();
    let Commands::Run {
        chunk_size,
        input,
        output,
    } = cli.command
    else {
        panic!("expected run");
    };
    let settings = Settings::resolve(Some(file.path()))
        .unwrap()
        .with_overrides(chunk_size, input, output);

    assert!(settings.validate().is_ok());
    assert_eq!(settings.file.input_path, PathBuf::from("same.csv"));
    assert_eq!(settings.file.output_path, PathBuf::from("other.csv"));
}
