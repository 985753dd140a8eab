use invest_optimizer::dataset::{Dataset, DatasetError, ProfitFormat};
use pretty_assertions::assert_eq;
use std::io::Write;

fn write_csv(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_semicolon_file_with_decimal_commas() {
    let file = write_csv("\u{feff}name;price;profit\nShare-1;20,50;5,5\nShare-2;31,20;12\n");
    let dataset = Dataset::load(file.path()).unwrap();

    assert_eq!(dataset.delimiter, ';');
    assert_eq!(dataset.profit_format, ProfitFormat::Percent);
    assert_eq!(dataset.actions.len(), 2);
    assert_eq!(dataset.actions[0].name, "Share-1");
    assert_eq!(dataset.actions[0].cost, 20.5);
    assert!((dataset.actions[0].rate - 0.055).abs() < 1e-12);
}

#[test]
fn test_comma_file_with_ratios_and_bad_rows() {
    let file = write_csv(
        "name,price,profit\nShare-1,12.5,0.2\nShare-2,0.0,0.3\nShare-3,-4,0.1\nShare-4,8,0.15\nShare-5,9,abc\n",
    );
    let dataset = Dataset::load(file.path()).unwrap();

    assert_eq!(dataset.delimiter, ',');
    assert_eq!(dataset.profit_format, ProfitFormat::Decimal);
    assert_eq!(dataset.rows_read, 5);
    assert_eq!(dataset.rows_rejected, 3);
    let names: Vec<&str> = dataset.actions.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Share-1", "Share-4"]);
}

#[test]
fn test_tab_separated_file() {
    let file = write_csv("name\tprice\tprofit\nShare-1\t10\t25\n");
    let dataset = Dataset::load(file.path()).unwrap();
    assert_eq!(dataset.delimiter, '\t');
    assert!((dataset.actions[0].rate - 0.25).abs() < 1e-12);
}

#[test]
fn test_missing_and_empty_files() {
    let missing = Dataset::load("/nonexistent/dir/actions.csv");
    assert!(matches!(missing, Err(DatasetError::Io(_))));

    let empty = write_csv("");
    assert!(matches!(Dataset::load(empty.path()), Err(DatasetError::Empty)));
}

#[test]
fn test_invalid_utf8_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"name;price;profit\nShare-\xe9;10;5\n").unwrap();
    assert!(matches!(Dataset::load(file.path()), Err(DatasetError::Encoding(_))));
}

#[test]
fn test_header_only_file_has_no_actions() {
    let file = write_csv("name;price;profit\n");
    let dataset = Dataset::load(file.path()).unwrap();
    assert!(dataset.actions.is_empty());
    assert_eq!(dataset.rows_read, 0);
}
