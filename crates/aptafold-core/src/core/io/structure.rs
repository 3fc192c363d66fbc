use std::fs;
use std::io;
use std::path::Path;

/// Records stripped from each input before two structures are concatenated.
const DROPPED_RECORDS: [&str; 3] = ["CRYST1", "TITLE", "END"];

/// Repairs atom names written by the folding engine, which marks sugar atoms with `*`
/// instead of a prime. Applying the repair twice is harmless.
pub fn correct_engine_atom_names(path: &Path) -> io::Result<bool> {
    let text = fs::read_to_string(path)?;
    if !text.contains('*') {
        return Ok(false);
    }
    fs::write(path, text.replace('*', "'"))?;
    Ok(true)
}

/// Concatenates two structure files into a single complex.
///
/// Unit-cell, title and end records are dropped from both inputs and a `TER` record separates
/// the first molecule from the second. A single `END` closes the combined file.
pub fn combine_structures(first: &Path, second: &Path, output: &Path) -> io::Result<()> {
    let mut combined = String::new();

    let first_text = fs::read_to_string(first)?;
    let head = strip_records(&first_text);
    for line in &head {
        combined.push_str(line);
        combined.push('\n');
    }
    if head.last().is_none_or(|line| !is_record(line, "TER")) {
        combined.push_str("TER\n");
    }

    let second_text = fs::read_to_string(second)?;
    for line in strip_records(&second_text) {
        combined.push_str(line);
        combined.push('\n');
    }
    combined.push_str("END\n");

    fs::write(output, combined)
}

fn strip_records(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !DROPPED_RECORDS.iter().any(|record| is_record(line, record)))
        .collect()
}

/// Compares the record keyword exactly, so `END` does not match `ENDMDL`.
fn is_record(line: &str, record: &str) -> bool {
    line.split_whitespace().next() == Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const APTAMER: &str = "\
TITLE     folded aptamer
CRYST1   40.000   40.000   40.000  90.00  90.00  90.00 P 1           1
ATOM      1  C1* DA  A   1      11.104  13.207   2.100  1.00  0.00           C
ATOM      2  O4* DA  A   1      12.560  13.207   2.100  1.00  0.00           O
END
";

    const PEPTIDE: &str = "\
ATOM      1  N   TYR B   1       0.000   0.000   0.000  1.00  0.00           N
ATOM      2  CA  TYR B   1       1.458   0.000   0.000  1.00  0.00           C
TER
END
";

    #[test]
    fn atom_name_correction_replaces_stars_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sequence.pdb");
        fs::write(&path, APTAMER).unwrap();

        assert!(correct_engine_atom_names(&path).unwrap());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("C1'"));
        assert!(!text.contains('*'));

        assert!(!correct_engine_atom_names(&path).unwrap());
    }

    #[test]
    fn combine_drops_headers_and_separates_chains() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("rep.pdb");
        let second = dir.path().join("peptide.pdb");
        let out = dir.path().join("combined.pdb");
        fs::write(&first, APTAMER).unwrap();
        fs::write(&second, PEPTIDE).unwrap();

        combine_structures(&first, &second, &out).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert!(!text.contains("CRYST1"));
        assert!(!text.contains("TITLE"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("ATOM")).count(), 4);
        assert_eq!(lines[2], "TER");
        assert_eq!(lines.iter().filter(|l| **l == "TER").count(), 2);
        assert_eq!(lines.last(), Some(&"END"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("END")).count(), 1);
    }

    #[test]
    fn record_keywords_match_exactly() {
        assert!(is_record("END", "END"));
        assert!(is_record("  TER      3      TYR B   1", "TER"));
        assert!(!is_record("ENDMDL", "END"));
        assert!(!is_record("TERM", "TER"));
        assert!(!is_record("TITLE2 continued", "TITLE"));
    }

    #[test]
    fn combine_keeps_model_boundaries() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("rep.pdb");
        let second = dir.path().join("peptide.pdb");
        let out = dir.path().join("combined.pdb");
        fs::write(&first, format!("MODEL        1\n{APTAMER}ENDMDL\n")).unwrap();
        fs::write(&second, PEPTIDE).unwrap();

        combine_structures(&first, &second, &out).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.iter().filter(|l| **l == "ENDMDL").count(), 1);
        assert_eq!(lines.iter().filter(|l| **l == "END").count(), 1);
        assert_eq!(lines.last(), Some(&"END"));
    }

    #[test]
    fn combine_reports_missing_input() {
        let dir = tempdir().unwrap();
        let result = combine_structures(
            &dir.path().join("missing.pdb"),
            &dir.path().join("also-missing.pdb"),
            &dir.path().join("out.pdb"),
        );
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
