// Document I/O - split markdown files into YAML front matter and body

use thiserror::Error;

const DELIMITER: &str = "---";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrontMatterError {
    #[error("file is not valid UTF-8")]
    InvalidUtf8,

    #[error("missing opening '---' front matter delimiter")]
    MissingOpeningDelimiter,

    #[error("missing closing '---' front matter delimiter")]
    UnterminatedHeader,
}

/// A file split at its first front matter block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub yaml: String,
    pub body: String,
}

/// Decode bytes as UTF-8 and split them into front matter and body.
pub fn parse_front_matter(bytes: &[u8]) -> Result<FrontMatter, FrontMatterError> {
    let text = std::str::from_utf8(bytes).map_err(|_| FrontMatterError::InvalidUtf8)?;
    split_front_matter(text)
}

/// Split already-decoded text into front matter and body.
///
/// The first non-empty line must be exactly `---`. The next line that trims
/// to `---` closes the header; any later delimiters belong to the body.
pub fn split_front_matter(text: &str) -> Result<FrontMatter, FrontMatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines().skip_while(|line| line.trim().is_empty());

    match lines.next() {
        Some(first) if first.strip_suffix('\r').unwrap_or(first) == DELIMITER => {}
        _ => return Err(FrontMatterError::MissingOpeningDelimiter),
    }

    let mut yaml_lines = Vec::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim() == DELIMITER {
            closed = true;
            break;
        }
        yaml_lines.push(line);
    }

    if !closed {
        return Err(FrontMatterError::UnterminatedHeader);
    }

    Ok(FrontMatter {
        yaml: yaml_lines.join("\n"),
        body: lines.collect::<Vec<_>>().join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_split() {
        let fm = parse_front_matter(b"---\nid: a\n---\n# Title\n\nBody").unwrap();
        assert_eq!(fm.yaml, "id: a");
        assert_eq!(fm.body, "# Title\n\nBody");
    }

    #[test]
    fn test_empty_header_is_legal() {
        let fm = parse_front_matter(b"---\n---").unwrap();
        assert_eq!(fm.yaml, "");
        assert_eq!(fm.body, "");
    }

    #[test]
    fn test_leading_blank_lines_are_skipped() {
        let fm = parse_front_matter(b"\n  \n---\nid: a\n---\nbody").unwrap();
        assert_eq!(fm.yaml, "id: a");
        assert_eq!(fm.body, "body");
    }

    #[test]
    fn test_later_delimiters_stay_in_body() {
        let fm = parse_front_matter(b"---\nid: a\n---\nintro\n---\nnot: yaml\n---\n").unwrap();
        assert_eq!(fm.yaml, "id: a");
        assert_eq!(fm.body, "intro\n---\nnot: yaml\n---");
    }

    #[test]
    fn test_crlf_lines() {
        let fm = parse_front_matter(b"---\r\nid: a\r\n---\r\nbody\r\n").unwrap();
        assert_eq!(fm.yaml, "id: a");
        assert_eq!(fm.body, "body");
    }

    #[test]
    fn test_missing_opening_delimiter() {
        let err = parse_front_matter(b"# Just markdown\n---\n").unwrap_err();
        assert_eq!(err, FrontMatterError::MissingOpeningDelimiter);

        let err = parse_front_matter(b"").unwrap_err();
        assert_eq!(err, FrontMatterError::MissingOpeningDelimiter);
    }

    #[test]
    fn test_opening_delimiter_must_be_exact() {
        for text in ["  ---  \nid: a\n---\n", "--- \nid: a\n---\n", " ---\nid: a\n---\n"] {
            let err = split_front_matter(text).unwrap_err();
            assert_eq!(err, FrontMatterError::MissingOpeningDelimiter, "{text:?}");
        }

        // the closer is still compared after trimming
        let fm = split_front_matter("---\r\nid: a\n  ---  \nbody").unwrap();
        assert_eq!(fm.yaml, "id: a");
        assert_eq!(fm.body, "body");
    }

    #[test]
    fn test_unterminated_header() {
        let err = parse_front_matter(b"---\nid: a\n").unwrap_err();
        assert_eq!(err, FrontMatterError::UnterminatedHeader);
    }

    #[test]
    fn test_invalid_utf8() {
        let err = parse_front_matter(&[b'-', b'-', b'-', b'\n', 0xff, 0xfe]).unwrap_err();
        assert_eq!(err, FrontMatterError::InvalidUtf8);
    }
}
