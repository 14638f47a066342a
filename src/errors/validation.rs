use thiserror::Error;

/// Structural validation failures for submitted molecule documents.
/// Every variant maps to an InvalidArgument response; the variants exist
/// so callers and tests can tell the failure classes apart.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("molecule_xml must be a non-empty string")]
    Empty,

    #[error("molecule_xml too large (>{limit} chars)")]
    TooLarge { limit: usize },

    #[error("XML parse error: {0}")]
    Malformed(String),

    #[error("Missing root tag: PC-Compounds")]
    MissingRoot,

    #[error("Missing tag: {0}")]
    MissingTag(&'static str),

    #[error("Tag {parent} has 0 children <{child}>")]
    EmptyTag {
        parent: &'static str,
        child: &'static str,
    },

    #[error("Mismatched child counts: {}", format_counts(.0))]
    CountMismatch(Vec<(&'static str, usize)>),
}

fn format_counts(counts: &[(&'static str, usize)]) -> String {
    counts
        .iter()
        .map(|(tag, n)| format!("{}={}", tag, n))
        .collect::<Vec<_>>()
        .join(", ")
}
