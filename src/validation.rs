use roxmltree::{Document, Node};

use crate::errors::ValidationError;

/// Logical root record of the document family.
pub const ROOT_TAG: &str = "PC-Compounds";

/// Required (parent, child) tag pairs: atom elements plus one conformer
/// coordinate list per spatial axis. Their child counts must agree.
pub const REQUIRED_TAGS: [(&str, &str); 4] = [
    ("PC-Atoms_element", "PC-Element"),
    ("PC-Conformer_x", "PC-Conformer_x_E"),
    ("PC-Conformer_y", "PC-Conformer_y_E"),
    ("PC-Conformer_z", "PC-Conformer_z_E"),
];

/// Strips any namespace qualifier before comparison, so the same logical
/// tag matches however a producer prefixed it. Handles both the
/// `{uri}Name` and `prefix:Name` spellings.
fn local_name(tag: &str) -> &str {
    let tag = tag.rsplit(':').next().unwrap_or(tag);
    match tag.split_once('}') {
        Some((_, name)) => name,
        None => tag,
    }
}

fn matches_local(node: Node, name: &str) -> bool {
    node.is_element() && local_name(node.tag_name().name()) == name
}

/// First element with the given local name, depth-first, self included.
/// Assumes each required parent tag occurs at most once at the relevant
/// nesting level; first match wins.
fn find_first_by_local<'a, 'input>(
    scope: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    scope.descendants().find(|n| matches_local(*n, name))
}

/// Direct element children only; grandchildren never count.
fn count_children_by_local(parent: Node, name: &str) -> usize {
    parent.children().filter(|n| matches_local(*n, name)).count()
}

/// Validates a molecule document and returns the atom count.
///
/// The document must be well-formed markup containing a `PC-Compounds`
/// record (as the root or anywhere below it) whose atom-element list and
/// three conformer coordinate lists all have the same number of entries.
pub fn validate_molecule_xml(molecule_xml: &str, max_chars: usize) -> Result<usize, ValidationError> {
    if molecule_xml.is_empty() {
        return Err(ValidationError::Empty);
    }
    if molecule_xml.chars().count() > max_chars {
        return Err(ValidationError::TooLarge { limit: max_chars });
    }

    let doc = Document::parse(molecule_xml)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;

    // Allow either a PC-Compounds root or a wrapper that contains it.
    let root = doc.root_element();
    let record = if matches_local(root, ROOT_TAG) {
        root
    } else {
        find_first_by_local(root, ROOT_TAG).ok_or(ValidationError::MissingRoot)?
    };

    let mut counts = Vec::with_capacity(REQUIRED_TAGS.len());
    for (parent_tag, child_tag) in REQUIRED_TAGS {
        let parent = find_first_by_local(record, parent_tag)
            .ok_or(ValidationError::MissingTag(parent_tag))?;

        let count = count_children_by_local(parent, child_tag);
        if count == 0 {
            return Err(ValidationError::EmptyTag {
                parent: parent_tag,
                child: child_tag,
            });
        }
        counts.push((parent_tag, count));
    }

    let (_, n_atoms) = counts[0];
    if counts.iter().any(|&(_, c)| c != n_atoms) {
        return Err(ValidationError::CountMismatch(counts));
    }

    Ok(n_atoms)
}
