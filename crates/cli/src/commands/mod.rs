pub(crate) mod inspect;
pub(crate) mod migrate;

/// Revision id for display, `base` when nothing is applied.
pub(crate) fn label(revision: Option<&str>) -> &str {
    revision.unwrap_or("base")
}
