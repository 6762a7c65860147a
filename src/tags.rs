//! Tag resolution: turning the tag text typed on a note screen into a tag
//! reference, and back.

use crate::error::StoreResult;
use crate::models::TagId;
use crate::repository::Repository;

/// Resolves a tag name to the id of the tag with that exact title,
/// creating the tag on first use.
///
/// The name is trimmed before both the lookup and the insert, so `" work"`
/// matches the stored tag `work`; the comparison itself is exact and
/// case-sensitive. A blank name means "no tag" and returns `None` without
/// touching storage. Storage failures propagate unchanged.
///
/// Lookup and insert happen atomically in
/// [`Repository::get_or_create_tag`], so two saves racing on the same new
/// name end up referencing one tag row.
pub async fn resolve_tag_id(repo: &dyn Repository, name: &str) -> StoreResult<Option<TagId>> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }

    repo.get_or_create_tag(name).await.map(Some)
}

/// Resolves a note's tag reference to the text shown on screen.
///
/// No tag, or a tag that no longer exists, yields an empty string.
pub async fn resolve_tag_title(repo: &dyn Repository, tag_id: Option<TagId>) -> StoreResult<String> {
    let Some(tag_id) = tag_id else {
        return Ok(String::new());
    };

    Ok(repo
        .fetch_tag(tag_id)
        .await?
        .map(|tag| tag.title().to_string())
        .unwrap_or_default())
}
