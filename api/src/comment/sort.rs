use super::CommentThread;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Newest,
    Oldest,
    #[default]
    Popular,
}

impl<'de> serde::Deserialize<'de> for SortOrder {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match String::deserialize(deserializer)?.as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "popular" => Ok(SortOrder::Popular),
            _ => Err(serde::de::Error::custom("invalid sort type")),
        }
    }
}

/// Orders root comments only. Replies keep their creation order under their
/// parent whatever the sort.
pub fn sort_roots(roots: &mut [CommentThread], order: SortOrder) {
    match order {
        SortOrder::Newest => roots.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => roots.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::Popular => roots.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.created_at.cmp(&a.created_at))
        }),
    }
}
