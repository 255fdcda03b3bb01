use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::RwLock;

type AttachMap = HashMap<String, HashSet<String>>;

/// Which container ids currently use which volume.
///
/// Purely plugin-side bookkeeping: the filesystem mount is only torn down
/// once the last attachment for a volume is gone.
#[derive(Clone, Default)]
pub struct Attachments {
    inner: Arc<RwLock<AttachMap>>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` as a user of `name`; returns the attachment count.
    pub async fn attach(&self, name: &str, id: &str) -> usize {
        let mut map = self.inner.write().await;
        let ids = map.entry(name.to_string()).or_default();
        ids.insert(id.to_string());
        ids.len()
    }

    /// Drop `id` from `name`; returns how many attachments remain.
    pub async fn detach(&self, name: &str, id: &str) -> usize {
        let mut map = self.inner.write().await;
        let Some(ids) = map.get_mut(name) else {
            return 0;
        };

        ids.remove(id);
        let remaining = ids.len();
        if remaining == 0 {
            map.remove(name);
        }
        remaining
    }

    pub async fn active(&self, name: &str) -> usize {
        let map = self.inner.read().await;
        map.get(name).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn starts_empty() {
        let attachments = Attachments::new();
        assert_eq!(attachments.active("vol1").await, 0);
    }

    #[tokio::test]
    async fn attach_counts_distinct_ids() {
        let attachments = Attachments::new();

        assert_eq!(attachments.attach("vol1", "a").await, 1);
        assert_eq!(attachments.attach("vol1", "b").await, 2);
        assert_eq!(attachments.attach("vol1", "b").await, 2);
        assert_eq!(attachments.active("vol1").await, 2);
    }

    #[tokio::test]
    async fn volumes_are_tracked_independently() {
        let attachments = Attachments::new();

        attachments.attach("vol1", "a").await;
        attachments.attach("vol2", "a").await;

        assert_eq!(attachments.active("vol1").await, 1);
        assert_eq!(attachments.active("vol2").await, 1);
    }

    #[tokio::test]
    async fn detach_reports_remaining() {
        let attachments = Attachments::new();
        attachments.attach("vol1", "a").await;
        attachments.attach("vol1", "b").await;

        assert_eq!(attachments.detach("vol1", "a").await, 1);
        assert_eq!(attachments.detach("vol1", "b").await, 0);
        assert_eq!(attachments.active("vol1").await, 0);
    }

    #[tokio::test]
    async fn detach_of_unknown_volume_is_zero() {
        let attachments = Attachments::new();
        assert_eq!(attachments.detach("vol1", "a").await, 0);
    }

    #[tokio::test]
    async fn detach_of_unknown_id_keeps_the_rest() {
        let attachments = Attachments::new();
        attachments.attach("vol1", "a").await;

        assert_eq!(attachments.detach("vol1", "zz").await, 1);
        assert_eq!(attachments.active("vol1").await, 1);
    }
}
