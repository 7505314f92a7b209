use crate::config::DiversityConfig;
use crate::models::ScoredPost;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Diversity Layer
///
/// Single greedy pass over a score-sorted candidate list enforcing hard
/// per-author and per-topic caps. Never grows the pool, never reorders
/// survivors, never retries a rejected candidate.
pub struct DiversityLayer {
    max_per_author: usize,
    max_per_topic: usize,
}

impl Default for DiversityLayer {
    fn default() -> Self {
        let config = DiversityConfig::default();
        Self::new(config.max_per_author, config.max_per_topic)
    }
}

impl DiversityLayer {
    pub fn new(max_per_author: usize, max_per_topic: usize) -> Self {
        Self {
            max_per_author,
            max_per_topic,
        }
    }

    pub fn from_config(config: &DiversityConfig) -> Self {
        Self::new(config.max_per_author, config.max_per_topic)
    }

    /// Filter a list sorted by score descending. A candidate is admitted iff
    /// its author is under the author cap and none of its topics has reached
    /// the topic cap; counts advance only on admission. Posts with no topics
    /// bypass the topic constraint but stay subject to the author cap.
    pub fn filter(&self, scored: Vec<ScoredPost>) -> Vec<ScoredPost> {
        let input_count = scored.len();
        let mut author_count: HashMap<Uuid, usize> = HashMap::new();
        let mut topic_count: HashMap<&str, usize> = HashMap::new();
        let mut admitted = Vec::with_capacity(scored.len());

        for item in &scored {
            if author_count.get(&item.post.author_id).copied().unwrap_or(0) >= self.max_per_author {
                continue;
            }

            let topic_saturated = item
                .post
                .topics
                .iter()
                .any(|topic| topic_count.get(topic.as_str()).copied().unwrap_or(0) >= self.max_per_topic);
            if topic_saturated {
                continue;
            }

            *author_count.entry(item.post.author_id).or_insert(0) += 1;
            for topic in &item.post.topics {
                *topic_count.entry(topic.as_str()).or_insert(0) += 1;
            }
            admitted.push(item.clone());
        }

        debug!(
            input_count,
            admitted_count = admitted.len(),
            "Diversity filtering complete"
        );

        admitted
    }
}
