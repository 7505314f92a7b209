use chrono::{Duration, Utc};
use feed_ranking::{
    CandidateFilter, Config, EngagementGraph, EngagementKind, ExplorationStrategy, Post,
    PreferenceWeights, RankingEngine, SelectionKind, Viewer,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Arc, Once};
use uuid::Uuid;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn viewer() -> Viewer {
    Viewer {
        user_id: Uuid::new_v4(),
        username: "alice".to_string(),
        interests: vec!["AI".to_string(), "Startups".to_string()],
        expertise_areas: vec!["AI".to_string()],
        preference_weights: PreferenceWeights::default(),
    }
}

fn post(author_id: Uuid, topic: &str, quality: f32, age_hours: i64, likes: u32) -> Post {
    Post {
        post_id: Uuid::new_v4(),
        author_id,
        created_at: Utc::now() - Duration::hours(age_hours),
        likes,
        reposts: likes / 5,
        replies: likes / 20,
        bookmarks: likes / 10,
        quality_score: quality,
        topics: vec![topic.to_string()],
        in_reply_to_user_id: None,
        mentions: vec![],
    }
}

/// Distinct authors and topics, so diversity caps never trim the pool.
fn wide_candidate_pool(n: usize) -> Vec<Post> {
    (0..n)
        .map(|i| {
            post(
                Uuid::new_v4(),
                &format!("topic-{}", i),
                0.5 + (i % 5) as f32 * 0.1,
                (i % 48) as i64,
                (i as u32) * 40,
            )
        })
        .collect()
}

#[test]
fn full_pipeline_returns_requested_size_with_decisions() {
    init_tracing();
    let viewer = viewer();
    let graph = EngagementGraph::new(viewer.user_id);
    let engine = RankingEngine::new(viewer, Config::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let feed = engine.rank_posts(wide_candidate_pool(30), &graph, None, 10, &mut rng);

    assert_eq!(feed.items.len(), 10);
    let decisions = feed.decisions.expect("exploration enabled by default");
    assert_eq!(decisions.len(), 10);

    // One decision per item, paired in order
    for (item, decision) in feed.items.iter().zip(&decisions) {
        assert_eq!(item.post.post_id, decision.post_id);
    }

    // No duplicates
    let unique: HashSet<Uuid> = feed.items.iter().map(|r| r.post.post_id).collect();
    assert_eq!(unique.len(), 10);

    // Every explanation clamped
    for item in &feed.items {
        assert!((0.0..=1.0).contains(&item.explanation.total_score));
    }
}

#[test]
fn twenty_candidates_ten_slots_yields_one_exploration_slot() {
    let viewer = viewer();
    let graph = EngagementGraph::new(viewer.user_id);
    let engine = RankingEngine::new(viewer, Config::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(12);

    let feed = engine.rank_posts(wide_candidate_pool(20), &graph, None, 10, &mut rng);

    assert_eq!(feed.items.len(), 10);
    let decisions = feed.decisions.unwrap();
    let exploration = decisions
        .iter()
        .filter(|d| d.selected_for == SelectionKind::Exploration)
        .count();
    assert_eq!(exploration, 1);
    assert_eq!(decisions.len() - exploration, 9);
}

#[test]
fn small_pool_returns_short_unpadded_feed() {
    let viewer = viewer();
    let graph = EngagementGraph::new(viewer.user_id);
    let engine = RankingEngine::new(viewer, Config::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(13);

    let feed = engine.rank_posts(wide_candidate_pool(4), &graph, None, 10, &mut rng);

    assert_eq!(feed.items.len(), 4);
    // Pass-through case emits no decisions
    assert_eq!(feed.decisions.unwrap().len(), 0);
}

#[test]
fn diversity_caps_hold_through_the_pipeline() {
    let viewer = viewer();
    let graph = EngagementGraph::new(viewer.user_id);
    let engine = RankingEngine::new(viewer, Config::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(14);

    // One prolific author, one hot topic
    let prolific = Uuid::new_v4();
    let mut candidates: Vec<Post> = (0..10)
        .map(|i| post(prolific, "AI", 0.9, i as i64, 2_000))
        .collect();
    candidates.extend((0..10).map(|i| post(Uuid::new_v4(), "AI", 0.7, i as i64, 500)));
    candidates.extend(wide_candidate_pool(10));

    let feed = engine.rank_posts(candidates, &graph, None, 30, &mut rng);

    let from_prolific = feed
        .items
        .iter()
        .filter(|r| r.post.author_id == prolific)
        .count();
    assert!(from_prolific <= 3);

    let on_ai = feed
        .items
        .iter()
        .filter(|r| r.post.topics.iter().any(|t| t == "AI"))
        .count();
    assert!(on_ai <= 5);
}

#[test]
fn candidate_filter_applies_before_scoring() {
    let viewer = viewer();
    let graph = EngagementGraph::new(viewer.user_id);
    let engine = RankingEngine::new(viewer, Config::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(15);

    let filter = CandidateFilter {
        min_quality: Some(0.6),
        exclude_topics: vec!["topic-2".to_string()],
        ..Default::default()
    };

    let feed = engine.rank_posts(wide_candidate_pool(20), &graph, Some(&filter), 20, &mut rng);

    for item in &feed.items {
        assert!(item.post.quality_score >= 0.6);
        assert!(!item.post.topics.iter().any(|t| t == "topic-2"));
    }
}

#[test]
fn disabled_exploration_returns_score_order_without_decisions() {
    let mut config = Config::default();
    config.exploration.enabled = false;

    let viewer = viewer();
    let graph = EngagementGraph::new(viewer.user_id);
    let engine = RankingEngine::new(viewer, config).unwrap();
    let mut rng = StdRng::seed_from_u64(16);

    let feed = engine.rank_posts(wide_candidate_pool(20), &graph, None, 10, &mut rng);

    assert_eq!(feed.items.len(), 10);
    assert!(feed.decisions.is_none());
    // Strict score order with ranks assigned 1..=n
    for (i, pair) in feed.items.windows(2).enumerate() {
        assert!(pair[0].explanation.total_score >= pair[1].explanation.total_score);
        assert_eq!(feed.items[i].rank, i + 1);
    }
}

#[test]
fn feedback_loop_shifts_ucb_exploration_toward_engaging_authors() {
    let mut config = Config::default();
    config.exploration.strategy = ExplorationStrategy::Ucb;
    config.exploration.exploration_rate = 0.2;

    let viewer = viewer();
    let graph = EngagementGraph::new(viewer.user_id);
    let engine = RankingEngine::new(viewer, config).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    let liked_author = Uuid::new_v4();
    let ignored_author = Uuid::new_v4();

    for _ in 0..20 {
        engine.record_engagement(Uuid::new_v4(), liked_author, EngagementKind::Like);
        engine.record_engagement(Uuid::new_v4(), ignored_author, EngagementKind::View);
    }

    // Head is filled by high scorers; both tracked authors sit in the
    // exploration pool with identical low scores.
    let mut candidates = wide_candidate_pool(20);
    candidates.push(post(liked_author, "liked", 0.1, 100, 0));
    candidates.push(post(ignored_author, "ignored", 0.1, 100, 0));

    let feed = engine.rank_posts(candidates, &graph, None, 10, &mut rng);
    let decisions = feed.decisions.unwrap();

    let explored_authors: Vec<Uuid> = feed
        .items
        .iter()
        .zip(&decisions)
        .filter(|(_, d)| d.selected_for == SelectionKind::Exploration)
        .map(|(item, _)| item.post.author_id)
        .collect();

    // The consistently-ignored author never beats the liked one under UCB
    assert!(!explored_authors.contains(&ignored_author) || explored_authors.contains(&liked_author));

    let summary = engine.exploration_summary().unwrap();
    assert_eq!(summary.total_authors_tracked, 2);
    assert_eq!(summary.feedback_log_len, 40);
    assert_eq!(summary.strategy_used, ExplorationStrategy::Ucb);
}

#[test]
fn shared_stats_store_feeds_multiple_engines() {
    let store = Arc::new(feed_ranking::AuthorStatsStore::new());
    let config = Config::default();

    let engine_a =
        RankingEngine::with_stats_store(viewer(), config.clone(), Arc::clone(&store)).unwrap();
    let engine_b =
        RankingEngine::with_stats_store(viewer(), config, Arc::clone(&store)).unwrap();

    let author = Uuid::new_v4();
    engine_a.record_engagement(Uuid::new_v4(), author, EngagementKind::Repost);
    engine_b.record_engagement(Uuid::new_v4(), author, EngagementKind::Bookmark);

    let stats = store.get(&author);
    assert_eq!(stats.successes, 2);
    assert_eq!(stats.failures, 0);
}

#[test]
fn concurrent_ranking_and_feedback() {
    use std::thread;

    init_tracing();
    let viewer = viewer();
    let graph = EngagementGraph::new(viewer.user_id);
    let engine = Arc::new(RankingEngine::new(viewer, Config::default()).unwrap());

    let rankers: Vec<_> = (0..4)
        .map(|seed| {
            let engine = Arc::clone(&engine);
            let graph = graph.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..20 {
                    let feed = engine.rank_posts(wide_candidate_pool(30), &graph, None, 10, &mut rng);
                    assert_eq!(feed.items.len(), 10);
                }
            })
        })
        .collect();

    let author = Uuid::new_v4();
    let recorders: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..50 {
                    engine.record_engagement(Uuid::new_v4(), author, EngagementKind::Like);
                }
            })
        })
        .collect();

    for handle in rankers.into_iter().chain(recorders) {
        handle.join().unwrap();
    }

    let summary = engine.exploration_summary().unwrap();
    assert_eq!(summary.feedback_log_len, 200);
}

#[test]
fn seeded_pipeline_runs_are_identical() {
    let viewer_record = viewer();
    let graph = EngagementGraph::new(viewer_record.user_id);
    let engine = RankingEngine::new(viewer_record, Config::default()).unwrap();

    let candidates = wide_candidate_pool(25);

    let mut rng_a = StdRng::seed_from_u64(777);
    let mut rng_b = StdRng::seed_from_u64(777);
    let feed_a = engine.rank_posts(candidates.clone(), &graph, None, 10, &mut rng_a);
    let feed_b = engine.rank_posts(candidates, &graph, None, 10, &mut rng_b);

    let ids_a: Vec<Uuid> = feed_a.items.iter().map(|r| r.post.post_id).collect();
    let ids_b: Vec<Uuid> = feed_b.items.iter().map(|r| r.post.post_id).collect();
    assert_eq!(ids_a, ids_b);
}

#[test]
fn weight_update_renormalizes_for_any_input() {
    let mut engine = RankingEngine::new(viewer(), Config::default()).unwrap();

    for weights in [
        PreferenceWeights {
            recency: 0.9,
            popularity: 0.9,
            quality: 0.9,
            topic_relevance: 0.9,
            diversity: 0.05,
        },
        PreferenceWeights {
            recency: 0.1,
            popularity: 0.1,
            quality: 0.05,
            topic_relevance: 0.05,
            diversity: 0.0,
        },
        PreferenceWeights::default(),
    ] {
        engine.set_weights(weights).unwrap();
        assert!((engine.weights().positive_sum() - 1.0).abs() <= 0.01);
    }

    // Invalid update leaves the previous normalized weights untouched
    let before = *engine.weights();
    let result = engine.set_weights(PreferenceWeights {
        diversity: -0.5,
        ..Default::default()
    });
    assert!(result.is_err());
    assert_eq!(*engine.weights(), before);
}
