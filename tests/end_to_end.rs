mod common;

use common::{builder, create_sig, days, engine, start_clock, vote_sig};
use hype_rank::{
    BuildError, CommentOutcome, ContentStore, GeoPoint, ImpactTag, ItemId, LinkedLocation, NewSource,
    RankingError, SourceId, Stores, VoteOutcome,
};
use std::time::Duration;

const ALICE: &str = "0xA11CE";
const BOB: &str = "0xB0B";
const CAROL: &str = "0xCA201";

fn berlin() -> GeoPoint {
    GeoPoint::new(13.4050, 52.5200).unwrap()
}

fn munich() -> GeoPoint {
    GeoPoint::new(11.5820, 48.1351).unwrap()
}

#[test]
fn test_item_lifecycle_scores() {
    let clock = start_clock();
    let engine = engine(&clock);
    let id = ItemId::from("drop-1");

    let item = engine
        .create_item(id.clone(), berlin(), ALICE, &create_sig(ALICE))
        .unwrap();
    assert!((item.hype_score - 2.0).abs() < 1e-9);

    let VoteOutcome::Accepted(voted) = engine.vote(&id, BOB, &vote_sig("drop-1", BOB)).unwrap()
    else {
        panic!("first vote must count");
    };
    assert!(voted.hype_score > item.hype_score);

    let CommentOutcome::Recorded(commented) = engine
        .submit_comment("198.51.100.1", &id, "best gig this year", "bea")
        .unwrap()
    else {
        panic!("first comment from a source must pass");
    };
    assert!(commented.hype_score > voted.hype_score);
    assert!((commented.hype_score - 3.3).abs() < 1e-9);
}

#[test]
fn test_severe_source_in_radius_lowers_score() {
    let clock = start_clock();
    let engine = engine(&clock);
    let near = ItemId::from("near");
    let far = ItemId::from("far");

    engine
        .create_item(near.clone(), berlin(), ALICE, &create_sig(ALICE))
        .unwrap();
    engine
        .create_item(far.clone(), munich(), ALICE, &create_sig(ALICE))
        .unwrap();
    engine.vote(&near, BOB, &vote_sig("near", BOB)).unwrap();

    let near_before = engine.item(&near).unwrap().unwrap().hype_score;
    let far_before = engine.item(&far).unwrap().unwrap().hype_score;

    let (source, report) = engine
        .register_source(
            NewSource {
                id: SourceId::from("incident-7"),
                tag: ImpactTag::Severe,
                linked_location: Some(LinkedLocation::new(berlin(), Some(2_000.0)).unwrap()),
            },
            CAROL,
            &create_sig(CAROL),
        )
        .unwrap();

    assert_eq!(source.impact_multiplier(), 0.5);
    assert_eq!(report.items_updated, 2);
    assert_eq!(report.sources_considered, 1);

    let near_after = engine.item(&near).unwrap().unwrap().hype_score;
    let far_after = engine.item(&far).unwrap().unwrap().hype_score;
    assert!(near_after < near_before);
    assert_eq!(far_after, far_before);

    engine
        .set_source_active(&SourceId::from("incident-7"), false)
        .unwrap();
    let near_restored = engine.item(&near).unwrap().unwrap().hype_score;
    assert!((near_restored - near_before).abs() < 1e-9);
}

#[test]
fn test_new_items_pick_up_existing_sources() {
    let clock = start_clock();
    let engine = engine(&clock);

    engine
        .register_source(
            NewSource {
                id: SourceId::from("festival-review"),
                tag: ImpactTag::Positive,
                linked_location: Some(LinkedLocation::new(berlin(), None).unwrap()),
            },
            CAROL,
            &create_sig(CAROL),
        )
        .unwrap();

    let item = engine
        .create_item(ItemId::from("drop-2"), berlin(), ALICE, &create_sig(ALICE))
        .unwrap();
    assert!((item.hype_score - 2.4).abs() < 1e-9);
}

#[test]
fn test_one_vote_per_identity_per_item() {
    let clock = start_clock();
    let engine = engine(&clock);
    let a = ItemId::from("a");
    let b = ItemId::from("b");
    engine.create_item(a.clone(), berlin(), ALICE, &create_sig(ALICE)).unwrap();
    engine.create_item(b.clone(), berlin(), ALICE, &create_sig(ALICE)).unwrap();

    assert!(engine.vote(&a, BOB, &vote_sig("a", BOB)).unwrap().is_accepted());

    // a differently-cased identity is the same voter
    let lower = BOB.to_lowercase();
    assert_eq!(
        engine.vote(&a, &lower, &vote_sig("a", &lower)).unwrap(),
        VoteOutcome::Duplicate
    );

    // the same identity may still vote on another item
    assert!(engine.vote(&b, BOB, &vote_sig("b", BOB)).unwrap().is_accepted());

    assert_eq!(engine.item(&a).unwrap().unwrap().vote_count, 1);
    assert_eq!(engine.item(&b).unwrap().unwrap().vote_count, 1);
    assert_eq!(engine.metrics().votes_duplicate(), 1);
}

#[test]
fn test_vote_signature_must_match_item() {
    let clock = start_clock();
    let engine = engine(&clock);
    let id = ItemId::from("a");
    engine.create_item(id.clone(), berlin(), ALICE, &create_sig(ALICE)).unwrap();

    // signed for a different item
    let result = engine.vote(&id, BOB, &vote_sig("b", BOB));
    assert_eq!(result, Err(RankingError::InvalidSignature));
    assert_eq!(engine.item(&id).unwrap().unwrap().vote_count, 0);

    // a rejected attempt does not burn the identity's vote
    assert!(engine.vote(&id, BOB, &vote_sig("a", BOB)).unwrap().is_accepted());
}

#[test]
fn test_precomputed_commitment_votes() {
    let clock = start_clock();
    let engine = engine(&clock);
    let id = ItemId::from("a");
    engine.create_item(id.clone(), berlin(), ALICE, &create_sig(ALICE)).unwrap();

    let hash = engine.commit(BOB, "a").unwrap();
    assert!(engine.record_vote_if_new(&id, hash.clone()).unwrap().is_accepted());
    assert_eq!(
        engine.record_vote_if_new(&id, hash).unwrap(),
        VoteOutcome::Duplicate
    );
}

#[test]
fn test_comments_are_rate_limited_per_source() {
    let clock = start_clock();
    let engine = engine(&clock);
    let id = ItemId::from("a");
    engine.create_item(id.clone(), berlin(), ALICE, &create_sig(ALICE)).unwrap();

    assert!(matches!(
        engine.submit_comment("203.0.113.9", &id, "one", "ana").unwrap(),
        CommentOutcome::Recorded(_)
    ));
    clock.advance(Duration::from_secs(5));
    assert_eq!(
        engine.submit_comment("203.0.113.9", &id, "two", "ben").unwrap(),
        CommentOutcome::RateLimited
    );
    clock.advance(Duration::from_secs(5));
    assert!(matches!(
        engine.submit_comment("203.0.113.9", &id, "three", "ben").unwrap(),
        CommentOutcome::Recorded(_)
    ));

    assert_eq!(engine.item(&id).unwrap().unwrap().unique_contributors, 2);
    assert_eq!(engine.metrics().requests_limited(), 1);
}

#[test]
fn test_comment_on_missing_item() {
    let clock = start_clock();
    let engine = engine(&clock);
    let ghost = ItemId::from("ghost");

    let result = engine.submit_comment("203.0.113.9", &ghost, "hello", "ana");
    assert_eq!(result, Err(RankingError::ItemNotFound(ghost)));
}

#[test]
fn test_sweep_applies_decay() {
    let clock = start_clock();
    let engine = engine(&clock);
    let id = ItemId::from("a");
    engine.create_item(id.clone(), berlin(), ALICE, &create_sig(ALICE)).unwrap();

    clock.advance(days(14));
    let report = engine.sweep().unwrap();
    assert_eq!(report.items_updated, 1);

    let item = engine.item(&id).unwrap().unwrap();
    assert!((item.hype_score - 0.5).abs() < 1e-9);
}

#[test]
fn test_rankings() {
    let clock = start_clock();
    let engine = engine(&clock);

    for id in ["quiet", "popular", "busy"] {
        engine
            .create_item(ItemId::from(id), berlin(), ALICE, &create_sig(ALICE))
            .unwrap();
    }
    for voter in [ALICE, BOB, CAROL] {
        engine
            .vote(&ItemId::from("popular"), voter, &vote_sig("popular", voter))
            .unwrap();
    }
    engine
        .vote(&ItemId::from("busy"), ALICE, &vote_sig("busy", ALICE))
        .unwrap();

    let ranked: Vec<String> = engine
        .top(10)
        .unwrap()
        .into_iter()
        .map(|item| item.id.0)
        .collect();
    assert_eq!(ranked, vec!["popular", "busy", "quiet"]);
}

#[test]
fn test_source_verification() {
    let clock = start_clock();
    let engine = engine(&clock);
    let id = SourceId::from("article-3");
    engine
        .register_source(
            NewSource {
                id: id.clone(),
                tag: "good".parse().unwrap(),
                linked_location: None,
            },
            ALICE,
            &create_sig(ALICE),
        )
        .unwrap();

    for voter in [ALICE, BOB] {
        assert!(engine
            .verify_source(&id, voter, &vote_sig("article-3", voter))
            .unwrap()
            .is_accepted());
    }
    assert_eq!(
        engine
            .verify_source(&id, BOB, &vote_sig("article-3", BOB))
            .unwrap(),
        VoteOutcome::Duplicate
    );
    assert_eq!(engine.source(&id).unwrap().unwrap().verify_count, 2);
}

#[test]
fn test_injected_stores_are_shared() {
    let clock = start_clock();
    let stores = Stores::in_memory();
    let engine = builder(&clock).with_stores(stores.clone()).build().unwrap();

    engine
        .create_item(ItemId::from("a"), berlin(), ALICE, &create_sig(ALICE))
        .unwrap();

    assert_eq!(stores.content.ids().unwrap(), vec![ItemId::from("a")]);
}

#[test]
fn test_secret_from_env() {
    let clock = start_clock();

    std::env::remove_var("HYPE_SERVER_SECRET");
    let missing = hype_rank::HypeEngine::builder()
        .with_verifier(std::sync::Arc::new(common::EchoVerifier))
        .with_clock(std::sync::Arc::new(clock.clone()))
        .with_server_secret_from_env()
        .build();
    assert!(matches!(missing, Err(BuildError::SecretEnvUnset("HYPE_SERVER_SECRET"))));

    std::env::set_var("HYPE_SERVER_SECRET", "from-env");
    let from_env = hype_rank::HypeEngine::builder()
        .with_verifier(std::sync::Arc::new(common::EchoVerifier))
        .with_server_secret_from_env()
        .build()
        .unwrap();
    let explicit = builder(&clock).with_server_secret("from-env").build().unwrap();
    std::env::remove_var("HYPE_SERVER_SECRET");

    assert_eq!(
        from_env.commit(ALICE, "a").unwrap(),
        explicit.commit(ALICE, "a").unwrap()
    );
}
