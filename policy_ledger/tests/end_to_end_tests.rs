use policy_ledger::logging::{AuditEvent, MemorySink};
use policy_ledger::rl::presets::preset;
use policy_ledger::rl::runner::run_agent;
use policy_ledger::rl::trainer::TrainerConfig;
use policy_ledger::{
    read_claim_file, write_claim_file, ArtifactStore, BaselineKind, Consumer, InMemorySessionStore, Ledger,
    Marketplace, SessionStatus, SessionStore, SubmissionCollector, TrustPipeline, Verifier, GENESIS_HASH,
};

#[test]
fn train_verify_record_select_reuse() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("policies"));
    let sessions = InMemorySessionStore::new();
    let env = preset("short_burst").unwrap().env_config().unwrap();

    let verifier = Verifier::default();
    let mut collector = SubmissionCollector::new();
    for (agent, seed) in [("agent_a", 1), ("agent_b", 2), ("agent_c", 3)] {
        let trainer = TrainerConfig::default().with_episodes(150).with_seed(seed);
        let claim = run_agent(agent, &env, trainer, verifier.replay_engine(), &store, Some(&sessions)).unwrap();

        // Claims travel through claim files between processes.
        let path = dir.path().join(format!("{agent}.json"));
        write_claim_file(&path, &claim).unwrap();
        collector.submit(read_claim_file(&path).unwrap());
    }

    // The liar resubmits agent_a's policy with an inflated reward.
    let mut liar = collector.by_agent("agent_a")[0].claim.clone();
    liar.agent_id = "liar".to_string();
    liar.claimed_reward += 10.0;
    collector.submit(liar);

    assert!(sessions.list().iter().all(|s| s.status == SessionStatus::Completed));

    let sink = MemorySink::new();
    let ledger_path = dir.path().join("ledger.json");
    let mut pipeline =
        TrustPipeline::new(verifier, Ledger::open(&ledger_path).unwrap()).with_sink(sink.clone());
    let outcomes = pipeline.process_all(&mut collector).unwrap();

    let accepted: Vec<_> = outcomes
        .iter()
        .filter(|o| o.accepted())
        .map(|o| o.result.agent_id.as_str())
        .collect();
    assert_eq!(accepted, ["agent_a", "agent_b", "agent_c"]);
    let liar = outcomes.iter().find(|o| o.result.agent_id == "liar").unwrap();
    assert!(!liar.accepted());

    let entries = pipeline.ledger().read_all();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].previous_hash, GENESIS_HASH);
    for pair in entries.windows(2) {
        assert_eq!(pair[1].previous_hash, pair[0].current_hash);
    }

    // Every decision was audited: 4 submissions, 4 verifications, 3 appends.
    let events = sink.events();
    let appends = events
        .iter()
        .filter(|e| matches!(e, AuditEvent::LedgerAppend { .. }))
        .count();
    assert_eq!(events.len(), 11);
    assert_eq!(appends, 3);

    // A fresh process sees the same ledger and the same best policy.
    drop(pipeline);
    let reloaded = Ledger::open(&ledger_path).unwrap();
    assert_eq!(reloaded.read_all(), entries);
    let best = Marketplace::new(&reloaded).get_best_policy().unwrap();
    let top = entries
        .iter()
        .map(|e| e.verified_reward)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best.verified_reward, top);

    let report = Consumer::new(store)
        .with_horizon(env.horizon())
        .reuse_best(&best, BaselineKind::Random, 10, env.seed())
        .unwrap();
    assert_eq!(report.reference, best);
}
