use chrono::{Duration, TimeZone, Utc};

use policy_ledger::ledger::{Ledger, SteppingClock};
use policy_ledger::Marketplace;

#[test]
fn three_way_tie_goes_to_the_earliest_entry() {
    let ledger = Ledger::in_memory().with_clock(SteppingClock::new(
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        Duration::seconds(1),
    ));
    ledger.append(&"1".repeat(64), 20.0, "first").unwrap();
    ledger.append(&"2".repeat(64), 20.0, "second").unwrap();
    ledger.append(&"3".repeat(64), 20.0, "third").unwrap();

    let market = Marketplace::new(&ledger);
    for _ in 0..3 {
        assert_eq!(market.get_best_policy().unwrap().agent_id, "first");
    }
    let ranked: Vec<_> = market
        .get_ranked_policies()
        .into_iter()
        .map(|r| r.agent_id)
        .collect();
    assert_eq!(ranked, ["first", "second", "third"]);
}

#[test]
fn frozen_clock_still_orders_ties_by_append() {
    let ledger = Ledger::in_memory().with_clock(SteppingClock::fixed(
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    ));
    ledger.append(&"1".repeat(64), 5.0, "early").unwrap();
    ledger.append(&"2".repeat(64), 5.0, "late").unwrap();
    assert_eq!(Marketplace::new(&ledger).get_best_policy().unwrap().agent_id, "early");
}

#[test]
fn higher_reward_wins_regardless_of_order() {
    let ledger = Ledger::in_memory();
    ledger.append(&"1".repeat(64), 3.0, "low").unwrap();
    ledger.append(&"2".repeat(64), 30.0, "high").unwrap();
    ledger.append(&"3".repeat(64), -4.0, "negative").unwrap();

    let market = Marketplace::new(&ledger);
    let best = market.get_best_policy().unwrap();
    assert_eq!(best.agent_id, "high");
    assert_eq!(best.verified_reward, 30.0);
    assert_eq!(best.policy_hash, "2".repeat(64));

    // Selection never mutates the ledger.
    assert_eq!(ledger.len(), 3);
    assert!(ledger.verify_integrity().is_ok());
}

#[test]
fn empty_ledger_has_no_best_policy() {
    let ledger = Ledger::in_memory();
    assert!(Marketplace::new(&ledger).get_best_policy().is_none());
    assert!(Marketplace::new(&ledger).get_ranked_policies().is_empty());
}
