mod common;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::watch;

use claimwatch::models::{AlertType, ClaimType, OddsSnapshot};
use claimwatch::services::monitor::subject_key;
use claimwatch::services::state_store::StateStore;

use common::{account, api_market, harness, harness_at, position_record};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn far_future() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn test_resolved_winner_end_to_end() {
    let acct = account(1);
    let mut h = harness(vec![acct.clone()]);

    // 25 SOL pool, 40% on YES => YES pool 10 SOL
    h.markets.set(vec![api_market(7, "resolved", Some("yes"), 40, 25, 200, t0())]);
    h.positions.set(&acct, vec![position_record("Pos1", 1, 7, 2_000_000_000, 0, false)]);

    let report = h.monitor.process_account(&acct, t0()).await.expect("account processed");

    assert_eq!(report.positions, 1);
    assert_eq!(report.claimable.len(), 1);
    assert_eq!(report.claimable[0].claim_type, ClaimType::Winnings);
    assert_eq!(report.total_claimable, 4_940_000_000);
    // claimable + resolution
    assert_eq!(report.alerts, 2);
    assert_eq!(h.notifier.alert_count(), 2);
    assert!(h.monitor.store().is_resolved(7));
    assert_eq!(
        h.monitor.store().last_alerted(&acct, AlertType::Claimable),
        t0().timestamp_millis()
    );
}

#[tokio::test]
async fn test_cancelled_market_refunds_both_sides() {
    let acct = account(2);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(3, "cancelled", None, 50, 10, 200, t0())]);
    h.positions.set(
        &acct,
        vec![position_record("Pos1", 2, 3, 1_000_000_000, 500_000_000, false)],
    );

    let report = h.monitor.process_account(&acct, t0()).await.unwrap();

    assert_eq!(report.claimable[0].claim_type, ClaimType::Cancelled);
    assert_eq!(report.total_claimable, 1_500_000_000);
}

#[tokio::test]
async fn test_claimable_cooldown() {
    let acct = account(3);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(1, "resolved", None, 50, 10, 0, t0())]);
    h.positions.set(&acct, vec![position_record("Pos1", 3, 1, 1_000_000_000, 0, false)]);

    let first = h.monitor.process_account(&acct, t0()).await.unwrap();
    assert_eq!(first.alerts, 2); // claimable + resolution

    let again = h.monitor.process_account(&acct, t0() + Duration::minutes(1)).await.unwrap();
    assert_eq!(again.total_claimable, first.total_claimable);
    assert_eq!(again.alerts, 0);

    let later = h.monitor.process_account(&acct, t0() + Duration::minutes(61)).await.unwrap();
    assert_eq!(later.alerts, 1);
    assert_eq!(h.notifier.alert_count(), 3);
}

#[tokio::test]
async fn test_claimable_below_threshold_is_silent() {
    let acct = account(4);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(1, "cancelled", None, 50, 10, 0, t0())]);
    // exactly the 0.01 SOL threshold: not above it
    h.positions.set(&acct, vec![position_record("Pos1", 4, 1, 10_000_000, 0, false)]);

    let report = h.monitor.process_account(&acct, t0()).await.unwrap();

    assert_eq!(report.total_claimable, 10_000_000);
    assert_eq!(report.alerts, 0);
    assert_eq!(h.monitor.store().last_alerted(&acct, AlertType::Claimable), 0);
}

#[tokio::test]
async fn test_claimed_positions_do_not_alert() {
    let acct = account(5);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(1, "cancelled", None, 50, 10, 0, t0())]);
    h.positions.set(&acct, vec![position_record("Pos1", 5, 1, 5_000_000_000, 0, true)]);

    let report = h.monitor.process_account(&acct, t0()).await.unwrap();
    assert!(report.claimable.is_empty());
    assert_eq!(report.alerts, 0);
}

#[tokio::test]
async fn test_resolution_alerts_once_across_restart() {
    let acct = account(6);
    let path = common::temp_state_path();
    let market = api_market(9, "resolved", Some("no"), 50, 10, 0, t0());

    let mut h = harness_at(vec![acct.clone()], path.clone());
    h.markets.set(vec![market.clone()]);
    // losing stake: no claimable alert, only resolution
    h.positions.set(&acct, vec![position_record("Pos1", 6, 9, 1_000_000, 0, false)]);

    assert_eq!(h.monitor.process_account(&acct, t0()).await.unwrap().alerts, 1);
    assert_eq!(h.monitor.process_account(&acct, t0()).await.unwrap().alerts, 0);

    let mut restarted = harness_at(vec![acct.clone()], path.clone());
    restarted.markets.set(vec![market]);
    restarted
        .positions
        .set(&acct, vec![position_record("Pos1", 6, 9, 1_000_000, 0, false)]);

    let report = restarted.monitor.process_account(&acct, t0()).await.unwrap();
    assert_eq!(report.alerts, 0);
    assert_eq!(restarted.notifier.alert_count(), 0);
    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_resolution_check_is_idempotent() {
    let acct = account(7);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(2, "resolved", Some("yes"), 50, 10, 0, t0())]);
    h.monitor.process_account(&acct, t0()).await.unwrap();

    let market = h.monitor.cache().snapshot().unwrap().get(2).cloned().unwrap();
    assert!(h.monitor.check_resolution(&acct, &market, t0()).await.unwrap());
    assert!(!h.monitor.check_resolution(&acct, &market, t0()).await.unwrap());
    assert_eq!(h.notifier.alert_count(), 1);
}

#[tokio::test]
async fn test_odds_shift_alerts_and_always_updates_snapshot() {
    let acct = account(8);
    let mut h = harness(vec![acct.clone()]);
    h.positions.set(&acct, vec![position_record("Pos1", 8, 4, 1_000_000, 0, false)]);

    // first observation only records odds
    h.markets.set(vec![api_market(4, "active", None, 50, 10, 0, far_future())]);
    assert_eq!(h.monitor.process_account(&acct, t0()).await.unwrap().alerts, 0);
    assert_eq!(
        h.monitor.store().odds(4).unwrap().side_a_percent,
        Decimal::from(50)
    );

    // 50 -> 61 crosses the 10 point threshold
    h.markets.set(vec![api_market(4, "active", None, 61, 10, 0, far_future())]);
    assert_eq!(h.monitor.process_account(&acct, t0()).await.unwrap().alerts, 1);
    assert_eq!(
        h.monitor.store().odds(4),
        Some(OddsSnapshot {
            side_a_percent: Decimal::from(61),
            side_b_percent: Decimal::from(39),
        })
    );

    // 61 -> 40 is a big move, but inside the 30 minute cooldown
    h.markets.set(vec![api_market(4, "active", None, 40, 10, 0, far_future())]);
    let t1 = t0() + Duration::minutes(10);
    assert_eq!(h.monitor.process_account(&acct, t1).await.unwrap().alerts, 0);
    assert_eq!(
        h.monitor.store().odds(4).unwrap().side_a_percent,
        Decimal::from(40)
    );

    // 40 -> 45 after cooldown: below threshold, still recorded
    h.markets.set(vec![api_market(4, "active", None, 45, 10, 0, far_future())]);
    let t2 = t0() + Duration::minutes(45);
    assert_eq!(h.monitor.process_account(&acct, t2).await.unwrap().alerts, 0);
    assert_eq!(
        h.monitor.store().odds(4).unwrap().side_a_percent,
        Decimal::from(45)
    );

    assert_eq!(
        h.monitor.store().last_alerted(&subject_key(&acct, 4), AlertType::Odds),
        t0().timestamp_millis()
    );
}

#[tokio::test]
async fn test_closing_soon_with_cooldown() {
    let acct = account(9);
    let mut h = harness(vec![acct.clone()]);
    let closes = t0() + Duration::minutes(45);
    h.markets.set(vec![api_market(5, "active", None, 50, 10, 0, closes)]);
    h.positions.set(&acct, vec![position_record("Pos1", 9, 5, 1_000_000, 0, false)]);

    // two hours out: outside the window
    let early = t0() - Duration::minutes(75);
    assert_eq!(h.monitor.process_account(&acct, early).await.unwrap().alerts, 0);

    assert_eq!(h.monitor.process_account(&acct, t0()).await.unwrap().alerts, 1);
    let soon = t0() + Duration::minutes(20);
    assert_eq!(h.monitor.process_account(&acct, soon).await.unwrap().alerts, 0);

    // already closed
    let after = t0() + Duration::minutes(50);
    assert_eq!(h.monitor.process_account(&acct, after).await.unwrap().alerts, 0);
}

#[tokio::test]
async fn test_undecodable_records_are_skipped() {
    let acct = account(10);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(1, "cancelled", None, 50, 10, 0, t0())]);

    let mut foreign = position_record("Foreign", 10, 1, 5, 0, false);
    foreign.data[..8].copy_from_slice(b"NOTAPOS!");
    let truncated = claimwatch::chain::RawRecord {
        address: "Short".into(),
        data: vec![1, 2, 3],
    };
    h.positions.set(
        &acct,
        vec![
            foreign,
            truncated,
            position_record("Good", 10, 1, 20_000_000, 0, false),
        ],
    );

    let report = h.monitor.process_account(&acct, t0()).await.unwrap();
    assert_eq!(report.skipped_records, 2);
    assert_eq!(report.positions, 1);
    assert_eq!(report.claimable[0].position_address, "Good");
}

#[tokio::test]
async fn test_positions_for_unknown_markets_are_skipped() {
    let acct = account(11);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(1, "cancelled", None, 50, 10, 0, t0())]);
    h.positions.set(
        &acct,
        vec![
            position_record("Orphan", 11, 404, 50_000_000, 0, false),
            position_record("Known", 11, 1, 50_000_000, 0, false),
        ],
    );

    let report = h.monitor.process_account(&acct, t0()).await.unwrap();
    assert_eq!(report.positions, 2);
    assert_eq!(report.claimable.len(), 1);
    assert_eq!(report.markets_checked, 1);
}

#[tokio::test]
async fn test_failed_account_does_not_stop_cycle() {
    let bad = account(12);
    let good = account(13);
    let mut h = harness(vec![bad.clone(), good.clone()]);
    h.markets.set(vec![api_market(1, "cancelled", None, 50, 10, 0, t0())]);
    h.positions.fail_for(&bad);
    h.positions.set(&good, vec![position_record("Pos1", 13, 1, 50_000_000, 0, false)]);

    let (_tx, rx) = watch::channel(false);
    let summary = h.monitor.run_cycle(t0(), &rx).await;

    assert_eq!(summary.accounts_failed, 1);
    assert_eq!(summary.accounts_processed, 1);
    assert_eq!(summary.alerts, 1);
    assert!(!summary.interrupted);
}

#[tokio::test]
async fn test_market_source_down_before_first_snapshot() {
    let acct = account(14);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set_failing(true);
    h.positions.set(&acct, vec![position_record("Pos1", 14, 1, 50_000_000, 0, false)]);

    let report = h.monitor.process_account(&acct, t0()).await.unwrap();
    assert_eq!(report.positions, 1);
    assert!(report.claimable.is_empty());
    assert_eq!(report.alerts, 0);
}

#[tokio::test]
async fn test_stale_snapshot_used_when_refresh_fails() {
    let acct = account(15);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(1, "cancelled", None, 50, 10, 0, t0())]);
    h.positions.set(&acct, vec![position_record("Pos1", 15, 1, 50_000_000, 0, false)]);
    h.monitor.process_account(&acct, t0()).await.unwrap();

    h.markets.set_failing(true);
    let later = t0() + Duration::hours(2);
    let report = h.monitor.process_account(&acct, later).await.unwrap();
    assert_eq!(report.claimable.len(), 1);
    assert_eq!(report.alerts, 1);
}

#[tokio::test]
async fn test_shutdown_before_cycle_skips_accounts() {
    let acct = account(16);
    let mut h = harness(vec![acct.clone()]);
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let summary = h.monitor.run_cycle(t0(), &rx).await;
    assert!(summary.interrupted);
    assert_eq!(summary.accounts_processed, 0);
}

#[tokio::test]
async fn test_shutdown_during_cycle_finishes_current_account() {
    let first = account(18);
    let second = account(19);
    let mut h = harness(vec![first.clone(), second.clone()]);
    h.markets.set(vec![api_market(1, "cancelled", None, 50, 10, 0, t0())]);
    h.positions.set(&first, vec![position_record("Pos1", 18, 1, 50_000_000, 0, false)]);
    h.positions.set(&second, vec![position_record("Pos2", 19, 1, 50_000_000, 0, false)]);

    let (tx, rx) = watch::channel(false);
    h.positions.shutdown_during_next_fetch(tx);
    let summary = h.monitor.run_cycle(t0(), &rx).await;

    assert!(summary.interrupted);
    assert_eq!(summary.accounts_processed, 1);
    assert_eq!(summary.positions, 1);
    // the in-flight account still ran its claimable check
    assert_eq!(summary.alerts, 1);
    assert_eq!(h.monitor.store().last_alerted(&first, AlertType::Claimable), t0().timestamp_millis());
    assert_eq!(h.monitor.store().last_alerted(&second, AlertType::Claimable), 0);
}

#[tokio::test]
async fn test_unreadable_accounts_count_as_skipped() {
    let acct = account(20);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(1, "cancelled", None, 50, 10, 0, t0())]);
    h.positions.set(&acct, vec![position_record("Good", 20, 1, 20_000_000, 0, false)]);
    h.positions.set_unreadable(&acct, 2);

    let report = h.monitor.process_account(&acct, t0()).await.unwrap();
    assert_eq!(report.skipped_records, 2);
    assert_eq!(report.positions, 1);
    assert_eq!(report.claimable.len(), 1);
}

#[tokio::test]
async fn test_odds_shift_reaches_every_holder() {
    let a = account(21);
    let b = account(22);
    let mut h = harness(vec![a.clone(), b.clone()]);
    h.positions.set(&a, vec![position_record("PosA", 21, 4, 1_000_000, 0, false)]);
    h.positions.set(&b, vec![position_record("PosB", 22, 4, 0, 1_000_000, false)]);
    let (_tx, rx) = watch::channel(false);

    h.markets.set(vec![api_market(4, "active", None, 50, 10, 0, far_future())]);
    assert_eq!(h.monitor.run_cycle(t0(), &rx).await.alerts, 0);

    h.markets.set(vec![api_market(4, "active", None, 61, 10, 0, far_future())]);
    let t1 = t0() + Duration::minutes(5);
    assert_eq!(h.monitor.run_cycle(t1, &rx).await.alerts, 2);

    for acct in [&a, &b] {
        assert_eq!(
            h.monitor.store().last_alerted(&subject_key(acct, 4), AlertType::Odds),
            t1.timestamp_millis()
        );
    }
    assert_eq!(h.monitor.store().odds(4).unwrap().side_a_percent, Decimal::from(61));

    // unchanged odds on the next cycle: nothing for anyone
    let t2 = t0() + Duration::minutes(10);
    assert_eq!(h.monitor.run_cycle(t2, &rx).await.alerts, 0);
}

#[tokio::test]
async fn test_state_file_written_on_alert() {
    let acct = account(17);
    let mut h = harness(vec![acct.clone()]);
    h.markets.set(vec![api_market(8, "resolved", Some("yes"), 50, 10, 0, t0())]);
    h.positions.set(&acct, vec![position_record("Pos1", 17, 8, 1_000_000, 0, false)]);
    h.monitor.process_account(&acct, t0()).await.unwrap();

    let reopened = StateStore::open(&h.state_path).unwrap();
    assert!(reopened.is_resolved(8));
    std::fs::remove_file(&h.state_path).ok();
}
