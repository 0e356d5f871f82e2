mod common;

use std::time::Duration;

use common::{account, ledger, player, registered_client};
use kingpin::game::types::District;
use tokio::time::{sleep, timeout};
use tokio_test::assert_ok;

async fn wait_for_status(rx: &mut tokio::sync::watch::Receiver<String>) {
    timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("status update within 2s")
        .expect("status board alive");
}

fn encounter_count(history: &[String]) -> usize {
    history.iter().filter(|m| m.starts_with("Encounter:")).count()
}

#[tokio::test]
async fn encounters_for_the_player_reach_the_status_board() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Financial, 5, &[]).await;
    assert!(!client.is_listening());
    assert_ok!(client.move_to(2).await);
    assert!(client.is_listening());

    let mut rx = client.status().subscribe();
    ledger.emit_encounter(&player(), 3);
    wait_for_status(&mut rx).await;

    assert_eq!(client.status().current(), "Encounter: 3");
}

#[tokio::test]
async fn encounters_for_other_accounts_are_ignored() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Financial, 5, &[]).await;
    assert_ok!(client.move_to(4).await);

    let mut rx = client.status().subscribe();
    ledger.emit_encounter(&account(9), 2);
    ledger.emit_encounter(&player(), 1);
    wait_for_status(&mut rx).await;
    sleep(Duration::from_millis(50)).await;

    let history = client.status().history();
    assert_eq!(encounter_count(&history), 1);
    assert_eq!(history.last().map(String::as_str), Some("Encounter: 1"));
}

#[tokio::test]
async fn repeated_moves_keep_a_single_subscription() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Financial, 5, &[]).await;
    assert_ok!(client.move_to(1).await);
    assert_ok!(client.move_to(2).await);
    assert_ok!(client.move_to(3).await);

    let mut rx = client.status().subscribe();
    ledger.emit_encounter(&player(), 0);
    wait_for_status(&mut rx).await;
    sleep(Duration::from_millis(50)).await;

    assert_eq!(encounter_count(&client.status().history()), 1);
}

#[tokio::test]
async fn disconnect_stops_delivery() {
    let ledger = ledger();
    let mut client = registered_client(&ledger, District::Financial, 5, &[]).await;
    assert_ok!(client.move_to(5).await);
    client.disconnect();
    assert!(!client.is_listening());

    ledger.emit_encounter(&player(), 2);
    sleep(Duration::from_millis(50)).await;

    assert_eq!(encounter_count(&client.status().history()), 0);
    assert_eq!(client.status().current(), "Disconnected");
}
