mod common;

use common::{client, ledger, player, registered_client};
use kingpin::game::types::{District, GridPosition};
use kingpin::game::KingpinError;
use kingpin::gateway::WriteOp;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn out_of_range_location_fails_before_any_remote_call() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Financial, 5, &[]).await;

    let err = assert_err!(client.move_to(9).await);
    assert!(matches!(err, KingpinError::InvalidLocation(_)));
    assert!(ledger.calls().is_empty());
    assert!(client.status().current().starts_with("Move failed: invalid location"));

    // Same answer with no session at all.
    let idle = common::client(&ledger);
    assert!(matches!(
        idle.move_to(9).await,
        Err(KingpinError::InvalidLocation(_))
    ));
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn move_updates_district_position_and_action_points() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Financial, 3, &[]).await;

    assert_ok!(client.move_to(2).await);

    assert_eq!(
        ledger.submitted(),
        vec![WriteOp::MoveToDistrict {
            district: District::BlackMarket
        }]
    );
    let snap = client.snapshot().unwrap();
    assert_eq!(snap.current_district, District::BlackMarket);
    assert_eq!(snap.action_points, 2);
    assert_eq!(client.position(), Some(GridPosition::new(8, 8)));
    assert_eq!(client.status().current(), "Moved to Black Market");
    assert!(client.is_listening());
}

#[tokio::test]
async fn grid_cells_route_to_their_district() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Financial, 3, &[]).await;

    let err = assert_err!(client.move_to_cell(GridPosition::new(0, 0)).await);
    assert!(matches!(err, KingpinError::InvalidLocation(_)));
    assert!(matches!(
        client.move_to_cell(GridPosition::new(12, 3)).await,
        Err(KingpinError::InvalidLocation(_))
    ));
    assert!(ledger.calls().is_empty());

    assert_ok!(client.move_to_cell(GridPosition::new(1, 8)).await);
    assert_eq!(client.snapshot().unwrap().current_district, District::Outskirts);
}

#[tokio::test]
async fn exhausted_action_points_block_the_move_locally() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Financial, 0, &[]).await;

    let err = assert_err!(client.move_to(3).await);
    assert_eq!(
        err,
        KingpinError::InsufficientActionPoints {
            available: 0,
            required: 1
        }
    );
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn unregistered_accounts_cannot_move() {
    let ledger = ledger();
    let mut client = client(&ledger);
    assert_ok!(client.connect(player()).await);
    ledger.clear_calls();

    assert_eq!(assert_err!(client.move_to(1).await), KingpinError::NotRegistered);
    assert!(ledger.calls().is_empty());
}
