mod common;

use std::time::Duration;

use common::{game_account, ledger, player, registered_client, registered_client_with, settings};
use kingpin::game::types::District;
use kingpin::game::KingpinError;
use kingpin::gateway::local::LedgerCall;
use kingpin::gateway::WriteOp;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn purchase_authorizes_exact_cost_then_buys() {
    let ledger = ledger();
    ledger.set_price(District::BlackMarket, 0, 10);
    let client = registered_client(&ledger, District::BlackMarket, 1, &[]).await;

    assert_ok!(client.buy(0, 3).await);

    assert_eq!(
        ledger.submitted(),
        vec![
            WriteOp::AuthorizeSpend {
                spender: game_account(),
                amount: 30
            },
            WriteOp::BuyAsset { asset: 0, amount: 3 },
        ]
    );
    // The buy is only submitted after the authorization is confirmed.
    let writes: Vec<LedgerCall> = ledger
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, LedgerCall::Read(_)))
        .collect();
    assert!(matches!(
        writes.as_slice(),
        [
            LedgerCall::Submit(WriteOp::AuthorizeSpend { .. }),
            LedgerCall::Confirm(WriteOp::AuthorizeSpend { .. }),
            LedgerCall::Submit(WriteOp::BuyAsset { .. }),
            LedgerCall::Confirm(WriteOp::BuyAsset { .. }),
        ]
    ));
    assert_eq!(client.status().current(), "Bought 3 GPU Rigs");
    assert_eq!(ledger.balance_of(&player()), 970);
}

#[tokio::test]
async fn snapshot_after_purchase_comes_from_the_remote() {
    let ledger = ledger();
    ledger.set_price(District::BlackMarket, 0, 10);
    let client = registered_client(&ledger, District::BlackMarket, 1, &[]).await;
    assert_eq!(client.snapshot().unwrap().quantity(0), 0);

    // Remote state moves on without the client hearing about it.
    ledger.seed_player(&player(), District::BlackMarket, 1, &[(0, 5)]);

    assert_ok!(client.buy(0, 3).await);
    let snap = client.snapshot().unwrap();
    assert_eq!(snap.quantity(0), 8);
    assert_eq!(snap.action_points, 0);
}

#[tokio::test]
async fn rejected_buy_reports_the_confirmed_authorization() {
    let ledger = ledger();
    ledger.set_price(District::BlackMarket, 0, 10);
    let client = registered_client(&ledger, District::BlackMarket, 1, &[]).await;
    ledger.reject_next_write("buyAsset");

    let err = assert_err!(client.buy(0, 3).await);
    assert!(matches!(err, KingpinError::SubmissionRejected(_)));

    let status = client.status().current();
    assert!(status.starts_with("Purchase failed: transaction rejected"), "{}", status);
    assert!(status.ends_with("(already confirmed: spend authorization of 30)"), "{}", status);
    assert_eq!(ledger.allowance(&player(), &game_account()), 30);
    assert_eq!(ledger.balance_of(&player()), 1_000);

    let snap = client.snapshot().unwrap();
    assert_eq!(snap.action_points, 1);
    assert_eq!(snap.quantity(0), 0);
}

#[tokio::test]
async fn stalled_confirmation_times_out_after_the_authorization() {
    let ledger = ledger();
    ledger.set_price(District::BlackMarket, 0, 10);
    let mut quick = settings();
    quick.confirmation_timeout = Some(Duration::from_millis(50));
    let client = registered_client_with(&ledger, quick, District::BlackMarket, 1, &[]).await;
    ledger.stall_next_confirm("buyAsset");

    let err = assert_err!(client.buy(0, 3).await);
    match err {
        KingpinError::RemoteUnavailable(reason) => {
            assert!(reason.ends_with("timed out after 50ms"), "{}", reason)
        }
        other => panic!("expected RemoteUnavailable, got {:?}", other),
    }

    let status = client.status().current();
    assert!(status.starts_with("Purchase failed: remote unavailable"), "{}", status);
    assert!(status.ends_with("(already confirmed: spend authorization of 30)"), "{}", status);
    assert_eq!(
        ledger.submitted(),
        vec![
            WriteOp::AuthorizeSpend {
                spender: game_account(),
                amount: 30
            },
            WriteOp::BuyAsset { asset: 0, amount: 3 },
        ]
    );
    assert_eq!(ledger.allowance(&player(), &game_account()), 30);
    assert_eq!(client.snapshot().unwrap().quantity(0), 0);
}

#[tokio::test]
async fn failed_authorization_never_submits_the_buy() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Docks, 3, &[]).await;
    ledger.reject_next_write("authorizeSpend");

    assert_err!(client.buy(1, 2).await);
    assert_eq!(ledger.submitted().len(), 1);
    assert!(!ledger
        .submitted()
        .iter()
        .any(|op| matches!(op, WriteOp::BuyAsset { .. })));
    assert!(!client.status().current().contains("already confirmed"));
}

#[tokio::test]
async fn price_lookup_failure_submits_nothing() {
    let ledger = ledger();
    let client = registered_client(&ledger, District::Docks, 3, &[]).await;
    ledger.fail_next_read("getAssetPrice");

    let err = assert_err!(client.buy(0, 1).await);
    assert!(matches!(err, KingpinError::RemoteUnavailable(_)));
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn quote_matches_the_purchase_plan() {
    let ledger = ledger();
    ledger.set_price(District::TechHub, 2, 45);
    let client = registered_client(&ledger, District::TechHub, 3, &[]).await;

    let quote = assert_ok!(client.quote(2, 4).await);
    assert_eq!(quote.price, 45);
    assert_eq!(quote.total, 180);
    assert_eq!(client.status().current(), "Quote: 4 Stolen Data at 45 = 180");

    let prices = assert_ok!(client.market_prices().await);
    assert_eq!(prices.len(), 5);
    assert_eq!(prices[&2], 45);
    // Base 10 at risk 3: 10 * 13 / 10.
    assert_eq!(prices[&0], 13);
    assert!(ledger.submitted().is_empty());
}
