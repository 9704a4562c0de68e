//! Receipt engine behaviour against the in-memory store: uniqueness under
//! concurrency, refund retries, voiding and return payment types.

mod support;

use chrono::{DateTime, Duration, Utc};
use recon_commerce::normalize_order;
use recon_core::{
    IngestSource, Order, ReceiptType, RefundEvent, RefundEventStatus, RetryPolicy,
    ReturnPaymentType, Tenant, TenantSettings,
};
use recon_pipeline::{Ineligible, ReceiptDecision, StoreError, TenantStore};
use rust_decimal::Decimal;
use support::{fiscal_settings, paid_order, Harness, TENANT};

const CREATED: &str = "2025-06-01T10:00:00Z";

fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap()
}

async fn stored_order(h: &Harness, id: &str) -> (Tenant, Order) {
    let order = normalize_order(&paid_order(id, CREATED), IngestSource::Backfill).unwrap();
    h.store.upsert_order(TENANT, &order).await.unwrap();
    let tenant = h.store.get_tenant(TENANT).await.unwrap().unwrap();
    (tenant, order)
}

fn refund(order_id: &str, key: &str, cents: i64) -> RefundEvent {
    RefundEvent {
        order_id: order_id.to_string(),
        event_key: key.to_string(),
        amount: Decimal::new(cents, 2),
        refunded_at: ts("2025-06-05T08:00:00Z"),
    }
}

// -----------------------------------------------------------------------
// Sale track
// -----------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sale_evaluations_issue_one_receipt() {
    let h = Harness::new(fiscal_settings());
    let (tenant, order) = stored_order(&h, "ord-1").await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = h.engine.clone();
        let tenant = tenant.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            engine.evaluate_sale(&tenant, &order, Utc::now()).await
        }));
    }

    let mut issued = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ReceiptDecision::Issued(_) => issued += 1,
            ReceiptDecision::AlreadyIssued => {}
            other => panic!("unexpected decision: {other:?}"),
        }
    }
    assert_eq!(issued, 1);
    assert_eq!(h.store.receipts(TENANT).len(), 1);
}

#[tokio::test]
async fn sale_receipt_uses_paid_time() {
    let h = Harness::new(fiscal_settings());
    let (tenant, order) = stored_order(&h, "ord-1").await;

    let decision = h.engine.evaluate_sale(&tenant, &order, Utc::now()).await.unwrap();

    let receipt = decision.receipt().unwrap();
    assert_eq!(receipt.receipt_type, ReceiptType::Sale);
    assert_eq!(receipt.issued_at, ts(CREATED));
    assert_eq!(receipt.reference_receipt_id, None);
}

#[tokio::test]
async fn start_date_boundary_is_inclusive() {
    let at_start = Harness::new(TenantSettings {
        receipts_start_date: Some(ts(CREATED)),
        ..fiscal_settings()
    });
    let (tenant, order) = stored_order(&at_start, "ord-1").await;
    let decision = at_start
        .engine
        .evaluate_sale(&tenant, &order, Utc::now())
        .await
        .unwrap();
    assert!(decision.is_issued());

    let after_start = Harness::new(TenantSettings {
        receipts_start_date: Some(ts(CREATED) + Duration::milliseconds(1)),
        ..fiscal_settings()
    });
    let (tenant, order) = stored_order(&after_start, "ord-1").await;
    let decision = after_start
        .engine
        .evaluate_sale(&tenant, &order, Utc::now())
        .await
        .unwrap();
    assert_eq!(
        decision,
        ReceiptDecision::NotEligible(Ineligible::BeforeStartDate)
    );
    assert!(after_start.store.receipts(TENANT).is_empty());
}

#[tokio::test]
async fn tenant_without_fiscal_store_gets_no_receipts() {
    let h = Harness::new(TenantSettings::default());
    let (tenant, order) = stored_order(&h, "ord-1").await;

    let evaluation = h.engine.evaluate_order(&tenant, &order, Utc::now()).await.unwrap();

    assert_eq!(
        evaluation.sale,
        ReceiptDecision::NotEligible(Ineligible::NoFiscalStore)
    );
    let decision = h
        .engine
        .evaluate_refund(&tenant, &order, &refund("ord-1", "rf-1", 500), Utc::now())
        .await
        .unwrap();
    assert_eq!(
        decision,
        ReceiptDecision::NotEligible(Ineligible::NoFiscalStore)
    );
}

// -----------------------------------------------------------------------
// Refund track
// -----------------------------------------------------------------------

#[tokio::test]
async fn refund_waits_for_sale_receipt() {
    let h = Harness::new(fiscal_settings());
    let (tenant, order) = stored_order(&h, "ord-1").await;
    let event = refund("ord-1", "rf-1", 500);
    let now = Utc::now();

    let first = h.engine.evaluate_refund(&tenant, &order, &event, now).await.unwrap();
    assert!(matches!(first, ReceiptDecision::Deferred { attempts: 1, .. }));

    // Seeing the refund again before it is due costs no attempt.
    let again = h
        .engine
        .evaluate_refund(&tenant, &order, &event, now + Duration::seconds(10))
        .await
        .unwrap();
    assert!(matches!(again, ReceiptDecision::Deferred { attempts: 1, .. }));

    let pass = h
        .engine
        .process_pending_refunds(TENANT, now + Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(pass.due, 1);
    assert_eq!(pass.deferred, 1);
    let record = h
        .store
        .get_refund_event(TENANT, "ord-1", "rf-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.attempts, 2);
    assert_eq!(record.status, RefundEventStatus::Pending);

    let sale = h.engine.evaluate_sale(&tenant, &order, now).await.unwrap();
    let sale_id = sale.receipt().unwrap().id;

    let pass = h
        .engine
        .process_pending_refunds(TENANT, now + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(pass.issued, 1);

    let refunds: Vec<_> = h
        .store
        .receipts(TENANT)
        .into_iter()
        .filter(|r| r.receipt_type == ReceiptType::Refund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].reference_receipt_id, Some(sale_id));
    assert_eq!(refunds[0].refund_amount, Some(Decimal::new(-500, 2)));
    assert_eq!(refunds[0].issued_at, event.refunded_at);

    let record = h
        .store
        .get_refund_event(TENANT, "ord-1", "rf-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RefundEventStatus::Issued);
    assert_eq!(record.receipt_id, Some(refunds[0].id));

    let pass = h
        .engine
        .process_pending_refunds(TENANT, now + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(pass.due, 0);
}

#[tokio::test]
async fn exhausted_refund_is_marked_failed() {
    let h = Harness::with_retry_policy(
        fiscal_settings(),
        RetryPolicy {
            max_attempts: 2,
            backoff_base_secs: 60,
        },
    );
    let (tenant, order) = stored_order(&h, "ord-1").await;
    let event = refund("ord-1", "rf-1", 500);
    let now = Utc::now();

    h.engine.evaluate_refund(&tenant, &order, &event, now).await.unwrap();
    let pass = h
        .engine
        .process_pending_refunds(TENANT, now + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(pass.failed, 1);

    let record = h
        .store
        .get_refund_event(TENANT, "ord-1", "rf-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RefundEventStatus::Failed);
    assert!(record
        .failure_reason
        .as_deref()
        .unwrap()
        .ends_with("after 2 attempts"));

    let later = h
        .engine
        .evaluate_refund(&tenant, &order, &event, now + Duration::days(3))
        .await
        .unwrap();
    assert!(matches!(later, ReceiptDecision::Failed(_)));
}

#[tokio::test]
async fn refunds_never_exceed_the_sale() {
    let h = Harness::new(fiscal_settings());
    let (tenant, order) = stored_order(&h, "ord-1").await;
    let now = Utc::now();
    h.engine.evaluate_sale(&tenant, &order, now).await.unwrap();

    for (key, cents) in [("rf-1", 1500), ("rf-2", 2500)] {
        let decision = h
            .engine
            .evaluate_refund(&tenant, &order, &refund("ord-1", key, cents), now)
            .await
            .unwrap();
        assert!(decision.is_issued(), "{key}: {decision:?}");
    }

    let over = h
        .engine
        .evaluate_refund(&tenant, &order, &refund("ord-1", "rf-3", 1), now)
        .await
        .unwrap();
    let ReceiptDecision::Failed(reason) = over else {
        panic!("unexpected decision: {over:?}");
    };
    assert!(reason.starts_with("refund of 0.01 exceeds"), "{reason}");
    let record = h
        .store
        .get_refund_event(TENANT, "ord-1", "rf-3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RefundEventStatus::Failed);
    assert_eq!(h.store.receipts(TENANT).len(), 3);
}

#[tokio::test]
async fn refund_of_unknown_tenant_pass_is_not_found() {
    let h = Harness::new(fiscal_settings());
    let err = h
        .engine
        .process_pending_refunds("site-unknown", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

// -----------------------------------------------------------------------
// Voiding and return payment type
// -----------------------------------------------------------------------

async fn sale_with_refunds(h: &Harness) -> (i64, Vec<i64>) {
    let (tenant, order) = stored_order(h, "ord-1").await;
    let now = Utc::now();
    let sale = h.engine.evaluate_sale(&tenant, &order, now).await.unwrap();
    let mut refund_ids = Vec::new();
    for (key, cents) in [("rf-1", 500), ("rf-2", 250)] {
        let decision = h
            .engine
            .evaluate_refund(&tenant, &order, &refund("ord-1", key, cents), now)
            .await
            .unwrap();
        refund_ids.push(decision.receipt().unwrap().id);
    }
    (sale.receipt().unwrap().id, refund_ids)
}

#[tokio::test]
async fn voiding_sale_removes_its_refunds() {
    let h = Harness::new(fiscal_settings());
    let (sale_id, refund_ids) = sale_with_refunds(&h).await;

    let mut deleted = h.engine.void_receipt(TENANT, sale_id).await.unwrap();
    deleted.sort_unstable();
    let mut expected = vec![sale_id];
    expected.extend(&refund_ids);
    expected.sort_unstable();

    assert_eq!(deleted, expected);
    assert!(h.store.receipts(TENANT).is_empty());
    let record = h
        .store
        .get_refund_event(TENANT, "ord-1", "rf-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RefundEventStatus::Issued);
    assert_eq!(record.receipt_id, None);

    let err = h.engine.void_receipt(TENANT, sale_id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
async fn voiding_refund_keeps_the_sale() {
    let h = Harness::new(fiscal_settings());
    let (sale_id, refund_ids) = sale_with_refunds(&h).await;

    let deleted = h.engine.void_receipt(TENANT, refund_ids[0]).await.unwrap();

    assert_eq!(deleted, vec![refund_ids[0]]);
    let remaining: Vec<i64> = h.store.receipts(TENANT).iter().map(|r| r.id).collect();
    assert!(remaining.contains(&sale_id));
    assert!(remaining.contains(&refund_ids[1]));
}

#[tokio::test]
async fn return_payment_type_applies_to_refunds_only() {
    let h = Harness::new(fiscal_settings());
    let (sale_id, refund_ids) = sale_with_refunds(&h).await;

    let updated = h
        .engine
        .set_return_payment_type(TENANT, refund_ids[0], 2)
        .await
        .unwrap();
    assert_eq!(
        updated.return_payment_type,
        ReturnPaymentType::from_code(2)
    );

    let err = h
        .engine
        .set_return_payment_type(TENANT, sale_id, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidReceipt(_)));

    let err = h
        .engine
        .set_return_payment_type(TENANT, refund_ids[0], 9)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidReceipt(_)));

    let err = h
        .engine
        .set_return_payment_type(TENANT, 9_999, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}
