//! Contract Test: Dev→Prod Mirror
//!
//! Constraints verified:
//! - Missing DEV records are created in PROD with whitelisted fields only
//! - The computed product name is matched on but never written
//! - A second run matches by natural key and never re-creates
//! - Every matched record is updated on every run
//! - Record ids, formulas and links never cross environments
//!
//! If this test fails, PROD can gain duplicates or foreign ids.

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use serde_json::Value;
use tunesync_core::{DevProdMirror, Fields, MirrorConfig, RecordStore, StoreConfig, Table};

/// "Full Name" as the base computes it: name, then detail when present
fn full_name(fields: &Fields) -> Option<Value> {
    let name = fields.get("name")?.as_str()?;
    let full = match fields.get("detail").and_then(Value::as_str) {
        Some(detail) if !detail.is_empty() => format!("{name}, {detail}"),
        _ => name.to_string(),
    };
    Some(Value::from(full))
}

/// A PROD base that derives product names itself
fn prod_base() -> CountingStore {
    CountingStore::new().with_formula(Table::Product, "fullName", full_name)
}

fn mirror(dev: &CountingStore, prod: &CountingStore) -> DevProdMirror {
    DevProdMirror::new(
        Arc::new(dev.clone()),
        Arc::new(prod.clone()),
        &MirrorConfig::new(StoreConfig::Memory, StoreConfig::Memory),
    )
    .unwrap()
}

async fn seed_apple(dev: &CountingStore) {
    dev.inner
        .create(
            Table::Product,
            fields(json!({
                "fullName": "Apple",
                "name": "Apple",
                "category": "Produce",
                "customerCost": 0.5,
                "id": 17,
                "primaryKey": "Apple-17",
                "storeIds": ["recDevStore1"],
            })),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_product_is_created_with_whitelisted_fields() {
    let dev = CountingStore::new();
    let prod = prod_base();
    seed_apple(&dev).await;

    let response = mirror(&dev, &prod).mirror_dev_to_prod().await;
    assert!(response.is_success(), "{:?}", response.error);
    let report = response.data.unwrap();

    let payloads = prod.create_payloads(Table::Product);
    assert_eq!(payloads.len(), 1);
    assert_eq!(
        Value::Object(payloads[0].clone()),
        json!({
            "name": "Apple",
            "category": "Produce",
            "customerCost": 0.5,
        })
    );
    assert!(!payloads[0].contains_key("fullName"));

    let products = prod.records(Table::Product).await;
    assert_eq!(products.len(), 1);
    let apple = &products[0];
    assert_eq!(report.new_ids, vec![apple.id.clone()]);
    assert_eq!(apple.text("fullName"), Some("Apple"));
}

#[tokio::test]
async fn computed_name_is_never_sent_in_updates() {
    let dev = CountingStore::new();
    let prod = prod_base();
    dev.inner
        .create(
            Table::Product,
            fields(json!({"fullName": "Milk, 1 gallon", "name": "Milk", "detail": "1 gallon"})),
        )
        .await
        .unwrap();
    let mirror = mirror(&dev, &prod);

    mirror.run().await.unwrap();
    let second = mirror.run().await.unwrap();

    assert!(second.new_ids.is_empty());
    assert_eq!(prod.create_count(), 1);
    let products = prod.records(Table::Product).await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].text("fullName"), Some("Milk, 1 gallon"));
    assert_eq!(
        second.table(Table::Product).unwrap().updated_names,
        vec!["Milk, 1 gallon".to_string()]
    );
}

#[tokio::test]
async fn second_run_updates_without_recreating() {
    let dev = CountingStore::new();
    let prod = prod_base();
    seed_apple(&dev).await;
    let mirror = mirror(&dev, &prod);

    let first = mirror.run().await.unwrap();
    assert_eq!(first.new_ids.len(), 1);
    // records created this run are updated by the same run
    assert_eq!(first.updated_product_ids, first.new_ids);

    let dev_apple = dev.records(Table::Product).await.remove(0);
    dev.inner
        .update(Table::Product, &dev_apple.id, fields(json!({"customerCost": 0.75})))
        .await
        .unwrap();
    let creates_before = prod.create_count();

    let second = mirror.run().await.unwrap();
    assert!(second.new_ids.is_empty());
    assert_eq!(second.updated_product_ids, first.new_ids);
    assert_eq!(prod.create_count(), creates_before);

    let products = prod.records(Table::Product).await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].fields["customerCost"], json!(0.75));
    assert_eq!(
        second.table(Table::Product).unwrap().updated_names,
        vec!["Apple".to_string()]
    );
}

#[tokio::test]
async fn unchanged_records_are_still_updated() {
    let dev = CountingStore::new();
    let prod = prod_base();
    seed_apple(&dev).await;
    let mirror = mirror(&dev, &prod);

    mirror.run().await.unwrap();
    let updates_after_first = prod.update_count();
    mirror.run().await.unwrap();

    assert_eq!(prod.update_count(), updates_after_first * 2);
}

#[tokio::test]
async fn stores_are_matched_by_name_not_id() {
    let dev = CountingStore::new();
    let prod = prod_base();
    dev.inner
        .create(
            Table::Store,
            fields(json!({
                "storeName": "Corner Market",
                "ward": "4",
                "wic": true,
                "productIds": ["recDevProduct"],
                "clerkIds": ["recDevClerk"],
            })),
        )
        .await
        .unwrap();
    // PROD already has the store under its own id, with stale values and links
    let prod_id = prod
        .inner
        .create(
            Table::Store,
            fields(json!({
                "storeName": "Corner Market",
                "ward": "3",
                "productIds": ["recProdProduct"],
            })),
        )
        .await
        .unwrap();

    let report = mirror(&dev, &prod).run().await.unwrap();

    assert!(report.new_ids.is_empty());
    assert_eq!(report.updated_store_ids, vec![prod_id.clone()]);
    let store = prod.inner.get(Table::Store, &prod_id).await.unwrap();
    assert_eq!(store.text("ward"), Some("4"));
    assert_eq!(store.fields["wic"], json!(true));
    assert_eq!(store.fields["productIds"], json!(["recProdProduct"]));
    assert!(!store.has("clerkIds"));
}

#[tokio::test]
async fn duplicate_prod_keys_abort_the_run() {
    let dev = CountingStore::new();
    let prod = prod_base();
    seed_apple(&dev).await;
    for _ in 0..2 {
        prod.inner
            .create(Table::Product, fields(json!({"fullName": "Apple"})))
            .await
            .unwrap();
    }

    let response = mirror(&dev, &prod).mirror_dev_to_prod().await;

    assert!(!response.is_success());
    assert!(response.error.unwrap().contains("Database malformed"));
    assert_eq!(prod.create_count(), 0);
    assert_eq!(prod.update_count(), 0);
}

#[tokio::test]
async fn report_serializes_with_camel_case_keys() {
    let dev = CountingStore::new();
    let prod = prod_base();
    seed_apple(&dev).await;

    let response = mirror(&dev, &prod).mirror_dev_to_prod().await;
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["success"], json!(true));
    assert_eq!(value["newIds"].as_array().unwrap().len(), 1);
    assert_eq!(value["updatedProductIds"], value["newIds"]);
    assert_eq!(value["updatedStoreIds"], json!([]));
}
