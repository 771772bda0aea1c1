//! Integration tests for schema reflection and the generated context text.

mod common;

use askdb::db::{ConnectionManager, SchemaInspector};
use askdb::models::ConnectionConfig;
use askdb::schema_context::SchemaExtractor;
use common::{SHOP_SCHEMA, sqlite_file};

async fn shop_extractor() -> (tempfile::TempDir, SchemaExtractor) {
    let dir = tempfile::tempdir().unwrap();
    let path = sqlite_file(&dir, "shop.db", SHOP_SCHEMA).await;

    let manager = ConnectionManager::default();
    manager
        .connect(ConnectionConfig::sqlite(path.to_string_lossy()))
        .await
        .unwrap();
    let active = manager.current().await.unwrap();
    let description = SchemaInspector::reflect(&active.pool).await.unwrap();
    manager.close().await;

    (dir, SchemaExtractor::new(description))
}

#[tokio::test]
async fn test_context_header_and_table_order() {
    let (_dir, extractor) = shop_extractor().await;
    let context = extractor.generate_rag_context();

    assert!(context.starts_with("Database Schema Description:\nThis database contains 3 tables.\n\n"));
    let notes = context.find("Table: notes").unwrap();
    let items = context.find("Table: order_items").unwrap();
    let orders = context.find("Table: orders").unwrap();
    assert!(notes < items && items < orders);
}

#[tokio::test]
async fn test_column_annotations() {
    let (_dir, extractor) = shop_extractor().await;
    let context = extractor.generate_rag_context();

    assert!(context.contains("- id (INTEGER) [Primary Key] [Required]\n- customer (TEXT)\n"));
    assert!(context.contains("- order_id (INTEGER) [References orders.id]\n"));
    assert!(context.contains("- qty (INTEGER) [Required]\n"));
}

#[tokio::test]
async fn test_table_without_constraints_has_no_headings() {
    let (_dir, extractor) = shop_extractor().await;
    let context = extractor.generate_rag_context();

    assert!(context.contains(
        "Table: notes\nColumns:\n- body (TEXT)\n- score (REAL)\n\nTable: order_items"
    ));
}

#[tokio::test]
async fn test_constraints_listed() {
    let (_dir, extractor) = shop_extractor().await;
    let context = extractor.generate_rag_context();

    assert!(context.contains(
        "\nConstraints:\n- PrimaryKeyConstraint on columns: id\n- ForeignKeyConstraint on columns: order_id\n"
    ));
    assert!(!context.contains("Indexes:"));
}

#[tokio::test]
async fn test_full_schema_document() {
    let (_dir, extractor) = shop_extractor().await;
    let doc = serde_json::to_value(extractor.extract_full_schema()).unwrap();

    assert_eq!(doc["metadata"]["number_of_tables"], 3);
    assert_eq!(doc["metadata"]["schema_version"], "1.0");

    let keys: Vec<&String> = doc["tables"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["notes", "order_items", "orders"]);

    let order_id = &doc["tables"]["order_items"]["columns"][1];
    assert_eq!(order_id["name"], "order_id");
    assert_eq!(order_id["foreign_key"]["references_table"], "orders");
    assert_eq!(order_id["foreign_key"]["references_column"], "id");

    let customer = &doc["tables"]["orders"]["columns"][1];
    assert!(customer.get("foreign_key").is_none());
    assert_eq!(customer["nullable"], true);
}
