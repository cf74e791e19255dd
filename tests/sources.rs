mod common;

use common::{find_line, ns, temp_file};
use index_advisor::{
    AdvisorConfig, Field, Index, LogFileSource, OfflineCatalog, OperationSource, Processor,
    ProfileSource,
};

const CATALOG: &str = r#"{
    "shop.orders": {
        "indexes": [
            { "v": 2, "key": { "_id": 1 }, "name": "_id_" },
            { "v": 2, "key": { "status": 1 }, "name": "status_1" }
        ]
    }
}"#;

#[test]
fn test_log_file_through_processor() {
    let lines = [
        find_line("shop.orders", r#"{ status: "open", region: "eu" }"#, 12),
        find_line("shop.orders", r#"{ status: "closed", region: "us" }"#, 3),
        "2024-05-06T12:00:00.000+0000 I  COMMAND  [conn1] command shop.orders command: find { find: \"orders\", filter: { status: } } 1ms".to_string(),
        find_line("crm.leads", r#"{ owner: ObjectId("5f1d7a2b3c4d5e6f70819203") }"#, 1),
    ];
    let log = temp_file(&lines.iter().map(String::as_str).collect::<Vec<_>>());
    let catalog_file = temp_file(&[CATALOG]);
    let catalog = OfflineCatalog::from_file(catalog_file.path()).unwrap();

    let config = AdvisorConfig {
        namespaces: vec!["shop.*".to_string()],
        ..AdvisorConfig::default()
    };
    let mut processor = Processor::new(config.clone());
    let mut source = LogFileSource::new(log.path());
    source
        .for_each(&config.namespaces, &mut |op| {
            processor.add(&op, &catalog).map(|_| ())
        })
        .unwrap();

    let stats = source.stats();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.filtered, 1);

    let results = processor.done(&catalog).unwrap();
    assert!(results.db("crm").is_none());
    let orders = results.collection(&ns("shop.orders")).unwrap();
    assert_eq!(orders.candidate_count, 2);
    assert_eq!(
        orders.indexes,
        vec![
            Index::compound(vec![Field::unknown("status"), Field::unknown("region")]),
            Index::id(),
        ]
    );
    assert_eq!(
        orders.indexes_to_drop().cloned().collect::<Vec<_>>(),
        vec![Index::single_field(Field::ascending("status"))]
    );
    let shape = &orders.statistics[0];
    assert_eq!(shape.count, 2);
    assert_eq!(shape.total_millis, 15);
}

#[test]
fn test_profile_export_through_processor() {
    let profile = temp_file(&[
        r#"{"op": "command", "ns": "shop.orders", "command": {"aggregate": "orders", "pipeline": [{"$match": {"sku": "x"}}, {"$lookup": {"from": "items", "localField": "sku", "foreignField": "sku", "as": "item"}}]}, "millis": 9, "ts": {"$date": "2024-05-06T12:00:00Z"}}"#,
        r#"{"op": "command", "ns": "shop.orders", "command": {"count": "orders", "query": {"sku": "x"}}, "millis": 1}"#,
        r#"{"op": "query", "ns": "shop.orders", "command": {"find": "orders", "filter": {"sku": "y"}}, "errName": "QueryExceededMemoryLimit", "errCode": 292}"#,
        r#"{"op": "query", "command": {"find": "orders"}}"#,
    ]);
    let catalog = OfflineCatalog::new();
    let mut processor = Processor::new(AdvisorConfig::default());
    let mut source = ProfileSource::new(profile.path());
    source
        .for_each(&[], &mut |op| processor.add(&op, &catalog).map(|_| ()))
        .unwrap();
    assert_eq!(source.stats().delivered, 3);
    assert_eq!(source.stats().skipped, 1);

    let results = processor.done(&catalog).unwrap();
    let orders = results.collection(&ns("shop.orders")).unwrap();
    assert_eq!(orders.indexes[0], Index::single_field(Field::unknown("sku")));
    assert_eq!(orders.not_implemented.get("count"), Some(&1));
    assert_eq!(orders.failed_operations.len(), 1);
    assert_eq!(orders.failed_operations[0].error_code, 292);

    let items = results.collection(&ns("shop.items")).unwrap();
    assert_eq!(items.indexes[0], Index::single_field(Field::unknown("sku")));
}
