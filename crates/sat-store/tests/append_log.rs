use sat_store::{refresh_document, JsonlLog, PLACEHOLDER};
use sat_test_utils::{indicator, DataDir};

#[tokio::test]
async fn appending_n_records_reads_back_n_lines_in_order() {
    let data = DataDir::new();
    let log = JsonlLog::new(data.join("indicators/indicators.jsonl"));

    for n in 0..25 {
        log.append(&indicator(n)).await.unwrap();
    }

    let text = data.read("indicators/indicators.jsonl");
    assert_eq!(text.lines().count(), 25);
    for line in text.lines() {
        serde_json::from_str::<serde_json::Value>(line).unwrap();
    }

    let scan = log.scan().await.unwrap();
    assert!(scan.skipped.is_empty());
    let ids: Vec<_> = scan.records.iter().map(|r| r.id.clone().unwrap()).collect();
    let expected: Vec<_> = (0..25).map(|n| format!("rec-{n}")).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn existing_lines_are_never_rewritten() {
    let data = DataDir::new();
    let path = data.write("log.jsonl", "{\"hand\":\"edited\"}\n");
    let log = JsonlLog::new(&path);

    log.append(&indicator(1)).await.unwrap();

    let text = data.read("log.jsonl");
    assert!(text.starts_with("{\"hand\":\"edited\"}\n"));
    assert_eq!(text.lines().count(), 2);
}

#[tokio::test]
async fn corrupt_line_does_not_hide_the_rest() {
    let data = DataDir::new();
    let log = JsonlLog::new(data.join("log.jsonl"));
    log.append(&indicator(1)).await.unwrap();
    std::fs::OpenOptions::new()
        .append(true)
        .open(log.path())
        .and_then(|mut f| std::io::Write::write_all(&mut f, b"{\"what\": [\"trunc\n"))
        .unwrap();
    log.append(&indicator(2)).await.unwrap();

    let scan = log.scan().await.unwrap();
    assert_eq!(scan.records.len(), 2);
    assert_eq!(scan.skipped.len(), 1);
    assert_eq!(scan.skipped[0].line_no, 2);
}

#[tokio::test]
async fn invalid_utf8_line_does_not_hide_the_rest() {
    let data = DataDir::new();
    let log = JsonlLog::new(data.join("log.jsonl"));
    log.append(&serde_json::json!({"who": "a"})).await.unwrap();
    std::fs::OpenOptions::new()
        .append(true)
        .open(log.path())
        .and_then(|mut f| std::io::Write::write_all(&mut f, b"\xff\xfe garbage\n"))
        .unwrap();
    log.append(&serde_json::json!({"who": "b"})).await.unwrap();

    let scan = log.scan().await.unwrap();
    assert_eq!(scan.records.len(), 2);
    assert_eq!(scan.records[0].who, vec!["a"]);
    assert_eq!(scan.records[1].who, vec!["b"]);
    assert_eq!(scan.skipped.len(), 1);
    assert_eq!(scan.skipped[0].line_no, 2);
}

#[tokio::test]
async fn concurrent_appends_through_one_handle_stay_whole() {
    let data = DataDir::new();
    let log = JsonlLog::new(data.join("log.jsonl"));

    let tasks: Vec<_> = (0..40)
        .map(|n| {
            let log = log.clone();
            tokio::spawn(async move { log.append(&indicator(n)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let scan = log.scan().await.unwrap();
    assert_eq!(scan.records.len(), 40);
    assert!(scan.skipped.is_empty());
}

#[tokio::test]
async fn refresh_merges_log_into_document() {
    let data = DataDir::new();
    let log = JsonlLog::new(data.join("indicators.jsonl"));
    let doc = data.write("indicators.txt", "What?\n- shared\n\nAnalyst notes?\nkeep me\n");

    log.append(&indicator(1)).await.unwrap();
    log.append(&indicator(2)).await.unwrap();

    let (report, skipped) = refresh_document(&log, &doc).await.unwrap();
    assert!(skipped.is_empty());
    assert_eq!(report.added_count(), 5);

    assert_eq!(
        data.read("indicators.txt"),
        "What?\n- shared\n- event 1\n- event 2\n\n\
         Who?\n- actor 1\n- actor 2\n\n\
         Where?\n- harbour\n\n\
         Analyst notes?\nkeep me\n"
    );

    let (again, _) = refresh_document(&log, &doc).await.unwrap();
    assert_eq!(again.added_count(), 0);
}

#[tokio::test]
async fn refresh_of_empty_log_into_missing_document_writes_placeholder() {
    let data = DataDir::new();
    let log = JsonlLog::new(data.join("indicators.jsonl"));
    let doc = data.join("out/indicators.txt");

    refresh_document(&log, &doc).await.unwrap();

    assert_eq!(data.read("out/indicators.txt"), format!("{PLACEHOLDER}\n"));
}
