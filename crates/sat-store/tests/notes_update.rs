use sat_record::HierarchyRow;
use sat_store::notes::{write_notes, TitleGraph};
use sat_test_utils::{evidence_tree, DataDir};

#[tokio::test]
async fn notes_from_tree_are_created_then_left_alone() {
    let data = DataDir::new();
    let graph = TitleGraph::from_rows(&evidence_tree().rows());

    let first = write_notes(&data.join("vault"), &graph).await.unwrap();
    assert_eq!(first.len(), 4);
    assert!(first.iter().all(|u| u.created));

    let note = data.read("vault/USB activity.md");
    assert_eq!(
        note,
        "# USB activity\n\n## Parents\n- [[Hypothesis: insider leak]]\n\n## Children\n\n\
         ## Description and source\n- **Description:** Copy at 02:14\n  **Source:** DLP log\n"
    );

    let snapshot: Vec<String> = first
        .iter()
        .map(|u| std::fs::read_to_string(&u.path).unwrap())
        .collect();
    let second = write_notes(&data.join("vault"), &graph).await.unwrap();
    assert!(second.iter().all(|u| !u.created && u.appended_lines == 0));
    let after: Vec<String> = second
        .iter()
        .map(|u| std::fs::read_to_string(&u.path).unwrap())
        .collect();
    assert_eq!(snapshot, after);
}

#[tokio::test]
async fn manual_edits_survive_updates() {
    let data = DataDir::new();
    data.write(
        "vault/Insider.md",
        "# Insider\n\nMy own analysis.\n\n## Children\n- [[Exfil]]\n",
    );

    let rows = vec![
        HierarchyRow {
            parts: vec!["Threat".into(), "Insider".into(), "Exfil".into()],
            ..HierarchyRow::default()
        },
        HierarchyRow {
            parts: vec!["Threat".into(), "Insider".into(), "Sabotage".into()],
            ..HierarchyRow::default()
        },
    ];
    write_notes(&data.join("vault"), &TitleGraph::from_rows(&rows)).await.unwrap();

    assert_eq!(
        data.read("vault/Insider.md"),
        "# Insider\n\nMy own analysis.\n\n## Children\n- [[Exfil]]\n- [[Sabotage]]\n\n## Parents\n- [[Threat]]\n"
    );
}
