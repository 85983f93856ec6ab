use chrono::Utc;
use matflow::db::{IndexOptions, VaspTaskStore, BANDSTRUCTURE_FS};
use matflow::model::{BandStructure, Calc, TaskOutput, TaskRecord};
use matflow::storage::{DocumentStore, SqliteStore};
use matflow::MatflowError;
use std::sync::Arc;

type TestResult = Result<(), Box<dyn std::error::Error>>;

async fn sqlite_task_store() -> Result<(VaspTaskStore, Arc<SqliteStore>), Box<dyn std::error::Error>>
{
    let store = Arc::new(SqliteStore::new("sqlite::memory:").await?);
    Ok((VaspTaskStore::new(store.clone()), store))
}

fn record(task_id: u64, calc: Option<Calc>) -> TaskRecord {
    TaskRecord {
        task_id,
        formula_pretty: "Si".to_string(),
        formula_anonymous: "A".to_string(),
        output: TaskOutput {
            energy: -10.85,
            energy_per_atom: -5.425,
        },
        completed_at: Utc::now(),
        calcs_reversed: calc.into_iter().collect(),
    }
}

#[tokio::test]
async fn band_structure_survives_sqlite_round_trip() -> TestResult {
    let (db, _) = sqlite_task_store().await?;
    db.build_indexes(IndexOptions::default()).await?;

    let bs = BandStructure {
        efermi: 5.61,
        kpoints: vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [0.5, 0.0, 0.5]],
        bands: vec![vec![-5.0, -4.1, -3.3], vec![1.2, 2.8, 3.1]],
    };
    let bytes = serde_json::to_vec(&bs)?;

    let (fs_id, compression) = db.insert_blob(&bytes, BANDSTRUCTURE_FS, true).await?;
    db.insert_task(&record(
        1,
        Some(Calc {
            bandstructure_fs_id: Some(fs_id),
            bandstructure_compression: compression,
        }),
    ))
    .await?;

    assert_eq!(db.band_structure(1).await?, bs);
    Ok(())
}

#[tokio::test]
async fn unique_task_id_enforced_by_sqlite_index() -> TestResult {
    let (db, _) = sqlite_task_store().await?;
    db.build_indexes(IndexOptions::default()).await?;

    db.insert_task(&record(3, None)).await?;
    let err = db.insert_task(&record(3, None)).await;
    assert!(matches!(err, Err(MatflowError::Storage(_))));
    Ok(())
}

#[tokio::test]
async fn missing_reference_is_not_found_not_empty() -> TestResult {
    let (db, _) = sqlite_task_store().await?;
    db.insert_task(&record(4, Some(Calc::default()))).await?;

    let err = db.band_structure(4).await;
    assert!(matches!(err, Err(MatflowError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn reset_rebuilds_schema_from_scratch() -> TestResult {
    let (db, store) = sqlite_task_store().await?;
    db.build_indexes(IndexOptions::default()).await?;
    db.insert_task(&record(5, None)).await?;
    let (fs_id, _) = db.insert_blob(b"stale blob", BANDSTRUCTURE_FS, true).await?;

    db.reset().await?;

    assert!(matches!(
        db.get_task(5).await,
        Err(MatflowError::NotFound(_))
    ));
    assert!(matches!(
        store.get_blob(BANDSTRUCTURE_FS, fs_id).await,
        Err(MatflowError::NotFound(_))
    ));

    let counter = store
        .find_one("counter", "_id", &serde_json::json!("taskid"))
        .await?
        .expect("counter document recreated");
    assert_eq!(counter["c"], 0);

    let indexes = store.list_indexes("tasks").await?;
    assert!(indexes.contains(&"task_id_1".to_string()));
    assert!(indexes
        .contains(&"formula_pretty_1_output.energy_-1_completed_at_-1".to_string()));

    // The schema is usable immediately after a reset.
    db.insert_task(&record(5, None)).await?;
    Ok(())
}

#[tokio::test]
async fn custom_index_fields_replace_the_default_set() -> TestResult {
    let (db, store) = sqlite_task_store().await?;
    db.build_indexes(IndexOptions {
        fields: Some(vec!["completed_at".to_string()]),
        background: false,
    })
    .await?;

    let indexes = store.list_indexes("tasks").await?;
    assert!(indexes.contains(&"task_id_1".to_string()));
    assert!(indexes.contains(&"completed_at_1".to_string()));
    assert!(!indexes.contains(&"formula_pretty_1".to_string()));
    Ok(())
}
