//! Workout aggregate: a workout row plus its ordered entry rows.
//!
//! Every write that touches more than one row runs in a single transaction.
//! A `sqlx::Transaction` that is dropped without `commit` rolls back, so an
//! early `?` return or a cancelled request future never leaves a partial
//! aggregate behind.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::info;

use crate::db::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Workout {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_minutes: i32,
    #[serde(default)]
    pub calories_burned: i32,
    /// Sorted by `order_index` ascending once loaded
    #[sqlx(skip)]
    #[serde(default)]
    pub entries: Vec<WorkoutEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkoutEntry {
    #[serde(default)]
    pub id: i64,
    pub exercise_name: String,
    pub sets: i32,
    pub reps: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub weight: Option<f64>,
    #[serde(default)]
    pub notes: String,
    /// Sort key only; values need not be contiguous
    pub order_index: i32,
}

async fn insert_entry(
    conn: &mut SqliteConnection,
    workout_id: i64,
    entry: &WorkoutEntry,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO workout_entries
            (workout_id, exercise_name, sets, reps, duration_seconds, weight, notes, order_index)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(workout_id)
    .bind(&entry.exercise_name)
    .bind(entry.sets)
    .bind(entry.reps)
    .bind(entry.duration_seconds)
    .bind(entry.weight)
    .bind(&entry.notes)
    .bind(entry.order_index)
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn load_entries(
    conn: &mut SqliteConnection,
    workout_id: i64,
) -> Result<Vec<WorkoutEntry>, sqlx::Error> {
    sqlx::query_as::<_, WorkoutEntry>(
        r#"
        SELECT id, exercise_name, sets, reps, duration_seconds, weight, notes, order_index
        FROM workout_entries
        WHERE workout_id = ?
        ORDER BY order_index ASC, id ASC
        "#,
    )
    .bind(workout_id)
    .fetch_all(conn)
    .await
}

#[derive(FromRow)]
struct EntryRow {
    workout_id: i64,
    #[sqlx(flatten)]
    entry: WorkoutEntry,
}

impl Workout {
    /// Insert the workout and all of its entries atomically.
    ///
    /// Returns the aggregate with generated ids filled in and entries sorted
    /// the same way a later read returns them.
    pub async fn create(db: &SqlitePool, workout: &Workout) -> Result<Workout, StoreError> {
        let mut tx = db.begin().await?;

        let workout_id = sqlx::query(
            r#"
            INSERT INTO workouts (title, description, duration_minutes, calories_burned)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&workout.title)
        .bind(&workout.description)
        .bind(workout.duration_minutes)
        .bind(workout.calories_burned)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut created = workout.clone();
        created.id = workout_id;
        for entry in created.entries.iter_mut() {
            let entry_id = insert_entry(&mut *tx, workout_id, entry).await?;
            entry.id = entry_id;
        }

        tx.commit().await?;

        created.entries.sort_by_key(|e| e.order_index);
        info!(workout_id, entries = created.entries.len(), "Created workout");
        Ok(created)
    }

    /// `Ok(None)` when no workout has this id.
    ///
    /// The parent and its entries are read inside one transaction so a
    /// concurrent write cannot be seen half applied.
    pub async fn get_by_id(db: &SqlitePool, id: i64) -> Result<Option<Workout>, StoreError> {
        let mut tx = db.begin().await?;

        let workout = sqlx::query_as::<_, Workout>(
            r#"
            SELECT id, title, description, duration_minutes, calories_burned
            FROM workouts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut workout) = workout else {
            return Ok(None);
        };

        workout.entries = load_entries(&mut *tx, workout.id).await?;
        tx.commit().await?;
        Ok(Some(workout))
    }

    /// Update the workout's fields and each listed entry in one transaction.
    ///
    /// Only the entries listed are rewritten; entries left out are kept as
    /// they are and no entry is added or removed. Entries are matched by
    /// `(entry id, workout id)`. An entry that matches no row, including a
    /// new entry with id 0, fails the whole update with `EntryNotFound`, so
    /// an update can never silently skip an entry or reach into another
    /// workout.
    pub async fn update(db: &SqlitePool, workout: &Workout) -> Result<(), StoreError> {
        let mut tx = db.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE workouts
            SET title = ?, description = ?, duration_minutes = ?, calories_burned = ?
            WHERE id = ?
            "#,
        )
        .bind(&workout.title)
        .bind(&workout.description)
        .bind(workout.duration_minutes)
        .bind(workout.calories_burned)
        .bind(workout.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        for entry in &workout.entries {
            let result = sqlx::query(
                r#"
                UPDATE workout_entries
                SET exercise_name = ?, sets = ?, reps = ?, duration_seconds = ?,
                    weight = ?, notes = ?, order_index = ?
                WHERE id = ? AND workout_id = ?
                "#,
            )
            .bind(&entry.exercise_name)
            .bind(entry.sets)
            .bind(entry.reps)
            .bind(entry.duration_seconds)
            .bind(entry.weight)
            .bind(&entry.notes)
            .bind(entry.order_index)
            .bind(entry.id)
            .bind(workout.id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::EntryNotFound {
                    workout_id: workout.id,
                    entry_id: entry.id,
                });
            }
        }

        tx.commit().await?;

        info!(workout_id = workout.id, entries = workout.entries.len(), "Updated workout");
        Ok(())
    }

    /// Delete a workout and its entries.
    ///
    /// Entries are removed explicitly inside the same transaction; the
    /// foreign key cascade covers any other path that deletes a workout row.
    pub async fn delete(db: &SqlitePool, id: i64) -> Result<(), StoreError> {
        let mut tx = db.begin().await?;

        sqlx::query("DELETE FROM workout_entries WHERE workout_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM workouts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;

        info!(workout_id = id, "Deleted workout");
        Ok(())
    }

    /// Every workout ordered by id, with entries, read from one snapshot.
    pub async fn list_all(db: &SqlitePool) -> Result<Vec<Workout>, StoreError> {
        let mut tx = db.begin().await?;

        let mut workouts = sqlx::query_as::<_, Workout>(
            r#"
            SELECT id, title, description, duration_minutes, calories_burned
            FROM workouts
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT workout_id, id, exercise_name, sets, reps, duration_seconds, weight,
                   notes, order_index
            FROM workout_entries
            ORDER BY workout_id ASC, order_index ASC, id ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut by_workout: HashMap<i64, Vec<WorkoutEntry>> = HashMap::new();
        for row in rows {
            by_workout.entry(row.workout_id).or_default().push(row.entry);
        }
        for workout in workouts.iter_mut() {
            workout.entries = by_workout.remove(&workout.id).unwrap_or_default();
        }

        Ok(workouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    fn entry(name: &str, order_index: i32) -> WorkoutEntry {
        WorkoutEntry {
            id: 0,
            exercise_name: name.to_string(),
            sets: 3,
            reps: Some(10),
            duration_seconds: None,
            weight: None,
            notes: String::new(),
            order_index,
        }
    }

    fn workout(title: &str, entries: Vec<WorkoutEntry>) -> Workout {
        Workout {
            id: 0,
            title: title.to_string(),
            description: "upper body day".to_string(),
            duration_minutes: 60,
            calories_burned: 200,
            entries,
        }
    }

    async fn count(db: &SqlitePool, table: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(db)
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_create_push_day_roundtrip() {
        let db = init_in_memory().await.unwrap();

        let bench = WorkoutEntry {
            id: 0,
            exercise_name: "Bench Press".to_string(),
            sets: 3,
            reps: Some(10),
            duration_seconds: None,
            weight: Some(135.5),
            notes: "Warm up properly".to_string(),
            order_index: 1,
        };
        let created = Workout::create(&db, &workout("push day", vec![bench]))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert_eq!(created.entries.len(), 1);
        assert!(created.entries[0].id > 0);

        let fetched = Workout::get_by_id(&db, created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.title, "push day");
        assert_eq!(fetched.entries[0].reps, Some(10));
        assert_eq!(fetched.entries[0].weight, Some(135.5));
        assert_eq!(fetched.entries[0].duration_seconds, None);
    }

    #[tokio::test]
    async fn test_entries_come_back_sorted() {
        let db = init_in_memory().await.unwrap();
        let created = Workout::create(
            &db,
            &workout("legs", vec![entry("c", 3), entry("a", 1), entry("b", 2)]),
        )
        .await
        .unwrap();

        let fetched = Workout::get_by_id(&db, created.id).await.unwrap().unwrap();
        let order: Vec<i32> = fetched.entries.iter().map(|e| e.order_index).collect();
        assert_eq!(order, vec![1, 2, 3]);
        let names: Vec<&str> = fetched.entries.iter().map(|e| e.exercise_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_sparse_order_index_is_just_a_sort_key() {
        let db = init_in_memory().await.unwrap();
        let created = Workout::create(
            &db,
            &workout("sparse", vec![entry("late", 100), entry("early", -5)]),
        )
        .await
        .unwrap();

        let fetched = Workout::get_by_id(&db, created.id).await.unwrap().unwrap();
        let order: Vec<i32> = fetched.entries.iter().map(|e| e.order_index).collect();
        assert_eq!(order, vec![-5, 100]);
    }

    #[tokio::test]
    async fn test_optional_fields_independently_absent() {
        let db = init_in_memory().await.unwrap();
        let bare = WorkoutEntry {
            reps: None,
            ..entry("plank", 1)
        };
        let created = Workout::create(&db, &workout("core", vec![bare]))
            .await
            .unwrap();

        let fetched = Workout::get_by_id(&db, created.id).await.unwrap().unwrap();
        let e = &fetched.entries[0];
        assert_eq!((e.reps, e.duration_seconds, e.weight), (None, None, None));
    }

    #[tokio::test]
    async fn test_failed_entry_insert_discards_aggregate() {
        let db = init_in_memory().await.unwrap();
        sqlx::query(
            r#"
            CREATE TRIGGER reject_entry BEFORE INSERT ON workout_entries
            WHEN NEW.exercise_name = 'explode'
            BEGIN SELECT RAISE(ABORT, 'rejected entry'); END
            "#,
        )
        .execute(&db)
        .await
        .unwrap();

        let result = Workout::create(
            &db,
            &workout("doomed", vec![entry("squat", 1), entry("explode", 2)]),
        )
        .await;
        assert!(matches!(result, Err(StoreError::Database(_))));

        assert_eq!(count(&db, "workouts").await, 0);
        assert_eq!(count(&db, "workout_entries").await, 0);
        assert!(Workout::list_all(&db).await.unwrap().is_empty());
        assert!(Workout::get_by_id(&db, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_create_leaves_no_partial_aggregate() {
        let db = init_in_memory().await.unwrap();
        let entries: Vec<WorkoutEntry> = (0..200).map(|i| entry("row", i)).collect();
        let big = workout("cancelled", entries);

        // Abort the create after increasingly long delays so the future is
        // dropped at many different points inside the transaction
        for attempt in 0..20u64 {
            let db_task = db.clone();
            let w = big.clone();
            let handle = tokio::spawn(async move { Workout::create(&db_task, &w).await });
            tokio::time::sleep(std::time::Duration::from_micros(attempt * 250)).await;
            handle.abort();
            let _ = handle.await;

            let workouts = count(&db, "workouts").await;
            let entries = count(&db, "workout_entries").await;
            assert_eq!(entries, workouts * 200, "partial aggregate after attempt {}", attempt);
        }

        // A transaction dropped after the parent insert rolls the parent back
        {
            let mut tx = db.begin().await.unwrap();
            sqlx::query("INSERT INTO workouts (title) VALUES ('abandoned')")
                .execute(&mut *tx)
                .await
                .unwrap();
        }
        let (abandoned,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workouts WHERE title = 'abandoned'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(abandoned, 0);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let db = init_in_memory().await.unwrap();
        assert!(Workout::get_by_id(&db, 12345).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_fields_and_entries() {
        let db = init_in_memory().await.unwrap();
        let mut created = Workout::create(&db, &workout("push", vec![entry("a", 1), entry("b", 2)]))
            .await
            .unwrap();

        created.title = "push (heavy)".to_string();
        created.calories_burned = 450;
        created.entries[0].order_index = 5;
        created.entries[0].weight = Some(200.0);
        created.entries[1].reps = None;

        Workout::update(&db, &created).await.unwrap();

        let fetched = Workout::get_by_id(&db, created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "push (heavy)");
        assert_eq!(fetched.calories_burned, 450);
        let names: Vec<&str> = fetched.entries.iter().map(|e| e.exercise_name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(fetched.entries[0].reps, None);
        assert_eq!(fetched.entries[1].weight, Some(200.0));
    }

    #[tokio::test]
    async fn test_update_missing_workout_is_not_found() {
        let db = init_in_memory().await.unwrap();
        let existing = Workout::create(&db, &workout("keep me", vec![entry("a", 1)]))
            .await
            .unwrap();

        let mut ghost = existing.clone();
        ghost.id = existing.id + 100;
        ghost.title = "ghost".to_string();

        let result = Workout::update(&db, &ghost).await;
        assert!(matches!(result, Err(StoreError::NotFound)));

        let fetched = Workout::get_by_id(&db, existing.id).await.unwrap().unwrap();
        assert_eq!(fetched, existing);
        assert_eq!(count(&db, "workouts").await, 1);
    }

    #[tokio::test]
    async fn test_update_with_foreign_entry_rolls_back() {
        let db = init_in_memory().await.unwrap();
        let mine = Workout::create(&db, &workout("mine", vec![entry("a", 1)]))
            .await
            .unwrap();
        let theirs = Workout::create(&db, &workout("theirs", vec![entry("x", 1)]))
            .await
            .unwrap();

        let mut edited = mine.clone();
        edited.title = "renamed".to_string();
        let mut stolen = theirs.entries[0].clone();
        stolen.exercise_name = "hijacked".to_string();
        edited.entries.push(stolen.clone());

        let result = Workout::update(&db, &edited).await;
        assert!(matches!(
            result,
            Err(StoreError::EntryNotFound { workout_id, entry_id })
                if workout_id == mine.id && entry_id == stolen.id
        ));

        // Nothing from the failed transaction is visible
        assert_eq!(Workout::get_by_id(&db, mine.id).await.unwrap().unwrap(), mine);
        assert_eq!(
            Workout::get_by_id(&db, theirs.id).await.unwrap().unwrap(),
            theirs
        );
    }

    #[tokio::test]
    async fn test_delete_removes_entries() {
        let db = init_in_memory().await.unwrap();
        let doomed = Workout::create(&db, &workout("doomed", vec![entry("a", 1), entry("b", 2)]))
            .await
            .unwrap();
        let kept = Workout::create(&db, &workout("kept", vec![entry("c", 1)]))
            .await
            .unwrap();

        Workout::delete(&db, doomed.id).await.unwrap();

        assert!(Workout::get_by_id(&db, doomed.id).await.unwrap().is_none());
        let (orphans,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workout_entries WHERE workout_id = ?")
                .bind(doomed.id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(orphans, 0);
        assert_eq!(Workout::get_by_id(&db, kept.id).await.unwrap().unwrap(), kept);
    }

    #[tokio::test]
    async fn test_cascade_covers_direct_parent_delete() {
        let db = init_in_memory().await.unwrap();
        let created = Workout::create(&db, &workout("direct", vec![entry("a", 1)]))
            .await
            .unwrap();

        sqlx::query("DELETE FROM workouts WHERE id = ?")
            .bind(created.id)
            .execute(&db)
            .await
            .unwrap();
        assert_eq!(count(&db, "workout_entries").await, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let db = init_in_memory().await.unwrap();
        assert!(matches!(
            Workout::delete(&db, 77).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_all() {
        let db = init_in_memory().await.unwrap();
        assert!(Workout::list_all(&db).await.unwrap().is_empty());

        Workout::create(&db, &workout("one", vec![entry("b", 2), entry("a", 1)]))
            .await
            .unwrap();
        Workout::create(&db, &workout("two", vec![]))
            .await
            .unwrap();
        Workout::create(&db, &workout("three", vec![entry("z", 1)]))
            .await
            .unwrap();

        let all = Workout::list_all(&db).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "one");
        let names: Vec<&str> = all[0].entries.iter().map(|e| e.exercise_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(all[1].entries.is_empty());
        assert_eq!(all[2].entries.len(), 1);
        assert_eq!(all[2].entries[0].exercise_name, "z");
    }

    #[test]
    fn test_deserialize_minimal_payload() {
        let parsed: Workout = serde_json::from_str(
            r#"{
                "title": "run",
                "entries": [{"exercise_name": "jog", "sets": 1, "order_index": 0}]
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.id, 0);
        assert_eq!(parsed.description, "");
        assert_eq!(parsed.entries[0].reps, None);
        assert_eq!(parsed.entries[0].notes, "");
    }
}
