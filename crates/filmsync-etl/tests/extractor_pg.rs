//! Extractor tests against a real PostgreSQL container
//!
//! These tests require Docker to be running. Run with:
//!
//! ```bash
//! cargo test --test extractor_pg -- --ignored --nocapture
//! ```

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{json, Value};
use sqlx::{Connection, PgConnection};
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

use filmsync_etl::extract::{Extract, PgExtractor};
use filmsync_etl::state::Watermark;

const SCHEMA_SQL: &str = r#"
CREATE SCHEMA content;

CREATE TABLE content.film_work (
    id uuid PRIMARY KEY,
    title text NOT NULL,
    description text,
    rating numeric(3, 1),
    type text NOT NULL,
    updated_at timestamp with time zone NOT NULL
);

CREATE TABLE content.genre (
    id uuid PRIMARY KEY,
    name text NOT NULL,
    description text,
    updated_at timestamp with time zone NOT NULL
);

CREATE TABLE content.person (
    id uuid PRIMARY KEY,
    full_name text NOT NULL,
    updated_at timestamp with time zone NOT NULL
);

CREATE TABLE content.genre_film_work (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    film_work_id uuid NOT NULL REFERENCES content.film_work (id),
    genre_id uuid NOT NULL REFERENCES content.genre (id)
);

CREATE TABLE content.person_film_work (
    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    film_work_id uuid NOT NULL REFERENCES content.film_work (id),
    person_id uuid NOT NULL REFERENCES content.person (id),
    role text NOT NULL
);
"#;

// Three movies, two genres, three people. "Orphan" has no children at
// all; Bob has no films and must never surface.
const SEED_SQL: &str = r#"
INSERT INTO content.genre (id, name, description, updated_at) VALUES
    ('22222222-2222-2222-2222-222222222201', 'Action', 'Explosions', '2024-01-01 00:00:00+00'),
    ('22222222-2222-2222-2222-222222222202', 'Drama', NULL, '2024-01-02 00:00:00+00');

INSERT INTO content.person (id, full_name, updated_at) VALUES
    ('33333333-3333-3333-3333-333333333301', 'Ann', '2024-01-01 00:00:00+00'),
    ('33333333-3333-3333-3333-333333333302', 'Stan', '2024-01-01 00:00:00+00'),
    ('33333333-3333-3333-3333-333333333303', 'Bob', '2024-01-03 00:00:00+00');

INSERT INTO content.film_work (id, title, description, rating, type, updated_at) VALUES
    ('11111111-1111-1111-1111-111111111101', 'The Star', 'New World', 8.5, 'movie', '2024-01-01 10:00:00+00'),
    ('11111111-1111-1111-1111-111111111102', 'Quiet Drama', NULL, 7.0, 'movie', '2024-01-02 10:00:00+00'),
    ('11111111-1111-1111-1111-111111111103', 'Orphan', NULL, NULL, 'tv_show', '2024-01-03 10:00:00+00');

INSERT INTO content.genre_film_work (film_work_id, genre_id) VALUES
    ('11111111-1111-1111-1111-111111111101', '22222222-2222-2222-2222-222222222201'),
    ('11111111-1111-1111-1111-111111111102', '22222222-2222-2222-2222-222222222202');

INSERT INTO content.person_film_work (film_work_id, person_id, role) VALUES
    ('11111111-1111-1111-1111-111111111101', '33333333-3333-3333-3333-333333333301', 'actor'),
    ('11111111-1111-1111-1111-111111111101', '33333333-3333-3333-3333-333333333302', 'director'),
    ('11111111-1111-1111-1111-111111111102', '33333333-3333-3333-3333-333333333301', 'actor');
"#;

/// Start a PostgreSQL container with the content schema seeded.
///
/// The container handle must stay alive for the duration of the test.
async fn seeded_postgres() -> (ContainerAsync<Postgres>, String) {
    let container = Postgres::default()
        .with_tag("16-alpine")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432.tcp())
        .await
        .expect("Failed to get port");
    let url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");

    let mut conn = PgConnection::connect(&url)
        .await
        .expect("Failed to connect for seeding");
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(&mut conn)
        .await
        .expect("Failed to create schema");
    sqlx::raw_sql(SEED_SQL)
        .execute(&mut conn)
        .await
        .expect("Failed to seed data");
    conn.close().await.expect("Failed to close seed connection");

    (container, url)
}

fn extractor_for(url: &str) -> PgExtractor {
    PgExtractor::new(url, Duration::from_secs(10))
}

fn watermark(value: &str) -> Watermark {
    Watermark::parse(value).expect("valid watermark literal")
}

fn doc_by_field<'a>(rows: &'a [Value], field: &str, value: &str) -> &'a Value {
    rows.iter()
        .find(|row| row[field] == value)
        .unwrap_or_else(|| panic!("no row with {field} = {value}"))
}

fn titles(rows: &[Value]) -> Vec<&str> {
    rows.iter()
        .map(|row| row["title"].as_str().expect("title is a string"))
        .collect()
}

async fn run_update(url: &str, sql: &str) {
    let mut conn = PgConnection::connect(url)
        .await
        .expect("Failed to connect for update");
    sqlx::raw_sql(sql)
        .execute(&mut conn)
        .await
        .expect("Failed to apply update");
    conn.close().await.expect("Failed to close update connection");
}

// ============================================================================
// Full load
// ============================================================================

#[tokio::test]
#[ignore = "requires Docker"]
async fn full_load_returns_every_entity() {
    let (_container, url) = seeded_postgres().await;
    let extractor = extractor_for(&url);

    let batch = extractor.extract(None).await.expect("full load succeeds");

    // Movies order by their own updated_at.
    assert_eq!(titles(&batch.movies), ["The Star", "Quiet Drama", "Orphan"]);

    let star = doc_by_field(&batch.movies, "title", "The Star");
    assert_eq!(star["rating"], 8.5);
    assert_eq!(star["type"], "movie");
    assert_eq!(star["genres"], json!(["Action"]));
    let credits: HashSet<(&str, &str)> = star["persons"]
        .as_array()
        .expect("persons is an array")
        .iter()
        .map(|p| {
            (
                p["person_role"].as_str().expect("role"),
                p["person_name"].as_str().expect("name"),
            )
        })
        .collect();
    assert_eq!(credits, HashSet::from([("actor", "Ann"), ("director", "Stan")]));

    // A movie without children gets empty aggregates, not null members.
    let orphan = doc_by_field(&batch.movies, "title", "Orphan");
    assert_eq!(orphan["genres"], json!([]));
    assert_eq!(orphan["persons"], json!([]));
    assert_eq!(orphan["rating"], Value::Null);

    assert_eq!(batch.genres.len(), 2);
    let drama = doc_by_field(&batch.genres, "name", "Drama");
    assert_eq!(drama["description"], Value::Null);

    // Bob has no films, so only Ann and Stan appear.
    assert_eq!(batch.persons.len(), 2);
    assert!(batch.persons.iter().all(|row| row["full_name"] != "Bob"));

    let ann = doc_by_field(&batch.persons, "full_name", "Ann");
    let films: HashSet<&str> = ann["films"]
        .as_array()
        .expect("films is an array")
        .iter()
        .map(|film| film["title"].as_str().expect("film title"))
        .collect();
    assert_eq!(films, HashSet::from(["The Star", "Quiet Drama"]));

    let stan = doc_by_field(&batch.persons, "full_name", "Stan");
    assert_eq!(stan["films"][0]["roles"], json!(["director"]));
    assert_eq!(stan["films"][0]["imdb_rating"], 8.5);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn repeated_full_loads_are_identical() {
    let (_container, url) = seeded_postgres().await;
    let extractor = extractor_for(&url);

    let first = extractor.extract(None).await.expect("first load");
    let second = extractor.extract(None).await.expect("second load");

    assert_eq!(first.movies, second.movies);
    assert_eq!(first.genres, second.genres);
    assert_eq!(first.persons, second.persons);
}

// ============================================================================
// Incremental loads
// ============================================================================

#[tokio::test]
#[ignore = "requires Docker"]
async fn watermark_after_every_change_yields_nothing() {
    let (_container, url) = seeded_postgres().await;
    let extractor = extractor_for(&url);

    let batch = extractor
        .extract(Some(watermark("2024-06-01 00:00:00.000000+00")))
        .await
        .expect("incremental load succeeds");

    assert!(batch.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn watermark_equal_to_a_row_timestamp_excludes_it() {
    let (_container, url) = seeded_postgres().await;
    let extractor = extractor_for(&url);

    // Exactly Orphan's updated_at; the comparison is strictly greater.
    let batch = extractor
        .extract(Some(watermark("2024-01-03 10:00:00.000000+00")))
        .await
        .expect("incremental load succeeds");

    assert!(batch.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn genre_rename_resurfaces_linked_movies_and_people_in_full() {
    let (_container, url) = seeded_postgres().await;
    let extractor = extractor_for(&url);
    let since = watermark("2024-06-01 00:00:00.000000+00");

    run_update(
        &url,
        "UPDATE content.genre
         SET name = 'Action Classics', updated_at = '2024-07-01 00:00:00+00'
         WHERE id = '22222222-2222-2222-2222-222222222201'",
    )
    .await;

    let batch = extractor
        .extract(Some(since))
        .await
        .expect("incremental load succeeds");

    // Only the movie linked to the renamed genre comes back, rebuilt
    // with its complete child sets rather than just the changed genre.
    assert_eq!(titles(&batch.movies), ["The Star"]);
    let star = &batch.movies[0];
    assert_eq!(star["genres"], json!(["Action Classics"]));
    assert_eq!(star["persons"].as_array().map(Vec::len), Some(2));

    assert_eq!(batch.genres.len(), 1);
    assert_eq!(batch.genres[0]["name"], "Action Classics");

    // Both people credited on the movie resurface, and Ann's document
    // still carries her whole filmography, not only the changed film.
    assert_eq!(batch.persons.len(), 2);
    let ann = doc_by_field(&batch.persons, "full_name", "Ann");
    let films: HashSet<&str> = ann["films"]
        .as_array()
        .expect("films is an array")
        .iter()
        .map(|film| film["title"].as_str().expect("film title"))
        .collect();
    assert_eq!(films, HashSet::from(["The Star", "Quiet Drama"]));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn movie_update_does_not_drag_in_unrelated_entities() {
    let (_container, url) = seeded_postgres().await;
    let extractor = extractor_for(&url);
    let since = watermark("2024-06-01 00:00:00.000000+00");

    run_update(
        &url,
        "UPDATE content.film_work
         SET rating = 9.1, updated_at = '2024-07-01 00:00:00+00'
         WHERE id = '11111111-1111-1111-1111-111111111103'",
    )
    .await;

    let batch = extractor
        .extract(Some(since))
        .await
        .expect("incremental load succeeds");

    assert_eq!(titles(&batch.movies), ["Orphan"]);
    assert_eq!(batch.movies[0]["rating"], 9.1);

    // Orphan has no genres and no credits, so nothing else moves.
    assert!(batch.genres.is_empty());
    assert!(batch.persons.is_empty());
}
