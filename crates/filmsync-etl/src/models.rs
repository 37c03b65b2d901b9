//! Entity kinds, extracted row shapes, and search index documents
//!
//! The extractor fetches each source row as one JSON object ([`RawRow`]).
//! The transformer decodes those into the typed documents below, which
//! are what the loader serializes into the search index. Field names on
//! the document structs are the index field names.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The three independently extracted, transformed, and loaded data
/// families. The variant order is the processing order within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Movies,
    Genres,
    Persons,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Movies, EntityKind::Genres, EntityKind::Persons];

    /// Name of the search index this kind is loaded into
    pub fn index_name(self) -> &'static str {
        match self {
            EntityKind::Movies => "movies",
            EntityKind::Genres => "genres",
            EntityKind::Persons => "persons",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.index_name())
    }
}

/// One extracted source row: a JSON object mapping column names to
/// scalar or nested-array values. Held only within a single run.
pub type RawRow = Value;

/// Raw rows for all three entity kinds, as returned by one extraction
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub movies: Vec<RawRow>,
    pub genres: Vec<RawRow>,
    pub persons: Vec<RawRow>,
}

impl RawBatch {
    pub fn len(&self) -> usize {
        self.movies.len() + self.genres.len() + self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Source row shapes (what the queries produce)
// ============================================================================

/// Movie row as selected from `content.film_work` with aggregated
/// person and genre children
#[derive(Debug, Clone, Deserialize)]
pub struct MovieRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub persons: Vec<RowPerson>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// One contributor entry inside a movie row's `persons` aggregate
#[derive(Debug, Clone, Deserialize)]
pub struct RowPerson {
    pub person_id: Uuid,
    pub person_name: String,
    pub person_role: String,
}

/// Genre row as selected from `content.genre`
#[derive(Debug, Clone, Deserialize)]
pub struct GenreRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Person row with their aggregated filmography
#[derive(Debug, Clone, Deserialize)]
pub struct PersonRow {
    pub person_id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub films: Vec<RowFilm>,
}

/// One film entry inside a person row's `films` aggregate
#[derive(Debug, Clone, Deserialize)]
pub struct RowFilm {
    pub id: Uuid,
    #[serde(default)]
    pub roles: Vec<String>,
    pub title: String,
    pub imdb_rating: Option<f64>,
}

// ============================================================================
// Index documents (what the loader upserts)
// ============================================================================

/// Movie document for the `movies` index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDoc {
    pub id: Uuid,
    pub imdb_rating: Option<f64>,
    pub genres: Vec<String>,
    pub title: String,
    pub description: Option<String>,
    pub content_type: String,
    pub directors: Vec<PersonRef>,
    pub actors: Vec<PersonRef>,
    pub writers: Vec<PersonRef>,
    pub directors_names: Vec<String>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
}

/// `{id, name}` reference to a contributor, embedded in movie documents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonRef {
    pub id: Uuid,
    pub name: String,
}

/// Genre document for the `genres` index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreDoc {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Person document for the `persons` index, keyed by `person_id`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonDoc {
    pub person_id: Uuid,
    pub full_name: String,
    pub films: Vec<PersonFilm>,
}

/// One film a person contributed to, embedded in person documents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonFilm {
    pub id: Uuid,
    pub roles: Vec<String>,
    pub title: String,
    pub imdb_rating: Option<f64>,
}

/// Decoded documents for all three entity kinds, ready to load
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    pub movies: Vec<MovieDoc>,
    pub genres: Vec<GenreDoc>,
    pub persons: Vec<PersonDoc>,
}

impl DocumentBatch {
    pub fn len(&self) -> usize {
        self.movies.len() + self.genres.len() + self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
