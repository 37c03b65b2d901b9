//! Row decoding into index documents
//!
//! One decoder per entity kind. Each takes a raw extracted row and either
//! produces the typed document or rejects the row with the reason. The
//! batch-level [`transform`] drops and logs rejected rows, so one bad row
//! never fails the run.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    DocumentBatch, EntityKind, GenreDoc, GenreRow, MovieDoc, MovieRow, PersonDoc, PersonFilm,
    PersonRef, PersonRow, RawBatch, RawRow, RowPerson,
};

/// A row that failed shape validation, carrying the reason and the
/// offending row for the log line
#[derive(Debug, Error)]
#[error("{kind} row failed shape validation: {source}")]
pub struct RowRejected {
    pub kind: EntityKind,
    pub row: RawRow,
    #[source]
    pub source: serde_json::Error,
}

/// Counts for one transform pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub decoded: usize,
    pub rejected: usize,
}

/// Decode a raw movie row.
///
/// The role projections (`directors`, `actors`, `writers` and their
/// `*_names` variants) are derived from the nested `persons` aggregate by
/// role tag: directors carry `director`, actors `actor`, writers `writer`.
pub fn decode_movie(row: RawRow) -> Result<MovieDoc, RowRejected> {
    let parsed = MovieRow::deserialize(&row).map_err(|source| RowRejected {
        kind: EntityKind::Movies,
        row,
        source,
    })?;

    let (directors, directors_names) = project_role(&parsed.persons, "director");
    let (actors, actors_names) = project_role(&parsed.persons, "actor");
    let (writers, writers_names) = project_role(&parsed.persons, "writer");

    Ok(MovieDoc {
        id: parsed.id,
        imdb_rating: parsed.rating,
        genres: parsed.genres,
        title: parsed.title,
        description: parsed.description,
        content_type: parsed.content_type,
        directors,
        actors,
        writers,
        directors_names,
        actors_names,
        writers_names,
    })
}

/// Decode a raw genre row
pub fn decode_genre(row: RawRow) -> Result<GenreDoc, RowRejected> {
    let parsed = GenreRow::deserialize(&row).map_err(|source| RowRejected {
        kind: EntityKind::Genres,
        row,
        source,
    })?;

    Ok(GenreDoc {
        id: parsed.id,
        name: parsed.name,
        description: parsed.description,
    })
}

/// Decode a raw person row
pub fn decode_person(row: RawRow) -> Result<PersonDoc, RowRejected> {
    let parsed = PersonRow::deserialize(&row).map_err(|source| RowRejected {
        kind: EntityKind::Persons,
        row,
        source,
    })?;

    let films = parsed
        .films
        .into_iter()
        .map(|film| PersonFilm {
            id: film.id,
            roles: film.roles,
            title: film.title,
            imdb_rating: film.imdb_rating,
        })
        .collect();

    Ok(PersonDoc {
        person_id: parsed.person_id,
        full_name: parsed.full_name,
        films,
    })
}

/// Contributors carrying the given role tag, as `{id, name}` refs plus
/// the name-only projection
fn project_role(persons: &[RowPerson], role: &str) -> (Vec<PersonRef>, Vec<String>) {
    let refs: Vec<PersonRef> = persons
        .iter()
        .filter(|person| person.person_role == role)
        .map(|person| PersonRef {
            id: person.person_id,
            name: person.person_name.clone(),
        })
        .collect();
    let names = refs.iter().map(|person| person.name.clone()).collect();
    (refs, names)
}

/// Convert a raw batch into typed documents, dropping rows that fail
/// shape validation. Partial success within a kind is expected; every
/// dropped row is logged together with the decode error.
pub fn transform(raw: RawBatch) -> (DocumentBatch, TransformStats) {
    let mut stats = TransformStats::default();

    let movies = decode_all(raw.movies, decode_movie, &mut stats);
    let genres = decode_all(raw.genres, decode_genre, &mut stats);
    let persons = decode_all(raw.persons, decode_person, &mut stats);

    debug!(
        decoded = stats.decoded,
        rejected = stats.rejected,
        "transform pass finished"
    );

    (
        DocumentBatch {
            movies,
            genres,
            persons,
        },
        stats,
    )
}

fn decode_all<D>(
    rows: Vec<RawRow>,
    decode: fn(RawRow) -> Result<D, RowRejected>,
    stats: &mut TransformStats,
) -> Vec<D> {
    rows.into_iter()
        .filter_map(|row| match decode(row) {
            Ok(doc) => {
                stats.decoded += 1;
                Some(doc)
            },
            Err(rejected) => {
                stats.rejected += 1;
                warn!(
                    kind = %rejected.kind,
                    row = %rejected.row,
                    error = %rejected.source,
                    "dropping row that failed shape validation"
                );
                None
            },
        })
        .collect()
}
