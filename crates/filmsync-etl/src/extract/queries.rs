//! Change-detection SQL
//!
//! Every query returns one `to_jsonb` document per row and takes the
//! watermark as bind parameters, so a full load is the same statement
//! with the epoch bound. Change detection on aggregated queries lives in
//! HAVING, after grouping: a matched row is always rebuilt with its full
//! child sets, never with only the children that changed.

/// Movie rows changed since the watermark.
///
/// Binds the watermark three times: $1 against the film itself, $2 and
/// $3 against the newest linked genre and person. Rows order by the
/// film's own `updated_at`.
pub const MOVIES_QUERY: &str = r#"
SELECT to_jsonb(movie) AS doc
FROM (
    SELECT
        fw.id,
        fw.title,
        fw.description,
        fw.rating,
        fw.type,
        fw.updated_at,
        COALESCE(
            json_agg(
                DISTINCT jsonb_build_object(
                    'person_role', pfw.role,
                    'person_id', p.id,
                    'person_name', p.full_name
                )
            ) FILTER (WHERE p.id IS NOT NULL),
            '[]'
        ) AS persons,
        COALESCE(
            array_agg(DISTINCT g.name) FILTER (WHERE g.name IS NOT NULL),
            '{}'
        ) AS genres
    FROM content.film_work fw
    LEFT JOIN content.person_film_work pfw ON pfw.film_work_id = fw.id
    LEFT JOIN content.person p ON p.id = pfw.person_id
    LEFT JOIN content.genre_film_work gfw ON gfw.film_work_id = fw.id
    LEFT JOIN content.genre g ON g.id = gfw.genre_id
    GROUP BY fw.id
    HAVING fw.updated_at > $1
        OR MAX(g.updated_at) > $2
        OR MAX(p.updated_at) > $3
) AS movie
ORDER BY movie.updated_at
"#;

/// Genre rows changed since the watermark ($1).
pub const GENRES_QUERY: &str = r#"
SELECT to_jsonb(genre) AS doc
FROM (
    SELECT
        g.id,
        g.name,
        g.description,
        g.updated_at
    FROM content.genre g
    WHERE g.updated_at > $1
) AS genre
ORDER BY genre.updated_at
"#;

/// Person rows changed since the watermark ($1).
///
/// The inner query builds one row per (film, person) pair with the roles
/// played in that film; the outer query folds the pairs into one row per
/// person carrying the whole filmography. A person matches when the
/// newest timestamp across their films, linked genres, and their own
/// record passed the watermark.
pub const PERSONS_QUERY: &str = r#"
SELECT to_jsonb(person) AS doc
FROM (
    SELECT
        person_with_films.person_id,
        person_with_films.full_name,
        ARRAY_AGG(
            DISTINCT jsonb_build_object(
                'id', person_with_films.film_id,
                'roles', person_with_films.roles,
                'title', person_with_films.film_title,
                'imdb_rating', person_with_films.film_rating
            )
        ) AS films,
        MAX(person_with_films.updated_at) AS updated_at
    FROM (
        SELECT
            film.id AS film_id,
            film.title AS film_title,
            film.rating AS film_rating,
            person.id AS person_id,
            person.full_name AS full_name,
            ARRAY_AGG(DISTINCT person_film.role) AS roles,
            GREATEST(film.updated_at, MAX(genre.updated_at), MAX(person.updated_at)) AS updated_at
        FROM content.film_work film
        LEFT JOIN content.genre_film_work AS genre_film ON film.id = genre_film.film_work_id
        LEFT JOIN content.genre AS genre ON genre_film.genre_id = genre.id
        LEFT JOIN content.person_film_work AS person_film ON film.id = person_film.film_work_id
        LEFT JOIN content.person AS person ON person.id = person_film.person_id
        WHERE person.id IS NOT NULL
        GROUP BY film.id, person.id, person.full_name
    ) AS person_with_films
    GROUP BY person_with_films.person_id, person_with_films.full_name
    HAVING MAX(person_with_films.updated_at) > $1
) AS person
ORDER BY person.updated_at
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movies_query_binds_three_watermark_copies() {
        assert!(MOVIES_QUERY.contains("$3"));
        assert!(!GENRES_QUERY.contains("$2"));
        assert!(!PERSONS_QUERY.contains("$2"));
    }

    #[test]
    fn every_query_emits_jsonb_documents() {
        for query in [MOVIES_QUERY, GENRES_QUERY, PERSONS_QUERY] {
            assert!(query.contains("to_jsonb"));
            assert!(query.contains("AS doc"));
        }
    }

    #[test]
    fn aggregated_queries_filter_after_grouping() {
        assert!(MOVIES_QUERY.contains("HAVING"));
        assert!(PERSONS_QUERY.contains("HAVING"));
    }
}
