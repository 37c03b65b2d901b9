//! Index definitions
//!
//! Settings and mappings for the three search indices. Text fields share
//! the bilingual `ru_en` analyzer; mappings are dynamic-strict, so a
//! shape drift in the documents fails at index time instead of silently
//! growing the mapping.

use serde_json::{json, Value};

use crate::models::EntityKind;

/// Body for `PUT /{index}`: shared analysis settings plus the mappings
/// for the given kind
pub fn index_body(kind: EntityKind) -> Value {
    json!({
        "settings": settings(),
        "mappings": mappings(kind),
    })
}

fn settings() -> Value {
    json!({
        "refresh_interval": "1s",
        "analysis": {
            "filter": {
                "english_stop": {
                    "type": "stop",
                    "stopwords": "_english_"
                },
                "english_stemmer": {
                    "type": "stemmer",
                    "language": "english"
                },
                "english_possessive_stemmer": {
                    "type": "stemmer",
                    "language": "possessive_english"
                },
                "russian_stop": {
                    "type": "stop",
                    "stopwords": "_russian_"
                },
                "russian_stemmer": {
                    "type": "stemmer",
                    "language": "russian"
                }
            },
            "analyzer": {
                "ru_en": {
                    "tokenizer": "standard",
                    "filter": [
                        "lowercase",
                        "english_stop",
                        "english_stemmer",
                        "english_possessive_stemmer",
                        "russian_stop",
                        "russian_stemmer"
                    ]
                }
            }
        }
    })
}

fn mappings(kind: EntityKind) -> Value {
    match kind {
        EntityKind::Movies => json!({
            "dynamic": "strict",
            "properties": {
                "id": {"type": "keyword"},
                "imdb_rating": {"type": "float"},
                "genres": {"type": "keyword"},
                "title": {
                    "type": "text",
                    "analyzer": "ru_en",
                    "fields": {"raw": {"type": "keyword"}}
                },
                "description": {"type": "text", "analyzer": "ru_en"},
                "content_type": {"type": "keyword"},
                "directors_names": {"type": "text", "analyzer": "ru_en"},
                "actors_names": {"type": "text", "analyzer": "ru_en"},
                "writers_names": {"type": "text", "analyzer": "ru_en"},
                "directors": person_ref_mapping(),
                "actors": person_ref_mapping(),
                "writers": person_ref_mapping(),
            }
        }),
        EntityKind::Genres => json!({
            "dynamic": "strict",
            "properties": {
                "id": {"type": "keyword"},
                "name": {
                    "type": "text",
                    "analyzer": "ru_en",
                    "fields": {"raw": {"type": "keyword"}}
                },
                "description": {"type": "text", "analyzer": "ru_en"},
            }
        }),
        EntityKind::Persons => json!({
            "dynamic": "strict",
            "properties": {
                "person_id": {"type": "keyword"},
                "full_name": {
                    "type": "text",
                    "analyzer": "ru_en",
                    "fields": {"raw": {"type": "keyword"}}
                },
                "films": {
                    "type": "nested",
                    "dynamic": "strict",
                    "properties": {
                        "id": {"type": "keyword"},
                        "roles": {"type": "keyword"},
                        "title": {"type": "text", "analyzer": "ru_en"},
                        "imdb_rating": {"type": "float"},
                    }
                },
            }
        }),
    }
}

fn person_ref_mapping() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": {"type": "keyword"},
            "name": {"type": "text", "analyzer": "ru_en"},
        }
    })
}
