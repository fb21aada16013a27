//! SQL schema and statements for the sift SQLite store.
//!
//! The conflict policy of every upsert is spelled out here:
//!
//! | Table       | Key                         | On conflict                          |
//! |-------------|-----------------------------|--------------------------------------|
//! | `websites`  | `url`                       | update `title`, `indexed_at`         |
//! | `keywords`  | `word`                      | do nothing, id resolved by `SELECT`  |
//! | `relations` | `(website_id, keyword_id)`  | update `tf`, `relevance`, `idf`      |

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS websites (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    url         TEXT NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    indexed_at  TEXT NOT NULL        -- ISO 8601 UTC of the last ingestion
);

CREATE TABLE IF NOT EXISTS keywords (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    word  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS relations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    website_id  INTEGER NOT NULL REFERENCES websites(id),
    keyword_id  INTEGER NOT NULL REFERENCES keywords(id),
    tf          REAL NOT NULL CHECK (tf >= 0),
    relevance   REAL NOT NULL CHECK (relevance >= 0),
    idf         REAL NOT NULL CHECK (idf >= 0),
    UNIQUE (website_id, keyword_id)
);

CREATE INDEX IF NOT EXISTS relations_keyword_idx ON relations(keyword_id);

PRAGMA user_version = 1;
";

pub const UPSERT_PAGE: &str = "
INSERT INTO websites (url, title, indexed_at) VALUES (?1, ?2, ?3)
ON CONFLICT (url) DO UPDATE SET
    title      = excluded.title,
    indexed_at = excluded.indexed_at
RETURNING id";

pub const INSERT_TERM: &str = "
INSERT INTO keywords (word) VALUES (?1)
ON CONFLICT (word) DO NOTHING";

pub const SELECT_TERM_ID: &str = "SELECT id FROM keywords WHERE word = ?1";

pub const UPSERT_EDGE: &str = "
INSERT INTO relations (website_id, keyword_id, tf, relevance, idf)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (website_id, keyword_id) DO UPDATE SET
    tf        = excluded.tf,
    relevance = excluded.relevance,
    idf       = excluded.idf";

/// `?1` is a JSON array of terms, matched as a set. `TOTAL` skips products
/// that overflowed to NULL instead of nulling the whole page score.
pub const RANKED_SEARCH: &str = "
SELECT w.id, w.url, w.title, TOTAL(r.tf * r.idf * r.relevance) AS score
FROM relations r
JOIN keywords k ON k.id = r.keyword_id
JOIN websites w ON w.id = r.website_id
WHERE k.word IN (SELECT value FROM json_each(?1))
GROUP BY w.id
ORDER BY score DESC, w.id ASC
LIMIT ?2";

pub const TOP_TERMS_FOR_PAGE: &str = "
SELECT k.word
FROM relations r
JOIN keywords k ON k.id = r.keyword_id
WHERE r.website_id = ?1
ORDER BY r.tf * r.idf * r.relevance DESC, k.id ASC
LIMIT ?2";

pub const SELECT_PAGE_BY_URL: &str =
  "SELECT id, url, title, indexed_at FROM websites WHERE url = ?1";

pub const EDGES_FOR_PAGE: &str = "
SELECT r.website_id, r.keyword_id, k.word, r.tf, r.relevance, r.idf
FROM relations r
JOIN keywords k ON k.id = r.keyword_id
WHERE r.website_id = ?1
ORDER BY r.keyword_id";

pub const STATS: &str = "
SELECT (SELECT COUNT(*) FROM websites),
       (SELECT COUNT(*) FROM keywords),
       (SELECT COUNT(*) FROM relations)";
