pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS works (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL,
        title TEXT NOT NULL,
        category TEXT,
        tags TEXT,
        meta TEXT,
        published_at INTEGER,
        rating INTEGER
    );

    CREATE UNIQUE INDEX IF NOT EXISTS works_key_idx ON works (key);

    CREATE TABLE IF NOT EXISTS pages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        work_id INTEGER NOT NULL,
        page_index INTEGER NOT NULL,
        path TEXT NOT NULL,
        width INTEGER,
        height INTEGER,
        ratio REAL,
        FOREIGN KEY (work_id) REFERENCES works(id)
    );

    CREATE INDEX IF NOT EXISTS pages_work_page_idx ON pages (work_id, page_index);
";
