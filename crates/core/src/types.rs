/// All primary keys are UUID v7 (time ordered), stored as SQLite BLOBs.
pub type DbId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh primary key.
pub fn new_id() -> DbId {
    uuid::Uuid::now_v7()
}
