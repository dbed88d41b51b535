// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Login attempts and refresh tokens are append-mostly and read back in
// issuance order, so their ids are generated app-side as UUIDv7.
// User ids keep random v4 ids.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
