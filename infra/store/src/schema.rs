use mxd_domain::room::RoomEntry;
use surrealdb::types::SurrealValue;

pub(crate) const ROOM_ENTRY_TABLE: &str = "room_entry";
pub(crate) const TRANSACTION_TABLE: &str = "as_transaction";

pub(crate) const DEFINE_TABLES: &str = "
    DEFINE TABLE IF NOT EXISTS room_entry SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS room_entry_matrix_id ON room_entry FIELDS matrix_id;
    DEFINE TABLE IF NOT EXISTS as_transaction SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS as_transaction_txn_id ON as_transaction FIELDS txn_id;
";

pub(crate) const SELECT_BY_MATRIX_ID: &str =
    "SELECT matrix_id, remote_id, guild_id, channel_id FROM room_entry \
     WHERE matrix_id = $matrix_id";
pub(crate) const INSERT_ENTRY: &str = "CREATE room_entry CONTENT $entry";

pub(crate) const SELECT_TRANSACTION: &str =
    "SELECT VALUE txn_id FROM as_transaction WHERE txn_id = $txn_id LIMIT 1";
pub(crate) const INSERT_TRANSACTION: &str =
    "CREATE as_transaction SET txn_id = $txn_id, completed_at = time::now()";

/// Row shape of `room_entry`.
#[derive(Debug, Clone, SurrealValue)]
pub(crate) struct RoomEntryRow {
    pub matrix_id: String,
    pub remote_id: String,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
}

impl From<RoomEntryRow> for RoomEntry {
    fn from(row: RoomEntryRow) -> Self {
        Self {
            matrix_id: row.matrix_id,
            remote_id: row.remote_id,
            guild_id: row.guild_id,
            channel_id: row.channel_id,
        }
    }
}

impl From<&RoomEntry> for RoomEntryRow {
    fn from(entry: &RoomEntry) -> Self {
        Self {
            matrix_id: entry.matrix_id.clone(),
            remote_id: entry.remote_id.clone(),
            guild_id: entry.guild_id.clone(),
            channel_id: entry.channel_id.clone(),
        }
    }
}
