pub mod commands;
pub mod writer;

pub use commands::{
    BatchCommand, DirectoryUpsertRow, EvidenceDeltaRow, FileUpsertRow, OutboxStatusUpdateRow,
    PoiInsertRow, RelationshipInsertRow, RelationshipUpdateRow,
};
pub use writer::{BatchWriter, WriterPolicy, WriteStats};
