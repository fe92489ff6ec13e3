pub mod slot;
pub mod slot_table;

pub use slot::Slot;
pub use slot_table::SlotTable;
