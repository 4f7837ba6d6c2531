pub mod accounts;
pub mod catalog;
pub mod instances;
pub mod quantity;

pub use accounts::AccountService;
pub use catalog::{assemble_inventory, suggestion_rank, CatalogLookup};
pub use instances::{AddPartRequest, CreateInstanceRequest, InstanceService, QuantityUpdate, SaveOutcome};
pub use quantity::{resolve_change, validate_change};
