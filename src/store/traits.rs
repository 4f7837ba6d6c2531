use crate::model::{
    CatalogPartRow, CatalogSnapshot, CatalogStats, Color, ColorId, InstanceId,
    InstancePartOverride, InstanceSummary, InventoryInstance, NewInstance, NewUser, PartInfo,
    PartKey, QuantityChange, QuantityOutcome, SetInfo, SetSuggestion, Theme, User, UserId,
};
use anyhow::Result;

/// Read access to the reference catalog, plus the bulk "replace" load
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Set row joined with its theme name
    async fn get_set(&self, set_num: &str) -> Result<Option<SetInfo>>;
    /// Raw inventory rows for a set: its own parts and the parts of its minifigs
    async fn list_set_part_rows(&self, set_num: &str) -> Result<Vec<CatalogPartRow>>;
    /// Substring search on set number or name, newest first
    async fn search_sets(&self, query: &str, limit: usize) -> Result<Vec<SetInfo>>;
    /// Prefix matches first, then substring matches, each by set number
    async fn suggest_sets(&self, partial: &str, limit: usize) -> Result<Vec<SetSuggestion>>;
    async fn get_theme(&self, id: i32) -> Result<Option<Theme>>;
    async fn get_part(&self, part_num: &str) -> Result<Option<PartInfo>>;
    async fn get_color(&self, id: ColorId) -> Result<Option<Color>>;
    async fn catalog_stats(&self) -> Result<CatalogStats>;
    /// Replace every catalog table with the snapshot contents
    async fn replace_catalog(&self, snapshot: CatalogSnapshot) -> Result<()>;
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Returns `None` when the user name is already taken
    async fn create_user(&self, user: NewUser) -> Result<Option<User>>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn get_user_by_name(&self, user_name: &str) -> Result<Option<User>>;
}

#[async_trait::async_trait]
pub trait InstanceStore: Send + Sync {
    /// Persist an instance together with its initial overrides, atomically.
    /// Returns `None` when (owner, set, name) already exists.
    async fn create_instance(
        &self,
        instance: NewInstance,
        overrides: Vec<InstancePartOverride>,
    ) -> Result<Option<InventoryInstance>>;
    async fn get_instance(&self, id: InstanceId) -> Result<Option<InventoryInstance>>;
    async fn find_instance_by_name(
        &self,
        owner_id: UserId,
        set_num: &str,
        name: &str,
    ) -> Result<Option<InventoryInstance>>;
    /// Newest first, optionally restricted to one set
    async fn list_instances(
        &self,
        owner_id: UserId,
        set_num: Option<&str>,
    ) -> Result<Vec<InstanceSummary>>;
    async fn list_overrides(&self, instance_id: InstanceId) -> Result<Vec<InstancePartOverride>>;
    /// Read-modify-write of one override row under a row lock
    async fn apply_quantity_change(
        &self,
        instance_id: InstanceId,
        key: &PartKey,
        change: QuantityChange,
    ) -> Result<QuantityOutcome>;
    /// Set several rows to absolute quantities in one transaction.
    /// Rows are inserted when missing; callers validate quantities first.
    async fn set_quantities(
        &self,
        instance_id: InstanceId,
        rows: Vec<InstancePartOverride>,
    ) -> Result<()>;
    /// Insert or replace one override row
    async fn upsert_override(
        &self,
        instance_id: InstanceId,
        row: InstancePartOverride,
    ) -> Result<()>;
    /// Returns false when the new name collides with another instance of the same set
    async fn rename_instance(&self, id: InstanceId, name: &str) -> Result<bool>;
    /// Removes the instance and its overrides; false when it did not exist
    async fn delete_instance(&self, id: InstanceId) -> Result<bool>;
}

pub trait Store: CatalogStore + UserStore + InstanceStore + Send + Sync {}
