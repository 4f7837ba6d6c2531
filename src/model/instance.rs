use crate::model::{ColorId, InstanceId, PartKey, SetInventoryPart, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name used when a client saves modifications without naming the instance
pub const DEFAULT_INSTANCE_NAME: &str = "Default";
pub const MAX_INSTANCE_NAME_LEN: usize = 200;

/// A user's personal copy of a set inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryInstance {
    pub id: InstanceId,
    pub owner_id: UserId,
    pub set_num: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryInstance {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// Public instances are readable by anyone, private ones only by the owner
    pub fn is_visible_to(&self, user_id: UserId) -> bool {
        self.is_public || self.is_owned_by(user_id)
    }
}

/// Input for creating an instance; id and timestamps are assigned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInstance {
    pub owner_id: UserId,
    pub set_num: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePartOverride {
    pub part_num: String,
    pub part_name: String,
    pub color_id: ColorId,
    pub color_name: String,
    pub quantity: i32,
    pub is_spare: bool,
    pub is_minifig_part: bool,
    pub part_image_url: Option<String>,
    pub notes: Option<String>,
}

impl InstancePartOverride {
    pub fn key(&self) -> PartKey {
        PartKey {
            part_num: self.part_num.clone(),
            color_id: self.color_id,
            is_spare: self.is_spare,
            is_minifig_part: self.is_minifig_part,
        }
    }

    pub fn matches(&self, key: &PartKey) -> bool {
        self.part_num == key.part_num
            && self.color_id == key.color_id
            && self.is_spare == key.is_spare
            && self.is_minifig_part == key.is_minifig_part
    }
}

impl From<&SetInventoryPart> for InstancePartOverride {
    fn from(part: &SetInventoryPart) -> Self {
        Self {
            part_num: part.part_number.clone(),
            part_name: part.part_name.clone(),
            color_id: part.color_id,
            color_name: part.color_name.clone(),
            quantity: part.quantity,
            is_spare: part.is_spare,
            is_minifig_part: part.is_minifig_part,
            part_image_url: Some(part.part_image_url.clone()),
            notes: None,
        }
    }
}

/// Listing row for a user's collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    #[serde(flatten)]
    pub instance: InventoryInstance,
    pub part_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDetail {
    pub instance: InventoryInstance,
    pub parts: Vec<InstancePartOverride>,
}

/// Requested change to one override row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityChange {
    /// Relative change, usually +1 or -1
    Delta(i32),
    /// Absolute target quantity
    Set(i32),
}

/// What the store did with a quantity change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QuantityOutcome {
    Updated { previous: i32, quantity: i32 },
    /// The change would have gone below zero; nothing was written
    Rejected { current: i32, attempted: i64 },
    /// The change would overflow the stored quantity; nothing was written
    OutOfRange { current: i32, attempted: i64 },
    /// No override row for the key
    Missing,
}
