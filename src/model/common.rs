use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type UserId = i64;
pub type InstanceId = i64;
pub type ColorId = i32;

/// Placeholder color used by the catalog for "any color" parts.
pub const ANY_COLOR_ID: ColorId = 9999;

/// Addresses one part row inside an inventory or an instance.
///
/// Spare and minifig rows of the same part and color are tracked separately,
/// so both flags are part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartKey {
    pub part_num: String,
    pub color_id: ColorId,
    #[serde(default)]
    pub is_spare: bool,
    #[serde(default)]
    pub is_minifig_part: bool,
}

impl PartKey {
    pub fn new(part_num: impl Into<String>, color_id: ColorId) -> Self {
        Self {
            part_num: part_num.into(),
            color_id,
            is_spare: false,
            is_minifig_part: false,
        }
    }

    pub fn spare(mut self) -> Self {
        self.is_spare = true;
        self
    }

    pub fn minifig(mut self) -> Self {
        self.is_minifig_part = true;
        self
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.part_num,
            self.color_id,
            if self.is_spare { "spare" } else { "regular" },
            if self.is_minifig_part { "minifig" } else { "normal" }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed part key '{0}'")]
pub struct PartKeyParseError(pub String);

impl FromStr for PartKey {
    type Err = PartKeyParseError;

    /// Accepts `part_color_{spare|regular}_{minifig|normal}` as well as the
    /// short `part_color` form. Part numbers may contain underscores, so the
    /// key is split from the right.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PartKeyParseError(s.to_string());

        let mut segments: Vec<&str> = s.rsplitn(4, '_').collect();
        segments.reverse();

        let mut is_spare = false;
        let mut is_minifig_part = false;

        // Peel optional flag segments off the end.
        if let Some(last) = segments.last().copied() {
            match last {
                "minifig" | "normal" => {
                    is_minifig_part = last == "minifig";
                    segments.pop();
                }
                _ => {}
            }
        }
        if let Some(last) = segments.last().copied() {
            match last {
                "spare" | "regular" => {
                    is_spare = last == "spare";
                    segments.pop();
                }
                _ => {}
            }
        }

        // Whatever remains is `part_color`, where `part` may hold underscores.
        let rest = segments.join("_");
        let (part_num, color) = rest.rsplit_once('_').ok_or_else(err)?;
        if part_num.is_empty() {
            return Err(err());
        }
        let color_id = color.parse::<ColorId>().map_err(|_| err())?;

        Ok(Self {
            part_num: part_num.to_string(),
            color_id,
            is_spare,
            is_minifig_part,
        })
    }
}

/// Random salt for credential hashing.
pub fn generate_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_key_display() {
        let key = PartKey::new("3001", 4).spare();
        assert_eq!(key.to_string(), "3001_4_spare_normal");

        let key = PartKey::new("973pr1234", 71).minifig();
        assert_eq!(key.to_string(), "973pr1234_71_regular_minifig");
    }

    #[test]
    fn test_part_key_parse_full_form() {
        let key: PartKey = "3023_0_spare_minifig".parse().unwrap();
        assert_eq!(key.part_num, "3023");
        assert_eq!(key.color_id, 0);
        assert!(key.is_spare);
        assert!(key.is_minifig_part);
    }

    #[test]
    fn test_part_key_parse_short_form() {
        let key: PartKey = "3001_4".parse().unwrap();
        assert_eq!(key, PartKey::new("3001", 4));
    }

    #[test]
    fn test_part_key_parse_underscored_part_number() {
        let key: PartKey = "bb_0123_15_regular_normal".parse().unwrap();
        assert_eq!(key.part_num, "bb_0123");
        assert_eq!(key.color_id, 15);
        assert!(!key.is_spare);
    }

    #[test]
    fn test_part_key_parse_rejects_garbage() {
        assert!("3001".parse::<PartKey>().is_err());
        assert!("3001_red".parse::<PartKey>().is_err());
        assert!("_4".parse::<PartKey>().is_err());
        assert!("".parse::<PartKey>().is_err());
    }
}
