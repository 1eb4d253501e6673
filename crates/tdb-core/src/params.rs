//! Parameter bags and their typed form.
//!
//! On the wire a bag is a flat JSON string-to-string object. Inside the engine every bag is a
//! [`CallbackParams`] variant; conversion happens only at the token store boundary.

use std::collections::BTreeMap;

use crate::{
    domain::{ConfigField, GameplayType, GroupId},
    errors::Error,
    Result,
};

pub const CHAT_GROUP_ID_KEY: &str = "chatGroupId";
pub const GAMEPLAY_TYPE_KEY: &str = "gameplayType";
pub const FIELD_KEY: &str = "field";

/// Flat key/value parameters a callback token stands in for.
pub type ParameterBag = BTreeMap<String, String>;

pub fn encode_bag(bag: &ParameterBag) -> Result<String> {
    serde_json::to_string(bag).map_err(|e| Error::Encoding(e.to_string()))
}

pub fn decode_bag(raw: &str) -> Result<ParameterBag> {
    serde_json::from_str(raw).map_err(|e| Error::Decoding(e.to_string()))
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallbackParams {
    /// A single group the next screen is about.
    GroupRef { group_id: GroupId },
    /// A candidate gameplay type for a group.
    GroupTypeChoice {
        group_id: GroupId,
        gameplay_type: GameplayType,
    },
    /// A numeric field of a group to prompt for.
    GroupFieldEdit { group_id: GroupId, field: ConfigField },
}

impl CallbackParams {
    pub fn group(group_id: &GroupId) -> Self {
        CallbackParams::GroupRef {
            group_id: group_id.clone(),
        }
    }

    pub fn group_id(&self) -> &GroupId {
        match self {
            CallbackParams::GroupRef { group_id }
            | CallbackParams::GroupTypeChoice { group_id, .. }
            | CallbackParams::GroupFieldEdit { group_id, .. } => group_id,
        }
    }

    pub fn to_bag(&self) -> ParameterBag {
        let mut bag = ParameterBag::new();
        bag.insert(CHAT_GROUP_ID_KEY.to_string(), self.group_id().0.clone());
        match self {
            CallbackParams::GroupRef { .. } => {}
            CallbackParams::GroupTypeChoice { gameplay_type, .. } => {
                bag.insert(
                    GAMEPLAY_TYPE_KEY.to_string(),
                    gameplay_type.as_str().to_string(),
                );
            }
            CallbackParams::GroupFieldEdit { field, .. } => {
                bag.insert(FIELD_KEY.to_string(), field.as_str().to_string());
            }
        }
        bag
    }

    /// Strict inverse of [`CallbackParams::to_bag`]: unknown keys or values are a decoding error.
    pub fn from_bag(bag: &ParameterBag) -> Result<Self> {
        if let Some(key) = bag
            .keys()
            .find(|k| ![CHAT_GROUP_ID_KEY, GAMEPLAY_TYPE_KEY, FIELD_KEY].contains(&k.as_str()))
        {
            return Err(Error::Decoding(format!("unexpected parameter {key}")));
        }

        let group_id = bag
            .get(CHAT_GROUP_ID_KEY)
            .filter(|v| !v.trim().is_empty())
            .map(|v| GroupId(v.clone()))
            .ok_or_else(|| Error::Decoding(format!("missing {CHAT_GROUP_ID_KEY}")))?;

        match (bag.get(GAMEPLAY_TYPE_KEY), bag.get(FIELD_KEY)) {
            (None, None) => Ok(CallbackParams::GroupRef { group_id }),
            (Some(raw), None) => {
                let gameplay_type = GameplayType::parse(raw)
                    .ok_or_else(|| Error::Decoding(format!("unknown gameplay type {raw}")))?;
                Ok(CallbackParams::GroupTypeChoice {
                    group_id,
                    gameplay_type,
                })
            }
            (None, Some(raw)) => {
                let field = ConfigField::parse(raw)
                    .ok_or_else(|| Error::Decoding(format!("unknown field {raw}")))?;
                Ok(CallbackParams::GroupFieldEdit { group_id, field })
            }
            (Some(_), Some(_)) => Err(Error::Decoding(format!(
                "{GAMEPLAY_TYPE_KEY} and {FIELD_KEY} are mutually exclusive"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(pairs: &[(&str, &str)]) -> ParameterBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn wire_format_is_a_flat_string_map() {
        let p = CallbackParams::GroupTypeChoice {
            group_id: GroupId("42".to_string()),
            gameplay_type: GameplayType::QuickThere,
        };
        let json = encode_bag(&p.to_bag()).unwrap();
        assert_eq!(json, r#"{"chatGroupId":"42","gameplayType":"quick_there"}"#);
    }

    #[test]
    fn decodes_each_variant_from_its_keys() {
        let g = CallbackParams::from_bag(&bag(&[("chatGroupId", "7")])).unwrap();
        assert_eq!(g, CallbackParams::group(&GroupId("7".to_string())));

        let f = CallbackParams::from_bag(&bag(&[("chatGroupId", "7"), ("field", "simple_odds")]))
            .unwrap();
        assert_eq!(
            f,
            CallbackParams::GroupFieldEdit {
                group_id: GroupId("7".to_string()),
                field: ConfigField::SimpleOdds
            }
        );
    }

    #[test]
    fn rejects_bags_that_do_not_match_any_shape() {
        assert!(matches!(
            CallbackParams::from_bag(&bag(&[])),
            Err(Error::Decoding(_))
        ));
        assert!(matches!(
            CallbackParams::from_bag(&bag(&[("chatGroupId", "7"), ("gameplayType", "poker")])),
            Err(Error::Decoding(_))
        ));
        assert!(matches!(
            CallbackParams::from_bag(&bag(&[("chatGroupId", "7"), ("page", "2")])),
            Err(Error::Decoding(_))
        ));
    }

    #[test]
    fn corrupt_json_is_a_decoding_error() {
        assert!(matches!(decode_bag("{not json"), Err(Error::Decoding(_))));
        assert!(matches!(
            decode_bag(r#"{"chatGroupId": {"nested": 1}}"#),
            Err(Error::Decoding(_))
        ));
    }
}
