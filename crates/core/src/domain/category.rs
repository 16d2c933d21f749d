use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryOptionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryOptionGroupId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryOptionGroupSetId(pub String);

/// The attribute dimension partition key of a data slice. Callers passing no
/// combo mean the default combo, which every catalog carries implicitly.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributeOptionComboId(pub String);

impl AttributeOptionComboId {
    pub fn default_combo() -> Self {
        Self("default".to_owned())
    }
}
