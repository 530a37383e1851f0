//! Administrative division records shared by the update and export pipelines.
//!
//! Field declaration order is the JSON key order of the static API, so do not
//! reorder fields.

use serde::Serialize;

/// Anything addressable by its own id in the static tree.
pub trait Entity: Serialize {
    fn id(&self) -> &str;
}

/// An entity nested under a parent one level up the tree.
pub trait Child: Entity {
    fn parent_id(&self) -> &str;
}

/// Top-level division (provinsi).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Province {
    pub id: String,
    pub name: String,
}

/// Second-level division (kabupaten/kota).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Regency {
    pub id: String,
    pub province_id: String,
    pub name: String,
}

/// Third-level division (kecamatan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct District {
    pub id: String,
    pub regency_id: String,
    pub name: String,
}

/// Fourth-level division (desa/kelurahan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Village {
    pub id: String,
    pub district_id: String,
    pub name: String,
}

impl Entity for Province {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Regency {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for District {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Village {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Child for Regency {
    fn parent_id(&self) -> &str {
        &self.province_id
    }
}

impl Child for District {
    fn parent_id(&self) -> &str {
        &self.regency_id
    }
}

impl Child for Village {
    fn parent_id(&self) -> &str {
        &self.district_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keys_follow_declaration_order() {
        let village = Village {
            id: "1101012001".into(),
            district_id: "110101".into(),
            name: "DESA CONTOH".into(),
        };
        assert_eq!(
            serde_json::to_string(&village).unwrap(),
            r#"{"id":"1101012001","district_id":"110101","name":"DESA CONTOH"}"#
        );
    }
}
