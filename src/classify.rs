//! classify.rs
//!
//! Routes raw `(kode, nama)` rows into the four division tables by the depth
//! of their dotted code.

use tracing::debug;

use crate::metrics::{ROWS_CLASSIFIED, ROWS_DROPPED};
use crate::model::{District, Province, Regency, Village};

/// One row of the `wilayah` table in the scratch store.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct WilayahRecord {
    /// Dotted hierarchical code, e.g. "11.01.01.2001"
    pub kode: String,
    /// Display name as found in the dump
    pub nama: String,
}

impl WilayahRecord {
    pub fn new(kode: impl Into<String>, nama: impl Into<String>) -> Self {
        WilayahRecord {
            kode: kode.into(),
            nama: nama.into(),
        }
    }
}

/// A classified row, tagged with the table it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Division {
    Province(Province),
    Regency(Regency),
    District(District),
    Village(Village),
}

impl Division {
    /// Table name used for logging and metric labels.
    pub fn table(&self) -> &'static str {
        match self {
            Division::Province(_) => "provinces",
            Division::Regency(_) => "regencies",
            Division::District(_) => "districts",
            Division::Village(_) => "villages",
        }
    }
}

/// Upper-case a regency name and expand the first "KAB." only.
pub fn normalize_regency_name(name: &str) -> String {
    name.to_uppercase().replacen("KAB.", "KABUPATEN", 1)
}

/// Classify a raw record by the number of segments in its code.
///
/// Ids are cumulative string concatenations of the segments, so leading
/// zeros survive. Codes with more than four segments yield `None`.
pub fn classify(record: &WilayahRecord) -> Option<Division> {
    let segments: Vec<&str> = record.kode.split('.').collect();
    let id_at = |depth: usize| segments[..depth].concat();

    let division = match segments.len() {
        1 => Division::Province(Province {
            id: id_at(1),
            name: record.nama.to_uppercase(),
        }),
        2 => Division::Regency(Regency {
            id: id_at(2),
            province_id: id_at(1),
            name: normalize_regency_name(&record.nama),
        }),
        3 => Division::District(District {
            id: id_at(3),
            regency_id: id_at(2),
            name: record.nama.to_uppercase(),
        }),
        4 => Division::Village(Village {
            id: id_at(4),
            district_id: id_at(3),
            name: record.nama.to_uppercase(),
        }),
        _ => return None,
    };

    Some(division)
}

/// The four in-memory tables produced by one update run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tables {
    pub provinces: Vec<Province>,
    pub regencies: Vec<Regency>,
    pub districts: Vec<District>,
    pub villages: Vec<Village>,
}

impl Tables {
    pub fn push(&mut self, division: Division) {
        ROWS_CLASSIFIED.with_label_values(&[division.table()]).inc();
        match division {
            Division::Province(p) => self.provinces.push(p),
            Division::Regency(r) => self.regencies.push(r),
            Division::District(d) => self.districts.push(d),
            Division::Village(v) => self.villages.push(v),
        }
    }

    /// Classify every record in order. Returns the tables and the number of
    /// rows that were dropped for having an unsupported code depth.
    pub fn from_records<'a, I>(records: I) -> (Self, usize)
    where
        I: IntoIterator<Item = &'a WilayahRecord>,
    {
        let mut tables = Tables::default();
        let mut dropped = 0;
        for record in records {
            match classify(record) {
                Some(division) => tables.push(division),
                None => {
                    debug!(kode = %record.kode, "Dropping row with unsupported code depth");
                    ROWS_DROPPED.inc();
                    dropped += 1;
                }
            }
        }
        (tables, dropped)
    }

    pub fn len(&self) -> usize {
        self.provinces.len() + self.regencies.len() + self.districts.len() + self.villages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(kode: &str, nama: &str) -> WilayahRecord {
        WilayahRecord::new(kode, nama)
    }

    #[test]
    fn full_code_builds_cumulative_ids() {
        let (tables, dropped) = Tables::from_records(&[
            rec("11", "Aceh"),
            rec("11.01", "Kab. Aceh Selatan"),
            rec("11.01.01", "Bakongan"),
            rec("11.01.01.2001", "Keude Bakongan"),
        ]);

        assert_eq!(dropped, 0);
        assert_eq!(tables.provinces, vec![Province { id: "11".into(), name: "ACEH".into() }]);
        assert_eq!(
            tables.regencies,
            vec![Regency {
                id: "1101".into(),
                province_id: "11".into(),
                name: "KABUPATEN ACEH SELATAN".into(),
            }]
        );
        assert_eq!(
            tables.districts,
            vec![District {
                id: "110101".into(),
                regency_id: "1101".into(),
                name: "BAKONGAN".into(),
            }]
        );
        assert_eq!(
            tables.villages,
            vec![Village {
                id: "1101012001".into(),
                district_id: "110101".into(),
                name: "KEUDE BAKONGAN".into(),
            }]
        );
    }

    #[test]
    fn each_depth_lands_in_exactly_one_table() {
        let codes = ["07", "07.05", "07.05.09", "07.05.09.0001"];
        for (depth, code) in codes.iter().enumerate() {
            let (tables, dropped) = Tables::from_records(&[rec(*code, "x")]);
            assert_eq!(dropped, 0);
            assert_eq!(tables.len(), 1, "code {code}");

            let expected_id = code.replace('.', "");
            let id = match depth {
                0 => &tables.provinces[0].id,
                1 => &tables.regencies[0].id,
                2 => &tables.districts[0].id,
                _ => &tables.villages[0].id,
            };
            assert_eq!(id, &expected_id);
        }
    }

    #[test]
    fn leading_zeros_are_kept() {
        match classify(&rec("01.02", "x")) {
            Some(Division::Regency(r)) => {
                assert_eq!(r.id, "0102");
                assert_eq!(r.province_id, "01");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn deeper_codes_are_dropped_silently() {
        assert_eq!(classify(&rec("11.01.01.2001.9", "x")), None);
        let (tables, dropped) = Tables::from_records(&[rec("1.2.3.4.5.6", "x"), rec("11", "aceh")]);
        assert_eq!(dropped, 1);
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn only_first_kab_is_expanded() {
        assert_eq!(normalize_regency_name("kab. kab. bandung"), "KABUPATEN KAB. BANDUNG");
        assert_eq!(normalize_regency_name("Kota Bandung"), "KOTA BANDUNG");
    }

    #[test]
    fn kab_is_left_alone_outside_regencies() {
        match classify(&rec("32.04.01", "kab. district")) {
            Some(Division::District(d)) => assert_eq!(d.name, "KAB. DISTRICT"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
