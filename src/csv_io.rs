//! CSV import/export (§6, `SPEC_FULL.md` §E.3/§E.4): the two accepted input
//! shapes per entity, lenient-fallback parsing for malformed rows, and the
//! arrangement/undocking-manifest export formats.
//!
//! Conversion between shapes happens only at import time; nothing
//! downstream of this module knows the data ever arrived as cm/kg CSV rows.

use std::collections::HashMap;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Writer};

use crate::container::{Container, ContainerKind};
use crate::item::Item;
use crate::placement::PlacedItem;
use crate::undock::UndockPlan;

/// A row that was skipped or had a field defaulted during import, kept for
/// the caller to surface as a per-row warning rather than aborting the
/// whole file (§7 propagation policy: `InvalidInput` recovers locally).
#[derive(Debug, Clone, PartialEq)]
pub struct ImportWarning {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome<T> {
    pub records: Vec<T>,
    pub warnings: Vec<ImportWarning>,
}

fn row_map(headers: &StringRecord, record: &StringRecord) -> HashMap<String, String> {
    headers
        .iter()
        .zip(record.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn get<'a>(row: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    row.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Parses a containers CSV in either accepted shape (§6):
/// `{id, width, height, depth, capacity, [zone, container_type]}` in native
/// units, or `{zone, container_id, width_cm, depth_cm, height_cm}` in
/// centimeters (`capacity` defaults to 10). Falls back to lenient,
/// field-by-field defaulting for rows matching neither shape exactly;
/// only a missing stable identifier skips the row entirely.
pub fn parse_containers_csv(data: &str) -> ImportOutcome<Container> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(data.as_bytes());
    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(_) => return ImportOutcome::default(),
    };

    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let row_num = idx + 1;
        let Ok(record) = result else {
            warnings.push(ImportWarning {
                row: row_num,
                message: "malformed CSV row, skipped".to_string(),
            });
            continue;
        };
        let row = row_map(&headers, &record);

        // Shape 1: centimeter format.
        if let (Some(zone), Some(id), Some(w), Some(d), Some(h)) = (
            get(&row, "zone"),
            get(&row, "container_id"),
            get(&row, "width_cm"),
            get(&row, "depth_cm"),
            get(&row, "height_cm"),
        ) {
            match (w.parse::<f64>(), h.parse::<f64>(), d.parse::<f64>()) {
                (Ok(w), Ok(h), Ok(d)) => {
                    records.push(Container {
                        id: id.to_string(),
                        width: w / 100.0,
                        height: h / 100.0,
                        depth: d / 100.0,
                        capacity: 10,
                        zone: zone.to_string(),
                        kind: ContainerKind::Storage,
                    });
                    continue;
                }
                _ => warnings.push(ImportWarning {
                    row: row_num,
                    message: format!("row {row_num} has non-numeric cm dimensions, falling back to lenient parse"),
                }),
            }
        }

        // Shape 2: native-unit format.
        let id = get(&row, "id").or_else(|| get(&row, "container_id"));
        let Some(id) = id else {
            warnings.push(ImportWarning {
                row: row_num,
                message: format!("row {row_num} missing id/container_id, skipped"),
            });
            continue;
        };

        let (width, height, depth) = match (get(&row, "width"), get(&row, "height"), get(&row, "depth")) {
            (Some(w), Some(h), Some(d)) => match (w.parse(), h.parse(), d.parse()) {
                (Ok(w), Ok(h), Ok(d)) => (w, h, d),
                _ => {
                    warnings.push(ImportWarning {
                        row: row_num,
                        message: format!("row {row_num} has invalid dimensions, using defaults"),
                    });
                    (2.0, 2.0, 2.0)
                }
            },
            _ => match (get(&row, "width_cm"), get(&row, "height_cm"), get(&row, "depth_cm")) {
                (Some(w), Some(h), Some(d)) => match (w.parse::<f64>(), h.parse::<f64>(), d.parse::<f64>()) {
                    (Ok(w), Ok(h), Ok(d)) => (w / 100.0, h / 100.0, d / 100.0),
                    _ => {
                        warnings.push(ImportWarning {
                            row: row_num,
                            message: format!("row {row_num} missing dimensional data, using defaults"),
                        });
                        (2.0, 2.0, 2.0)
                    }
                },
                _ => {
                    warnings.push(ImportWarning {
                        row: row_num,
                        message: format!("row {row_num} missing dimensional data, using defaults"),
                    });
                    (2.0, 2.0, 2.0)
                }
            },
        };

        let capacity = get(&row, "capacity").and_then(|v| v.parse().ok()).unwrap_or(10);
        let zone = get(&row, "zone").unwrap_or("unzoned").to_string();
        let kind = match get(&row, "container_type").map(str::to_lowercase) {
            Some(ref t) if t == "waste" => ContainerKind::Waste,
            _ => ContainerKind::Storage,
        };

        records.push(Container {
            id: id.to_string(),
            width,
            height,
            depth,
            capacity,
            zone,
            kind,
        });
    }

    ImportOutcome { records, warnings }
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    if s.is_empty() || s.eq_ignore_ascii_case("n/a") {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parses an items CSV in either accepted shape (§6):
/// `{id, name, width, height, depth, weight, [priority, preferred_zone,
/// expiry_date, usage_limit]}` or `{item_id, name, width_cm, depth_cm,
/// height_cm, mass_kg, [...]}`. Same lenient-fallback policy as
/// [`parse_containers_csv`].
pub fn parse_items_csv(data: &str) -> ImportOutcome<Item> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(data.as_bytes());
    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(_) => return ImportOutcome::default(),
    };

    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let row_num = idx + 1;
        let Ok(record) = result else {
            warnings.push(ImportWarning {
                row: row_num,
                message: "malformed CSV row, skipped".to_string(),
            });
            continue;
        };
        let row = row_map(&headers, &record);

        let cm_shape = (
            get(&row, "item_id"),
            get(&row, "name"),
            get(&row, "width_cm"),
            get(&row, "depth_cm"),
            get(&row, "height_cm"),
            get(&row, "mass_kg"),
        );
        let (id, name, width, height, depth, mass) = if let (Some(id), Some(name), Some(w), Some(d), Some(h), Some(m)) = cm_shape {
            match (w.parse::<f64>(), h.parse::<f64>(), d.parse::<f64>(), m.parse::<f64>()) {
                (Ok(w), Ok(h), Ok(d), Ok(m)) => (id.to_string(), name.to_string(), w / 100.0, h / 100.0, d / 100.0, m),
                _ => {
                    warnings.push(ImportWarning {
                        row: row_num,
                        message: format!("row {row_num} has non-numeric cm/kg fields, skipped"),
                    });
                    continue;
                }
            }
        } else {
            let id = get(&row, "id");
            let Some(id) = id else {
                warnings.push(ImportWarning {
                    row: row_num,
                    message: format!("row {row_num} missing id, skipped"),
                });
                continue;
            };
            let name = get(&row, "name").unwrap_or(id).to_string();
            let (width, height, depth) = match (get(&row, "width"), get(&row, "height"), get(&row, "depth")) {
                (Some(w), Some(h), Some(d)) => match (w.parse(), h.parse(), d.parse()) {
                    (Ok(w), Ok(h), Ok(d)) => (w, h, d),
                    _ => {
                        warnings.push(ImportWarning {
                            row: row_num,
                            message: format!("row {row_num} has invalid dimensions, skipped"),
                        });
                        continue;
                    }
                },
                _ => {
                    warnings.push(ImportWarning {
                        row: row_num,
                        message: format!("row {row_num} missing dimensional data, skipped"),
                    });
                    continue;
                }
            };
            let mass = get(&row, "weight").and_then(|v| v.parse().ok()).unwrap_or(1.0);
            (id.to_string(), name, width, height, depth, mass)
        };

        let mut item = Item::new(&id, &name, width, height, depth, mass);
        if let Some(p) = get(&row, "priority").and_then(|v| v.parse::<u8>().ok()) {
            item.priority = p;
        } else {
            warnings.push(ImportWarning {
                row: row_num,
                message: format!("row {row_num}: priority missing or invalid, defaulting to 50"),
            });
        }
        item.preferred_zone = get(&row, "preferred_zone").map(str::to_string);
        if let Some(d) = get(&row, "expiry_date") {
            match parse_iso_date(d) {
                Some(date) => item.expiry_date = Some(date),
                None if !d.eq_ignore_ascii_case("n/a") => warnings.push(ImportWarning {
                    row: row_num,
                    message: format!("row {row_num}: invalid expiry_date '{d}', left unset"),
                }),
                None => {}
            }
        }
        item.usage_limit = get(&row, "usage_limit").and_then(|v| v.parse().ok());

        records.push(item);
    }

    ImportOutcome { records, warnings }
}

/// `Item ID,Container ID,Coordinates (W1,D1,H1),(W2,D2,H2)` (§6): per placed
/// item, its two opposite corners in container-local coordinates.
pub fn export_arrangement_csv(placed: &[PlacedItem]) -> String {
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(["Item ID", "Container ID", "Coordinates (W1,D1,H1)", "(W2,D2,H2)"])
        .expect("in-memory writer never fails");
    for p in placed {
        writer
            .write_record([
                p.item_id.as_str(),
                p.container_id.as_str(),
                &format!("({},{},{})", p.x, p.y, p.z),
                &format!("({},{},{})", p.x + p.w, p.y + p.d, p.z + p.h),
            ])
            .expect("in-memory writer never fails");
    }
    String::from_utf8(writer.into_inner().expect("flush never fails")).expect("csv writer emits valid utf8")
}

/// `Item ID,Item Name,Weight (kg),Source Container ID` (§6) with footer rows
/// for total item count, total weight, and the requested max-weight limit.
pub fn export_undocking_manifest_csv(plan: &UndockPlan) -> String {
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(["Item ID", "Item Name", "Weight (kg)", "Source Container ID"])
        .expect("in-memory writer never fails");
    for entry in &plan.selection {
        writer
            .write_record([
                entry.item_id.as_str(),
                entry.item_name.as_str(),
                &format!("{:.2}", entry.mass),
                entry.source_container_id.as_str(),
            ])
            .expect("in-memory writer never fails");
    }
    writer.write_record::<_, &str>([]).expect("in-memory writer never fails");
    writer
        .write_record(["Total Items:", &plan.selection.len().to_string()])
        .expect("in-memory writer never fails");
    writer
        .write_record(["Total Weight (kg):", &format!("{:.2}", plan.total_mass)])
        .expect("in-memory writer never fails");
    writer
        .write_record(["Max Weight Limit (kg):", &format!("{:.2}", plan.max_weight)])
        .expect("in-memory writer never fails");
    String::from_utf8(writer.into_inner().expect("flush never fails")).expect("csv writer emits valid utf8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_native_unit_container_shape() {
        let csv = "id,width,height,depth,capacity,zone,container_type\nC1,1.0,2.0,3.0,5,CrewQuarters,storage\n";
        let outcome = parse_containers_csv(csv);
        assert_eq!(outcome.records.len(), 1);
        let c = &outcome.records[0];
        assert_eq!(c.id, "C1");
        assert_eq!((c.width, c.height, c.depth), (1.0, 2.0, 3.0));
        assert_eq!(c.capacity, 5);
        assert_eq!(c.zone, "CrewQuarters");
    }

    #[test]
    fn parses_centimeter_container_shape_and_converts() {
        let csv = "zone,container_id,width_cm,depth_cm,height_cm\nCrewQuarters,C1,100,200,300\n";
        let outcome = parse_containers_csv(csv);
        let c = &outcome.records[0];
        assert_eq!((c.width, c.height, c.depth), (1.0, 3.0, 2.0));
        assert_eq!(c.capacity, 10);
    }

    #[test]
    fn container_row_missing_id_is_skipped_with_warning() {
        let csv = "width,height,depth\n1,1,1\n";
        let outcome = parse_containers_csv(csv);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn container_row_with_bad_dims_defaults_rather_than_skips() {
        let csv = "id,width,height,depth\nC1,oops,1,1\n";
        let outcome = parse_containers_csv(csv);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!((outcome.records[0].width, outcome.records[0].height), (2.0, 2.0));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn parses_native_unit_item_shape_with_optional_fields() {
        let csv = "id,name,width,height,depth,weight,priority,expiry_date\nI1,Wrench,1,1,1,2.5,80,2026-01-01\n";
        let outcome = parse_items_csv(csv);
        let i = &outcome.records[0];
        assert_eq!(i.name, "Wrench");
        assert_eq!(i.mass, 2.5);
        assert_eq!(i.priority, 80);
        assert_eq!(i.expiry_date, NaiveDate::from_ymd_opt(2026, 1, 1));
    }

    #[test]
    fn na_expiry_date_means_unset() {
        let csv = "id,name,width,height,depth,weight,expiry_date\nI1,Wrench,1,1,1,2.5,N/A\n";
        let outcome = parse_items_csv(csv);
        assert_eq!(outcome.records[0].expiry_date, None);
    }

    #[test]
    fn export_arrangement_emits_corner_coordinates() {
        let placed = vec![PlacedItem {
            item_id: "I1".to_string(),
            container_id: "C1".to_string(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 0.5,
            h: 0.5,
            d: 0.5,
        }];
        let csv = export_arrangement_csv(&placed);
        assert!(csv.contains("I1,C1,(0,0,0),(0.5,0.5,0.5)"));
    }
}
