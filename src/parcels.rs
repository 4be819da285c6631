//! GeoJSON parcel collection loading

use anyhow::{bail, Context, Result};
use parcel2ndvi_config::InputConfig;
use parcel2ndvi_core::Parcel;
use serde::Deserialize;
use serde_json::Value;

/// CRS assumed when the collection does not declare one (the GeoJSON
/// default).
pub const DEFAULT_CRS: &str = "http://www.opengis.net/def/crs/OGC/1.3/CRS84";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    crs: Option<CrsSpec>,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct CrsSpec {
    properties: CrsProperties,
}

#[derive(Debug, Deserialize)]
struct CrsProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
    #[serde(default)]
    geometry: Value,
}

#[derive(Debug)]
pub struct ParcelCollection {
    pub parcels: Vec<Parcel>,
    pub crs: String,
}

/// Load a GeoJSON FeatureCollection, reading the parcel identifier and
/// crop label from the configured property names. Identifiers may be
/// JSON numbers or strings.
pub fn load_parcels(config: &InputConfig) -> Result<ParcelCollection> {
    let content = std::fs::read_to_string(&config.parcels_path).with_context(|| {
        format!(
            "failed to read parcel collection: {}",
            config.parcels_path.display()
        )
    })?;
    let collection: FeatureCollection = serde_json::from_str(&content).with_context(|| {
        format!("failed to parse GeoJSON: {}", config.parcels_path.display())
    })?;

    let crs = collection
        .crs
        .map(|c| c.properties.name)
        .unwrap_or_else(|| DEFAULT_CRS.to_string());

    let mut parcels = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let id = property_string(&feature.properties, &config.id_property).with_context(|| {
            format!("feature {index}: missing {:?} property", config.id_property)
        })?;
        let crop =
            property_string(&feature.properties, &config.crop_property).with_context(|| {
                format!("feature {index}: missing {:?} property", config.crop_property)
            })?;
        if feature.geometry.is_null() {
            bail!("feature {index} (id {id}) has no geometry");
        }
        parcels.push(Parcel {
            id,
            crop,
            geometry: feature.geometry,
        });
    }

    Ok(ParcelCollection { parcels, crs })
}

fn property_string(properties: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn input_for(content: &str) -> (tempfile::NamedTempFile, InputConfig) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let config = InputConfig {
            parcels_path: PathBuf::from(file.path()),
            id_property: "id".to_string(),
            crop_property: "PRODUCTE".to_string(),
        };
        (file, config)
    }

    #[test]
    fn loads_features_with_numeric_ids() {
        let (_file, config) = input_for(
            r#"{
                "type": "FeatureCollection",
                "crs": { "type": "name", "properties": { "name": "EPSG:25831" } },
                "features": [
                    {
                        "type": "Feature",
                        "properties": { "id": 101, "PRODUCTE": "ALFALS" },
                        "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] }
                    },
                    {
                        "type": "Feature",
                        "properties": { "id": "102", "PRODUCTE": "BLAT TOU" },
                        "geometry": { "type": "Polygon", "coordinates": [[[2,0],[3,0],[3,1],[2,0]]] }
                    }
                ]
            }"#,
        );
        let collection = load_parcels(&config).unwrap();
        assert_eq!(collection.crs, "EPSG:25831");
        assert_eq!(collection.parcels.len(), 2);
        assert_eq!(collection.parcels[0].id, "101");
        assert_eq!(collection.parcels[0].crop, "ALFALS");
        assert_eq!(collection.parcels[1].id, "102");
    }

    #[test]
    fn missing_crs_falls_back_to_default() {
        let (_file, config) = input_for(
            r#"{ "type": "FeatureCollection", "features": [] }"#,
        );
        let collection = load_parcels(&config).unwrap();
        assert_eq!(collection.crs, DEFAULT_CRS);
        assert!(collection.parcels.is_empty());
    }

    #[test]
    fn missing_crop_property_names_the_feature() {
        let (_file, config) = input_for(
            r#"{
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": { "id": 7 },
                    "geometry": { "type": "Polygon", "coordinates": [] }
                }]
            }"#,
        );
        let err = load_parcels(&config).unwrap_err();
        assert!(format!("{err:#}").contains("feature 0"));
    }

    #[test]
    fn null_geometry_is_rejected() {
        let (_file, config) = input_for(
            r#"{
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": { "id": 7, "PRODUCTE": "PANIS" },
                    "geometry": null
                }]
            }"#,
        );
        assert!(load_parcels(&config).is_err());
    }
}
