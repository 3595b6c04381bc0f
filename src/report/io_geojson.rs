// Reader for the municipal boundaries, exported as a GeoJSON feature collection.

use log::{debug, info};

use std::collections::BTreeMap;

use geo::MultiPolygon;
use geojson::{Feature, GeoJson};

use crate::report::{io_common::simplify_file_name, *};

pub fn read_geometry(path: &str, code_property: &str) -> ReportResult<Vec<GeometryFeature>> {
    info!("Attempting to read geometry file {:?}", path);
    let contents = fs::read_to_string(path).context(OpeningInputSnafu { path })?;
    let res = parse_geometry(path, &contents, code_property)?;
    info!(
        "Read {} municipality features from {}",
        res.len(),
        simplify_file_name(path)
    );
    Ok(res)
}

pub fn parse_geometry(
    path: &str,
    contents: &str,
    code_property: &str,
) -> ReportResult<Vec<GeometryFeature>> {
    let gj = contents
        .parse::<GeoJson>()
        .context(GeoJsonParseSnafu { path })?;
    let collection = match gj {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return NotFeatureCollectionSnafu { path }.fail(),
    };

    let mut res: Vec<GeometryFeature> = Vec::new();
    for (index, feature) in collection.features.into_iter().enumerate() {
        res.push(read_feature(path, index, feature, code_property)?);
    }
    Ok(res)
}

fn read_feature(
    path: &str,
    index: usize,
    feature: Feature,
    code_property: &str,
) -> ReportResult<GeometryFeature> {
    let props = feature.properties.unwrap_or_default();

    let census_code = match props.get(code_property) {
        Some(JSValue::String(s)) => s.clone(),
        Some(JSValue::Number(n)) => numeric_code(n),
        _ => {
            return MissingPropertySnafu {
                path,
                index,
                property: code_property,
            }
            .fail()
        }
    };

    let mut properties: BTreeMap<String, Option<String>> = BTreeMap::new();
    for (name, value) in props.iter() {
        if name == code_property {
            continue;
        }
        let v = match value {
            JSValue::Null => None,
            JSValue::String(s) => Some(s.clone()),
            x => Some(x.to_string()),
        };
        properties.insert(name.clone(), v);
    }

    let geometry = match feature.geometry {
        Some(g) => {
            let geom = geo::Geometry::<f64>::try_from(g)
                .context(ConvertingGeometrySnafu { path, index })?;
            Some(to_multi_polygon(path, index, geom)?)
        }
        None => {
            debug!("read_feature: feature {} ({}) has no geometry", index, census_code);
            None
        }
    };

    Ok(GeometryFeature {
        census_code,
        geometry,
        properties,
    })
}

// Some exports write the integer codes as floats ("3550308.0").
fn numeric_code(n: &serde_json::Number) -> String {
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => (f as u64).to_string(),
        _ => n.to_string(),
    }
}

fn to_multi_polygon(
    path: &str,
    index: usize,
    geom: geo::Geometry<f64>,
) -> ReportResult<MultiPolygon<f64>> {
    let kind = match geom {
        geo::Geometry::Polygon(p) => return Ok(MultiPolygon::new(vec![p])),
        geo::Geometry::MultiPolygon(mp) => return Ok(mp),
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    };
    UnsupportedGeometrySnafu { path, index, kind }.fail()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature",
         "properties": {"CD_MUN": "1100015", "NM_MUN": "Alta Floresta D'Oeste", "SIGLA_UF": "RO", "AREA_KM2": 7067.127},
         "geometry": {"type": "Polygon", "coordinates": [[[-62.2, -11.9], [-61.9, -11.9], [-61.9, -11.6], [-62.2, -11.9]]]}},
        {"type": "Feature",
         "properties": {"CD_MUN": 1100023, "NM_MUN": "Ariquemes", "SIGLA_UF": null},
         "geometry": {"type": "MultiPolygon", "coordinates": [[[[-63.2, -10.0], [-62.9, -10.0], [-62.9, -9.7], [-63.2, -10.0]]]]}},
        {"type": "Feature",
         "properties": {"CD_MUN": "1100031", "NM_MUN": "Cabixi"},
         "geometry": null}
      ]
    }"#;

    #[test]
    fn features() {
        let res = parse_geometry("br.geojson", COLLECTION, "CD_MUN").unwrap();
        assert_eq!(res.len(), 3);

        assert_eq!(res[0].census_code, "1100015");
        assert_eq!(res[0].geometry.as_ref().map(|g| g.0.len()), Some(1));
        assert_eq!(
            res[0].properties.get("NM_MUN"),
            Some(&Some("Alta Floresta D'Oeste".to_string()))
        );
        assert_eq!(
            res[0].properties.get("AREA_KM2"),
            Some(&Some("7067.127".to_string()))
        );
        assert!(!res[0].properties.contains_key("CD_MUN"));

        // Numeric codes are accepted, null properties are missing values.
        assert_eq!(res[1].census_code, "1100023");
        assert_eq!(res[1].properties.get("SIGLA_UF"), Some(&None));

        assert_eq!(res[2].geometry, None);
    }

    #[test]
    fn float_codes() {
        let js = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"CD_MUN": 3550308.0}, "geometry": null},
            {"type": "Feature", "properties": {"CD_MUN": 3550308.5}, "geometry": null}
        ]}"#;
        let res = parse_geometry("float.geojson", js, "CD_MUN").unwrap();
        assert_eq!(res[0].census_code, "3550308");
        // Not a code: rejected later by the join.
        assert_eq!(res[1].census_code, "3550308.5");
    }

    #[test]
    fn missing_code_property() {
        let res = parse_geometry("br.geojson", COLLECTION, "GEOCODIGO");
        match res {
            Err(ReportError::MissingProperty {
                index, property, ..
            }) => {
                assert_eq!(index, 0);
                assert_eq!(property, "GEOCODIGO");
            }
            x => panic!("unexpected result {:?}", x),
        }
    }

    #[test]
    fn unsupported_geometry() {
        let js = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"CD_MUN": "1"},
             "geometry": {"type": "Point", "coordinates": [-46.6, -23.5]}}
        ]}"#;
        let res = parse_geometry("points.geojson", js, "CD_MUN");
        assert!(matches!(res, Err(ReportError::UnsupportedGeometry { .. })));
    }

    #[test]
    fn not_a_collection() {
        let js = r#"{"type": "Point", "coordinates": [-46.6, -23.5]}"#;
        let res = parse_geometry("point.geojson", js, "CD_MUN");
        assert!(matches!(res, Err(ReportError::NotFeatureCollection { .. })));
    }

    #[test]
    fn invalid_json() {
        let res = parse_geometry("broken.geojson", "{\"type\": ", "CD_MUN");
        assert!(matches!(res, Err(ReportError::GeoJsonParse { .. })));
    }
}
