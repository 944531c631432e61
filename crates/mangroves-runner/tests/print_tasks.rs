//! Task planning from GMW areas and country boundaries.

use geo::polygon;
use mangroves_grid::{Mercator, PACIFIC_EPSG, PACIFIC_GRID_10};
use mangroves_runner::tasks::{parse_regions, parse_years, plan_tasks, task_item_path, TaskQuery};
use mangroves_store::{LocalStore, ObjectStore};
use mangroves_vector::{PolygonIndex, PolygonLayer};

/// Two countries in lon/lat: a box around Suva (FJI) and one around Nuku'alofa (TON).
const COUNTRIES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {"GID_0": "FJI"},
      "geometry": {"type": "Polygon", "coordinates": [[
        [178.3, -18.3], [178.6, -18.3], [178.6, -18.0], [178.3, -18.0], [178.3, -18.3]
      ]]}
    },
    {
      "type": "Feature",
      "properties": {"GID_0": "TON"},
      "geometry": {"type": "Polygon", "coordinates": [[
        [-175.3, -21.3], [-175.1, -21.3], [-175.1, -21.1], [-175.3, -21.1], [-175.3, -21.3]
      ]]}
    }
  ]
}"#;

/// Small mangrove patches near each capital, in grid coordinates.
fn gmw() -> PolygonIndex {
    let mercator = Mercator::pacific();
    let patch = |lon: f64, lat: f64| {
        let (x, y) = mercator.forward(lon, lat);
        polygon![
            (x: x - 100.0, y: y - 100.0),
            (x: x + 100.0, y: y - 100.0),
            (x: x + 100.0, y: y + 100.0),
            (x: x - 100.0, y: y + 100.0),
            (x: x - 100.0, y: y - 100.0),
        ]
    };
    PolygonIndex::new(PolygonLayer::new(
        vec![patch(178.44, -18.14), patch(-175.2, -21.14)],
        PACIFIC_EPSG,
    ))
}

fn tile_id(lon: f64, lat: f64) -> String {
    let (x, y) = Mercator::pacific().forward(lon, lat);
    PACIFIC_GRID_10.tile_of(x, y).to_string()
}

fn query(regions: &str) -> TaskQuery {
    TaskQuery {
        years: parse_years("2019-2020").expect("valid years"),
        version: "0.1.0".to_string(),
        regions: parse_regions(regions),
        limit: None,
        output_prefix: None,
        overwrite: false,
    }
}

#[test]
fn test_plan_all_regions() {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let store = LocalStore::new(dir.path());
    let countries = PolygonLayer::from_geojson_str(COUNTRIES, "countries").expect("Should parse");

    let tasks = plan_tasks(&query("ALL"), &gmw(), &countries, Some(&store)).expect("Should plan");

    let suva = tile_id(178.44, -18.14);
    let tonga = tile_id(-175.2, -21.14);
    let mut tiles: Vec<&str> = tasks.iter().map(|t| t.tile_id.as_str()).collect();
    tiles.dedup();
    assert_eq!(tiles.len(), 2);
    assert!(tiles.contains(&suva.as_str()));
    assert!(tiles.contains(&tonga.as_str()));
    assert_eq!(tasks.len(), 4, "Two tiles times two years");
}

#[test]
fn test_plan_filters_regions_and_finished_tasks() {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let store = LocalStore::new(dir.path());
    let countries = PolygonLayer::from_geojson_str(COUNTRIES, "countries").expect("Should parse");

    let tasks = plan_tasks(&query("FJI"), &gmw(), &countries, Some(&store)).expect("Should plan");
    let suva = tile_id(178.44, -18.14);
    assert!(tasks.iter().all(|t| t.tile_id == suva));
    assert_eq!(tasks.iter().map(|t| t.year).collect::<Vec<_>>(), vec![2019, 2020]);

    // Finish 2019
    let done = &tasks[0];
    let key = task_item_path(done, None).stac_path(done.tile().expect("valid tile"));
    store.put(&key, b"{}", "application/json").expect("Should write");

    let pending = plan_tasks(&query("FJI"), &gmw(), &countries, Some(&store)).expect("Should plan");
    assert_eq!(pending, vec![tasks[1].clone()]);

    let everything = TaskQuery {
        overwrite: true,
        ..query("FJI")
    };
    let all = plan_tasks(&everything, &gmw(), &countries, None).expect("Should plan");
    assert_eq!(all, tasks);
}
